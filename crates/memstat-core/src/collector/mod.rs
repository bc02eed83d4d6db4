//! Binary stat-file access for cgroup memory statistics.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                     StatSession                      │
//! │  1. write filter line ──► control path (once)        │
//! │  2. open data path                                   │
//! │  3. poll: seek(0) + read ──► codec::decode_snapshot  │
//! │                 ┌──────────────┐                     │
//! │                 │  FileSystem  │ (trait)             │
//! │                 └──────┬───────┘                     │
//! └────────────────────────┼─────────────────────────────┘
//!              ┌───────────┼───────────┐
//!       ┌──────▼──────┐ ┌──▼─────┐ ┌───▼───────┐
//!       │   RealFs    │ │ MockFs │ │ Scenarios │
//!       │  (Linux)    │ │ (Test) │ │ (Fixture) │
//!       └─────────────┘ └────────┘ └───────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use memstat_core::collector::{RealFs, SessionConfig, StatSession};
//!
//! let config = SessionConfig::new("/sys/fs/cgroup/memory.stat_bin");
//! let mut session = StatSession::open(&RealFs::new(), config)?;
//! let snapshot = session.poll()?;
//! ```
//!
//! ```
//! use memstat_core::collector::{MockFs, SessionConfig, StatSession, STAT_BIN_FILE, cgroup_file};
//!
//! let fs = MockFs::named_memcg().unwrap();
//! let mut session = StatSession::open(&fs, SessionConfig::new(cgroup_file(STAT_BIN_FILE))).unwrap();
//! assert!(!session.poll().unwrap().is_empty());
//! ```

pub mod mock;
pub mod session;
pub mod traits;

pub use mock::{MockFs, MockStatFile, cgroup_file};
pub use session::{SessionConfig, SessionError, StatSession};
pub use traits::{FileSystem, RealFs, RealStatFile, StatFile};

/// Root of the unified cgroup hierarchy.
pub const DEFAULT_CGROUP_PATH: &str = "/sys/fs/cgroup";

/// Named-value memory statistics.
pub const STAT_BIN_FILE: &str = "memory.stat_bin";

/// Indexed-value per-node statistics.
pub const NUMA_STAT_BIN_FILE: &str = "memory.numa_stat_bin";

/// Indexed-value statistics that also accepts filter lines.
pub const STAT_KS_FILE: &str = "memory.stat.ks";
