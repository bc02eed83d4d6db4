//! memstat-core: binary cgroup memory-stat snapshots.
//!
//! Provides:
//! - `codec`: wire format for named-value and indexed-value snapshots
//! - `filter`: field-filter control lines
//! - `present`: field naming, byte/count classification, summaries
//! - `collector`: stat-file sessions over a real or mock filesystem
//! - `fmt`: shared formatting helpers (bytes, magic, hex preview)

pub mod codec;
pub mod collector;
pub mod filter;
pub mod fmt;
pub mod present;
