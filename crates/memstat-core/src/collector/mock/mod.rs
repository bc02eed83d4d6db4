//! Mock filesystem for testing sessions without a cgroup hierarchy.

pub mod filesystem;
pub mod scenarios;

pub use filesystem::{MockFs, MockStatFile};
pub use scenarios::cgroup_file;
