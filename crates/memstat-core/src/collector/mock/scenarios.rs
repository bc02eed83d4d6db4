//! Pre-built mock filesystem scenarios for testing.
//!
//! These scenarios provide realistic binary stat files for a single cgroup
//! at [`DEFAULT_CGROUP_PATH`].

use std::path::PathBuf;

use super::filesystem::MockFs;
use crate::codec::{Checksum, EncodeError, IndexedEntry, NamedEntry, Snapshot};
use crate::collector::{DEFAULT_CGROUP_PATH, NUMA_STAT_BIN_FILE, STAT_BIN_FILE, STAT_KS_FILE};

const MIB: u64 = 1024 * 1024;

/// Path of `file` inside the default cgroup.
pub fn cgroup_file(file: &str) -> PathBuf {
    PathBuf::from(DEFAULT_CGROUP_PATH).join(file)
}

impl MockFs {
    /// A cgroup exposing a named-value `memory.stat_bin`.
    pub fn named_memcg() -> Result<Self, EncodeError> {
        let snapshot = Snapshot::from_sections(
            vec![
                NamedEntry::new("anon", 256 * MIB),
                NamedEntry::new("file", 512 * MIB),
                NamedEntry::new("kernel", 24 * MIB),
                NamedEntry::new("kernel_stack", 2 * MIB),
                NamedEntry::new("pagetables", 3 * MIB),
                NamedEntry::new("sock", 0),
                NamedEntry::new("shmem", 16 * MIB),
                NamedEntry::new("slab_reclaimable", 8 * MIB),
                NamedEntry::new("slab_unreclaimable", 4 * MIB),
                NamedEntry::new("unevictable", 0),
            ],
            vec![
                NamedEntry::new("pgfault", 1_234_567),
                NamedEntry::new("pgmajfault", 321),
                NamedEntry::new("oom_kill", 0),
            ],
            vec![],
        )?;

        let mut fs = Self::new();
        fs.add_snapshot(cgroup_file(STAT_BIN_FILE), &snapshot, Checksum::None)?;
        Ok(fs)
    }

    /// A cgroup exposing indexed-value `memory.stat.ks` and
    /// `memory.numa_stat_bin` files (indices per the default name tables).
    pub fn indexed_memcg() -> Result<Self, EncodeError> {
        let stat = Snapshot::from_sections(
            vec![
                IndexedEntry::new(0, 256 * MIB),
                IndexedEntry::new(1, 512 * MIB),
                IndexedEntry::new(2, 24 * MIB),
                IndexedEntry::new(3, MIB),
                IndexedEntry::new(9, 16 * MIB),
            ],
            vec![IndexedEntry::new(8, 1_234_567), IndexedEntry::new(9, 321)],
            vec![],
        )?;
        let numa = Snapshot::from_sections(
            vec![],
            vec![],
            vec![
                IndexedEntry::new(0, 128 * MIB),
                IndexedEntry::new(0, 128 * MIB),
                IndexedEntry::new(1, 300 * MIB),
                IndexedEntry::new(1, 212 * MIB),
            ],
        )?;

        let mut fs = Self::new();
        fs.add_snapshot(cgroup_file(STAT_KS_FILE), &stat, Checksum::None)?;
        fs.add_snapshot(cgroup_file(NUMA_STAT_BIN_FILE), &numa, Checksum::Trailer)?;
        Ok(fs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{AnySnapshot, Integrity, decode_snapshot};
    use crate::collector::traits::{FileSystem, StatFile};

    fn read(fs: &MockFs, file: &str) -> AnySnapshot {
        let mut handle = fs.open(&cgroup_file(file)).unwrap();
        let mut buf = Vec::new();
        handle.read_from_start(&mut buf).unwrap();
        decode_snapshot(&buf).unwrap()
    }

    #[test]
    fn test_named_memcg_decodes() {
        let fs = MockFs::named_memcg().unwrap();
        let AnySnapshot::Named(snapshot) = read(&fs, STAT_BIN_FILE) else {
            panic!("expected named snapshot");
        };
        assert_eq!(snapshot.stat("anon"), Some(256 * MIB));
        assert_eq!(snapshot.events.len(), 3);
    }

    #[test]
    fn test_indexed_memcg_decodes() {
        let fs = MockFs::indexed_memcg().unwrap();
        let stat = read(&fs, STAT_KS_FILE);
        assert_eq!(stat.header().stat_count, 5);

        let numa = read(&fs, NUMA_STAT_BIN_FILE);
        assert_eq!(numa.header().numa_count, 4);
        assert_eq!(numa.integrity(), Integrity::Verified);
    }
}
