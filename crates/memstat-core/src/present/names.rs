//! Out-of-band field-name tables for indexed snapshots.
//!
//! Indexed entries carry only a 16-bit field index. The names live in a side
//! table the client supplies, one table per snapshot section.

use std::collections::BTreeMap;

use crate::codec::Section;

/// Field names in the order `memory.stat` prints them.
const MEMCG_STAT_FIELDS: &[&str] = &[
    "anon",
    "file",
    "kernel",
    "kernel_stack",
    "pagetables",
    "sec_pagetables",
    "percpu",
    "sock",
    "vmalloc",
    "shmem",
    "zswap",
    "zswapped",
    "file_mapped",
    "file_dirty",
    "file_writeback",
    "swapcached",
    "anon_thp",
    "file_thp",
    "shmem_thp",
    "inactive_anon",
    "active_anon",
    "inactive_file",
    "active_file",
    "unevictable",
    "slab_reclaimable",
    "slab_unreclaimable",
    "slab",
    "workingset_refault_anon",
    "workingset_refault_file",
    "workingset_activate_anon",
    "workingset_activate_file",
    "workingset_restore_anon",
    "workingset_restore_file",
    "workingset_nodereclaim",
];

const MEMCG_EVENT_FIELDS: &[&str] = &[
    "pgscan",
    "pgsteal",
    "pgscan_kswapd",
    "pgscan_direct",
    "pgscan_khugepaged",
    "pgsteal_kswapd",
    "pgsteal_direct",
    "pgsteal_khugepaged",
    "pgfault",
    "pgmajfault",
    "pgrefill",
    "pgactivate",
    "pgdeactivate",
    "pglazyfree",
    "pglazyfreed",
    "zswpin",
    "zswpout",
    "zswpwb",
    "thp_fault_alloc",
    "thp_collapse_alloc",
    "thp_swpout",
    "thp_swpout_fallback",
];

/// Field names in the order `memory.numa_stat` prints them.
const MEMCG_NUMA_FIELDS: &[&str] = &[
    "anon",
    "file",
    "kernel_stack",
    "pagetables",
    "sec_pagetables",
    "shmem",
    "file_mapped",
    "file_dirty",
    "file_writeback",
    "swapcached",
    "anon_thp",
    "file_thp",
    "shmem_thp",
    "inactive_anon",
    "active_anon",
    "inactive_file",
    "active_file",
    "unevictable",
    "slab_reclaimable",
    "slab_unreclaimable",
];

/// Error loading a name table file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTableError {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for NameTableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for NameTableError {}

/// Index to name mapping; may be dense or sparse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameTable {
    names: BTreeMap<u16, String>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dense table: the n-th name gets index n.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: (0u16..).zip(names.into_iter().map(Into::into)).collect(),
        }
    }

    pub fn insert(&mut self, index: u16, name: impl Into<String>) {
        self.names.insert(index, name.into());
    }

    pub fn resolve(&self, index: u16) -> Option<&str> {
        self.names.get(&index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Parses a side-table file.
    ///
    /// Each non-blank line is either `name` (takes the index after the
    /// previous entry) or `index name`. `#` starts a comment.
    ///
    /// ```text
    /// # memory.stat_bin stat section
    /// anon
    /// file
    /// 10 shmem
    /// ```
    pub fn parse(content: &str) -> Result<Self, NameTableError> {
        let mut table = Self::new();
        let mut next: u32 = 0;

        for (lineno, raw) in content.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }
            let err = |message: String| NameTableError {
                line: lineno + 1,
                message,
            };

            let parts: Vec<&str> = line.split_whitespace().collect();
            let (index, name) = match parts.as_slice() {
                [name] => (next, *name),
                [index, name] => {
                    let index = index
                        .parse::<u16>()
                        .map_err(|_| err(format!("invalid index '{}'", index)))?;
                    (index as u32, *name)
                }
                _ => return Err(err(format!("expected 'name' or 'index name', got '{}'", line))),
            };
            let index =
                u16::try_from(index).map_err(|_| err("index exceeds 65535".to_string()))?;
            if let Some(existing) = table.resolve(index) {
                return Err(err(format!(
                    "index {} already assigned to '{}'",
                    index, existing
                )));
            }
            table.insert(index, name);
            next = index as u32 + 1;
        }

        Ok(table)
    }
}

/// Name tables for every section of an indexed snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionTables {
    pub stat: NameTable,
    pub event: NameTable,
    pub numa: NameTable,
}

impl SectionTables {
    /// Tables following the text-file field order of the memory controller.
    pub fn memcg_default() -> Self {
        Self {
            stat: NameTable::from_names(MEMCG_STAT_FIELDS.iter().copied()),
            event: NameTable::from_names(MEMCG_EVENT_FIELDS.iter().copied()),
            numa: NameTable::from_names(MEMCG_NUMA_FIELDS.iter().copied()),
        }
    }

    pub fn table(&self, section: Section) -> &NameTable {
        match section {
            Section::Stat => &self.stat,
            Section::Event => &self.event,
            Section::Numa => &self.numa,
        }
    }

    pub fn table_mut(&mut self, section: Section) -> &mut NameTable {
        match section {
            Section::Stat => &mut self.stat,
            Section::Event => &mut self.event,
            Section::Numa => &mut self.numa,
        }
    }
}
