//! Maps decoded entries to display form.
//!
//! Each field is classified as a memory quantity (rendered with
//! [`format_bytes_binary`]) or an event counter (rendered as a plain
//! integer). Indexed entries are named through explicit [`SectionTables`];
//! an index missing from its table is shown raw as `#<index>`.

pub mod names;

pub use names::{NameTable, NameTableError, SectionTables};

use serde::Serialize;

use crate::codec::{AnySnapshot, IndexedEntry, NamedEntry, Section, Snapshot, WireEntry};
use crate::fmt::format_bytes_binary;

/// Name fragments marking a stat as a byte quantity.
const BYTE_TOKENS: &[&str] = &[
    "anon", "file", "kernel", "slab", "shmem", "vmalloc", "percpu", "sock", "zswap", "hugetlb",
];

/// Page-count stats whose names contain a byte token.
const COUNT_PREFIXES: &[&str] = &["workingset_"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldClass {
    Bytes,
    Count,
    /// Index not present in the side table.
    Unknown,
}

/// Classify a resolved field name within its section.
///
/// Event counters are always counts; stat and numa fields are bytes when
/// their name carries an allocation-kind token.
pub fn classify(section: Section, name: &str) -> FieldClass {
    if section == Section::Event {
        return FieldClass::Count;
    }
    if COUNT_PREFIXES.iter().any(|p| name.starts_with(p)) {
        return FieldClass::Count;
    }
    if BYTE_TOKENS.iter().any(|t| name.contains(t)) {
        FieldClass::Bytes
    } else {
        FieldClass::Count
    }
}

/// How an entry variant finds its display name.
pub trait FieldName {
    fn resolve<'a>(&'a self, table: &'a NameTable) -> Option<&'a str>;

    /// Label used when [`FieldName::resolve`] finds nothing.
    fn fallback(&self) -> String;
}

impl FieldName for NamedEntry {
    fn resolve<'a>(&'a self, _table: &'a NameTable) -> Option<&'a str> {
        Some(&self.name)
    }

    fn fallback(&self) -> String {
        self.name.clone()
    }
}

impl FieldName for IndexedEntry {
    fn resolve<'a>(&'a self, table: &'a NameTable) -> Option<&'a str> {
        table.resolve(self.index)
    }

    fn fallback(&self) -> String {
        format!("#{}", self.index)
    }
}

/// One entry ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresentedField {
    pub section: Section,
    pub name: String,
    pub value: u64,
    pub class: FieldClass,
    pub display: String,
}

pub fn classify_and_format<E>(section: Section, entry: &E, tables: &SectionTables) -> PresentedField
where
    E: WireEntry + FieldName,
{
    let value = entry.value();
    match entry.resolve(tables.table(section)) {
        Some(name) => {
            let class = classify(section, name);
            PresentedField {
                section,
                name: name.to_string(),
                value,
                class,
                display: render(class, value),
            }
        }
        None => PresentedField {
            section,
            name: entry.fallback(),
            value,
            class: FieldClass::Unknown,
            display: render(FieldClass::Unknown, value),
        },
    }
}

/// Zero byte counts stay bare integers, like counts.
fn render(class: FieldClass, value: u64) -> String {
    match class {
        FieldClass::Bytes if value > 0 => format_bytes_binary(value),
        _ => value.to_string(),
    }
}

pub fn present<E>(snapshot: &Snapshot<E>, tables: &SectionTables) -> Vec<PresentedField>
where
    E: WireEntry + FieldName,
{
    snapshot
        .entries()
        .map(|(section, entry)| classify_and_format(section, entry, tables))
        .collect()
}

pub fn present_snapshot(snapshot: &AnySnapshot, tables: &SectionTables) -> Vec<PresentedField> {
    match snapshot {
        AnySnapshot::Named(s) => present(s, tables),
        AnySnapshot::Indexed(s) => present(s, tables),
    }
}

/// Top-level memory breakdown from the stat section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemorySummary {
    pub anon: u64,
    pub file: u64,
    pub kernel: u64,
}

impl MemorySummary {
    /// Returns `None` when none of the tracked stats is non-zero.
    pub fn from_fields(fields: &[PresentedField]) -> Option<Self> {
        let first = |name: &str| {
            fields
                .iter()
                .find(|f| f.section == Section::Stat && f.name == name)
                .map_or(0, |f| f.value)
        };
        let summary = Self {
            anon: first("anon"),
            file: first("file"),
            kernel: first("kernel"),
        };
        (summary.total() > 0).then_some(summary)
    }

    pub fn total(&self) -> u64 {
        self.anon
            .saturating_add(self.file)
            .saturating_add(self.kernel)
    }
}
