//! Whole-snapshot decoding and encoding.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ HEADER (family layout, see `header`)         │
//! ├──────────────────────────────────────────────┤
//! │ STAT ENTRIES   × stat_count                  │
//! │ EVENT ENTRIES  × event_count                 │
//! │ NUMA ENTRIES   × numa_stat_count (indexed)   │
//! ├──────────────────────────────────────────────┤
//! │ optional CRC-32 trailer: u32 over all above  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! The header counts are the only framing. The decoder consumes exactly what
//! they declare and then inspects whatever is left: nothing, a 4-byte
//! checksum trailer, or bytes that cannot be explained (corrupted counts or a
//! short read).

use serde::{Deserialize, Serialize};

use super::entry::{IndexedEntry, NamedEntry, WireEntry, read_entries};
use super::error::{DecodeError, EncodeError};
use super::header::{Family, KNOWN_VERSION, SnapshotHeader, read_header, write_header};
use super::reader::Reader;

/// Size of the optional checksum trailer.
pub const TRAILER_LEN: usize = 4;

/// Whether a snapshot's bytes were covered by a checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Integrity {
    /// A CRC-32 trailer was present and matched.
    Verified,
    /// No trailer; correctness rests on the header counts alone.
    Unverified,
}

/// Whether the encoder appends a checksum trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Checksum {
    #[default]
    None,
    Trailer,
}

/// Snapshot section an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Stat,
    Event,
    Numa,
}

impl Section {
    pub fn as_str(self) -> &'static str {
        match self {
            Section::Stat => "stat",
            Section::Event => "event",
            Section::Numa => "numa",
        }
    }
}

/// One decoded point-in-time read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<E> {
    pub header: SnapshotHeader,
    pub stats: Vec<E>,
    pub events: Vec<E>,
    pub numa: Vec<E>,
    pub integrity: Integrity,
}

pub type NamedSnapshot = Snapshot<NamedEntry>;
pub type IndexedSnapshot = Snapshot<IndexedEntry>;

impl<E: WireEntry> Snapshot<E> {
    /// Builds a snapshot whose header matches the given sections.
    pub fn from_sections(
        stats: Vec<E>,
        events: Vec<E>,
        numa: Vec<E>,
    ) -> Result<Self, EncodeError> {
        let header = header_for::<E>(KNOWN_VERSION, &stats, &events, &numa)?;
        Ok(Self {
            header,
            stats,
            events,
            numa,
            integrity: Integrity::Unverified,
        })
    }

    /// Iterates all entries tagged with their section, in wire order.
    pub fn entries(&self) -> impl Iterator<Item = (Section, &E)> {
        self.stats
            .iter()
            .map(|e| (Section::Stat, e))
            .chain(self.events.iter().map(|e| (Section::Event, e)))
            .chain(self.numa.iter().map(|e| (Section::Numa, e)))
    }

    pub fn len(&self) -> usize {
        self.stats.len() + self.events.len() + self.numa.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NamedSnapshot {
    /// Value of the first stat entry called `name`.
    pub fn stat(&self, name: &str) -> Option<u64> {
        self.stats.iter().find(|e| e.name == name).map(|e| e.value)
    }
}

/// A snapshot of whichever family the magic announced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum AnySnapshot {
    Named(NamedSnapshot),
    Indexed(IndexedSnapshot),
}

impl AnySnapshot {
    pub fn header(&self) -> &SnapshotHeader {
        match self {
            AnySnapshot::Named(s) => &s.header,
            AnySnapshot::Indexed(s) => &s.header,
        }
    }

    pub fn family(&self) -> Family {
        self.header().family
    }

    pub fn integrity(&self) -> Integrity {
        match self {
            AnySnapshot::Named(s) => s.integrity,
            AnySnapshot::Indexed(s) => s.integrity,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            AnySnapshot::Named(s) => s.len(),
            AnySnapshot::Indexed(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<NamedSnapshot> for AnySnapshot {
    fn from(s: NamedSnapshot) -> Self {
        AnySnapshot::Named(s)
    }
}

impl From<IndexedSnapshot> for AnySnapshot {
    fn from(s: IndexedSnapshot) -> Self {
        AnySnapshot::Indexed(s)
    }
}

/// Decodes a snapshot of either family. All-or-nothing.
pub fn decode_snapshot(buf: &[u8]) -> Result<AnySnapshot, DecodeError> {
    let mut r = Reader::new(buf);
    let header = read_header(&mut r)?;
    match header.family {
        Family::Named => read_body::<NamedEntry>(&mut r, header).map(AnySnapshot::Named),
        Family::Indexed => read_body::<IndexedEntry>(&mut r, header).map(AnySnapshot::Indexed),
    }
}

/// Decodes a snapshot that must be of the named-value family.
pub fn decode_named_snapshot(buf: &[u8]) -> Result<NamedSnapshot, DecodeError> {
    decode_typed(buf)
}

/// Decodes a snapshot that must be of the indexed-value family.
pub fn decode_indexed_snapshot(buf: &[u8]) -> Result<IndexedSnapshot, DecodeError> {
    decode_typed(buf)
}

fn decode_typed<E: WireEntry>(buf: &[u8]) -> Result<Snapshot<E>, DecodeError> {
    let mut r = Reader::new(buf);
    let header = read_header(&mut r)?;
    if header.family != E::FAMILY {
        return Err(DecodeError::FamilyMismatch {
            expected: E::FAMILY,
            found: header.family,
        });
    }
    read_body(&mut r, header)
}

fn read_body<E: WireEntry>(
    r: &mut Reader<'_>,
    header: SnapshotHeader,
) -> Result<Snapshot<E>, DecodeError> {
    let stats = read_entries(r, header.stat_count as usize)?;
    let events = read_entries(r, header.event_count as usize)?;
    let numa = read_entries(r, header.numa_count as usize)?;
    let integrity = check_tail(r)?;
    Ok(Snapshot {
        header,
        stats,
        events,
        numa,
        integrity,
    })
}

fn check_tail(r: &mut Reader<'_>) -> Result<Integrity, DecodeError> {
    let offset = r.offset();
    match r.remaining() {
        0 => Ok(Integrity::Unverified),
        TRAILER_LEN => {
            let actual = crc32fast::hash(r.consumed());
            let expected = r.u32()?;
            if expected != actual {
                return Err(DecodeError::ChecksumMismatch { expected, actual });
            }
            Ok(Integrity::Verified)
        }
        // Too short to be a trailer or any entry: the read stopped mid-record.
        available if available < TRAILER_LEN => Err(DecodeError::Truncated {
            offset,
            expected: TRAILER_LEN,
            available,
        }),
        remaining => Err(DecodeError::TrailingData { offset, remaining }),
    }
}

/// Serializes a snapshot. Header counts are derived from the section lengths;
/// the header version is preserved.
pub fn encode_snapshot<E: WireEntry>(
    snapshot: &Snapshot<E>,
    checksum: Checksum,
) -> Result<Vec<u8>, EncodeError> {
    let header = header_for::<E>(
        snapshot.header.version,
        &snapshot.stats,
        &snapshot.events,
        &snapshot.numa,
    )?;

    let body_len: usize = snapshot.entries().map(|(_, e)| e.encoded_len()).sum();
    let mut out = Vec::with_capacity(E::FAMILY.header_len() + body_len + TRAILER_LEN);
    write_header(&header, &mut out)?;
    for (_, entry) in snapshot.entries() {
        entry.encode(&mut out)?;
    }
    if checksum == Checksum::Trailer {
        let crc = crc32fast::hash(&out);
        out.extend_from_slice(&crc.to_le_bytes());
    }
    Ok(out)
}

fn header_for<E: WireEntry>(
    version: u8,
    stats: &[E],
    events: &[E],
    numa: &[E],
) -> Result<SnapshotHeader, EncodeError> {
    let count = |section: Section, len: usize| {
        u16::try_from(len).map_err(|_| EncodeError::TooManyEntries {
            section: section.as_str(),
            count: len,
        })
    };
    let stat_count = count(Section::Stat, stats.len())?;
    let event_count = count(Section::Event, events.len())?;
    let numa_count = count(Section::Numa, numa.len())?;
    if E::FAMILY == Family::Named && numa_count != 0 {
        return Err(EncodeError::NumaCountUnsupported { count: numa_count });
    }
    Ok(SnapshotHeader {
        family: E::FAMILY,
        version,
        stat_count,
        event_count,
        numa_count,
    })
}
