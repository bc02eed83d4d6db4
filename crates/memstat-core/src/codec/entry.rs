//! Counter records.
//!
//! A snapshot carries exactly one entry variant, selected by its family:
//! ```text
//! named:   name_len:u8 name:[u8; name_len] value:u64
//! indexed: idx:u16 value:u64
//! ```

use serde::{Deserialize, Serialize};

use super::error::{DecodeError, EncodeError};
use super::header::Family;
use super::reader::Reader;

/// Longest name a single length byte can describe.
pub const MAX_NAME_LEN: usize = u8::MAX as usize;

/// One record of a snapshot section.
pub trait WireEntry: Sized + Clone + PartialEq + std::fmt::Debug {
    /// Family whose snapshots carry this entry variant.
    const FAMILY: Family;

    /// Smallest possible encoding of one entry.
    const MIN_LEN: usize;

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError>;

    fn encode(&self, out: &mut Vec<u8>) -> Result<(), EncodeError>;

    fn encoded_len(&self) -> usize;

    fn value(&self) -> u64;
}

/// Counter carrying its own name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedEntry {
    pub name: String,
    pub value: u64,
}

impl NamedEntry {
    pub fn new(name: impl Into<String>, value: u64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

impl WireEntry for NamedEntry {
    const FAMILY: Family = Family::Named;
    const MIN_LEN: usize = 1 + 8;

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let start = r.offset();
        r.require_from(start, 1)?;
        let name_len = r.u8()? as usize;
        // Length byte plus name plus value, reported against the entry start.
        r.require_from(start, 1 + name_len + 8)?;
        let name = String::from_utf8_lossy(r.bytes(name_len)?).into_owned();
        let value = r.u64()?;
        Ok(Self { name, value })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        let len = self.name.len();
        if len > MAX_NAME_LEN {
            return Err(EncodeError::NameTooLong { len });
        }
        out.push(len as u8);
        out.extend_from_slice(self.name.as_bytes());
        out.extend_from_slice(&self.value.to_le_bytes());
        Ok(())
    }

    fn encoded_len(&self) -> usize {
        1 + self.name.len() + 8
    }

    fn value(&self) -> u64 {
        self.value
    }
}

/// Counter keyed by a field index into an out-of-band name table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedEntry {
    pub index: u16,
    pub value: u64,
}

impl IndexedEntry {
    pub fn new(index: u16, value: u64) -> Self {
        Self { index, value }
    }
}

impl WireEntry for IndexedEntry {
    const FAMILY: Family = Family::Indexed;
    const MIN_LEN: usize = 2 + 8;

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        r.require_from(r.offset(), Self::MIN_LEN)?;
        let index = r.u16()?;
        let value = r.u64()?;
        Ok(Self { index, value })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        out.extend_from_slice(&self.index.to_le_bytes());
        out.extend_from_slice(&self.value.to_le_bytes());
        Ok(())
    }

    fn encoded_len(&self) -> usize {
        Self::MIN_LEN
    }

    fn value(&self) -> u64 {
        self.value
    }
}

/// Serializes a run of entries back to back, with no count prefix.
pub fn encode_entries<E: WireEntry>(entries: &[E]) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::with_capacity(entries.iter().map(E::encoded_len).sum());
    for entry in entries {
        entry.encode(&mut out)?;
    }
    Ok(out)
}

/// Decodes exactly `count` entries spanning the whole of `buf`.
pub fn decode_entries<E: WireEntry>(buf: &[u8], count: usize) -> Result<Vec<E>, DecodeError> {
    let mut r = Reader::new(buf);
    let entries = read_entries(&mut r, count)?;
    if r.remaining() > 0 {
        return Err(DecodeError::TrailingData {
            offset: r.offset(),
            remaining: r.remaining(),
        });
    }
    Ok(entries)
}

pub(crate) fn read_entries<E: WireEntry>(
    r: &mut Reader<'_>,
    count: usize,
) -> Result<Vec<E>, DecodeError> {
    // Cap the allocation by what the buffer could hold so a corrupt count
    // cannot request a huge vector.
    let mut entries = Vec::with_capacity(count.min(r.remaining() / E::MIN_LEN));
    for _ in 0..count {
        entries.push(E::decode(r)?);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_entry_layout() {
        let bytes = encode_entries(&[NamedEntry::new("anon", 0x0102)]).unwrap();
        assert_eq!(
            bytes,
            vec![4, b'a', b'n', b'o', b'n', 0x02, 0x01, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_indexed_entry_layout() {
        let bytes = encode_entries(&[IndexedEntry::new(3, 1_048_576)]).unwrap();
        assert_eq!(bytes, vec![3, 0, 0, 0, 0x10, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_entries_roundtrip() {
        let named = vec![
            NamedEntry::new("anon", 4096),
            NamedEntry::new("", 0),
            NamedEntry::new("pgfault", u64::MAX),
            NamedEntry::new("anon", 1),
        ];
        let bytes = encode_entries(&named).unwrap();
        assert_eq!(decode_entries::<NamedEntry>(&bytes, named.len()).unwrap(), named);

        let indexed = vec![IndexedEntry::new(0, 1), IndexedEntry::new(u16::MAX, 2)];
        let bytes = encode_entries(&indexed).unwrap();
        assert_eq!(
            decode_entries::<IndexedEntry>(&bytes, indexed.len()).unwrap(),
            indexed
        );
    }

    #[test]
    fn test_name_of_256_bytes_is_rejected() {
        let entry = NamedEntry::new("x".repeat(256), 1);
        assert_eq!(
            encode_entries(&[entry]),
            Err(EncodeError::NameTooLong { len: 256 })
        );
    }

    #[test]
    fn test_name_of_255_bytes_decodes() {
        let name = "n".repeat(255);
        let mut bytes = vec![255u8];
        bytes.extend_from_slice(name.as_bytes());
        bytes.extend_from_slice(&0xDEAD_BEEF_u64.to_le_bytes());

        let entries = decode_entries::<NamedEntry>(&bytes, 1).unwrap();
        assert_eq!(entries, vec![NamedEntry::new(name, 0xDEAD_BEEF)]);
    }

    #[test]
    fn test_short_named_entry_reports_entry_offset() {
        let bytes = encode_entries(&[NamedEntry::new("file", 7), NamedEntry::new("slab", 9)])
            .unwrap();
        let cut = &bytes[..bytes.len() - 3];
        assert_eq!(
            decode_entries::<NamedEntry>(cut, 2),
            Err(DecodeError::Truncated {
                offset: 13,
                expected: 13,
                available: 10
            })
        );
    }

    #[test]
    fn test_short_indexed_entry() {
        assert_eq!(
            decode_entries::<IndexedEntry>(&[1, 0, 5], 1),
            Err(DecodeError::Truncated {
                offset: 0,
                expected: 10,
                available: 3
            })
        );
    }

    #[test]
    fn test_extra_bytes_after_count() {
        let bytes = encode_entries(&[IndexedEntry::new(1, 1), IndexedEntry::new(2, 2)]).unwrap();
        assert_eq!(
            decode_entries::<IndexedEntry>(&bytes, 1),
            Err(DecodeError::TrailingData {
                offset: 10,
                remaining: 10
            })
        );
    }

    #[test]
    fn test_non_utf8_name_is_lossy() {
        let bytes = [2u8, 0xFF, b'a', 1, 0, 0, 0, 0, 0, 0, 0];
        let entries = decode_entries::<NamedEntry>(&bytes, 1).unwrap();
        assert_eq!(entries[0].name, "\u{FFFD}a");
        assert_eq!(entries[0].value, 1);
    }
}
