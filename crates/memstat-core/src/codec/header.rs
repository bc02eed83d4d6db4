//! Fixed-size snapshot prologue.
//!
//! Layouts (all integers little-endian):
//! ```text
//! named-value   (12 bytes): magic:u32 version:u8 reserved:[u8; 3] stat_count:u16 event_count:u16
//! indexed-value (11 bytes): magic:u32 version:u8 stat_count:u16 event_count:u16 numa_stat_count:u16
//! ```

use serde::{Deserialize, Serialize};

use super::error::{DecodeError, EncodeError};
use super::reader::Reader;

/// "MSTT" read as a little-endian u32.
pub const NAMED_MAGIC: u32 = 0x5454_534D;
/// "MEMC" as a big-endian word; the stream carries the bytes `CMEM`.
pub const INDEXED_MAGIC: u32 = 0x4D45_4D43;

/// Header version this reader was written against.
pub const KNOWN_VERSION: u8 = 1;

const MAGIC_LEN: usize = 4;
const NAMED_HEADER_LEN: usize = 12;
const INDEXED_HEADER_LEN: usize = 11;

/// Binary layout family, identified by the magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    /// Length-prefixed names inline with every value (`memory.stat_bin`).
    Named,
    /// 16-bit field indices resolved through a side table.
    Indexed,
}

impl Family {
    pub const fn magic(self) -> u32 {
        match self {
            Family::Named => NAMED_MAGIC,
            Family::Indexed => INDEXED_MAGIC,
        }
    }

    pub const fn header_len(self) -> usize {
        match self {
            Family::Named => NAMED_HEADER_LEN,
            Family::Indexed => INDEXED_HEADER_LEN,
        }
    }

    pub fn from_magic(magic: u32) -> Option<Self> {
        match magic {
            NAMED_MAGIC => Some(Family::Named),
            INDEXED_MAGIC => Some(Family::Indexed),
            _ => None,
        }
    }
}

impl std::fmt::Display for Family {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Family::Named => f.write_str("named-value"),
            Family::Indexed => f.write_str("indexed-value"),
        }
    }
}

/// Decoded snapshot prologue.
///
/// `numa_count` is always zero for [`Family::Named`]; its layout has no
/// field for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub family: Family,
    pub version: u8,
    pub stat_count: u16,
    pub event_count: u16,
    pub numa_count: u16,
}

impl SnapshotHeader {
    pub fn named(stat_count: u16, event_count: u16) -> Self {
        Self {
            family: Family::Named,
            version: KNOWN_VERSION,
            stat_count,
            event_count,
            numa_count: 0,
        }
    }

    pub fn indexed(stat_count: u16, event_count: u16, numa_count: u16) -> Self {
        Self {
            family: Family::Indexed,
            version: KNOWN_VERSION,
            stat_count,
            event_count,
            numa_count,
        }
    }

    /// Unknown versions still decode; callers may want to report them.
    pub fn is_known_version(&self) -> bool {
        self.version == KNOWN_VERSION
    }

    pub fn magic(&self) -> u32 {
        self.family.magic()
    }

    /// Total number of entries the header promises.
    pub fn entry_count(&self) -> usize {
        self.stat_count as usize + self.event_count as usize + self.numa_count as usize
    }
}

/// Serializes a header in its family's layout.
pub fn encode_header(header: &SnapshotHeader) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::with_capacity(header.family.header_len());
    write_header(header, &mut out)?;
    Ok(out)
}

pub(crate) fn write_header(header: &SnapshotHeader, out: &mut Vec<u8>) -> Result<(), EncodeError> {
    out.extend_from_slice(&header.magic().to_le_bytes());
    out.push(header.version);
    match header.family {
        Family::Named => {
            if header.numa_count != 0 {
                return Err(EncodeError::NumaCountUnsupported {
                    count: header.numa_count,
                });
            }
            out.extend_from_slice(&[0u8; 3]);
            out.extend_from_slice(&header.stat_count.to_le_bytes());
            out.extend_from_slice(&header.event_count.to_le_bytes());
        }
        Family::Indexed => {
            out.extend_from_slice(&header.stat_count.to_le_bytes());
            out.extend_from_slice(&header.event_count.to_le_bytes());
            out.extend_from_slice(&header.numa_count.to_le_bytes());
        }
    }
    Ok(())
}

/// Parses the prologue at the start of `buf`, detecting the family from the magic.
pub fn decode_header(buf: &[u8]) -> Result<SnapshotHeader, DecodeError> {
    read_header(&mut Reader::new(buf))
}

/// Reads the magic without validating the rest of the header.
pub fn peek_magic(buf: &[u8]) -> Option<u32> {
    let bytes: [u8; MAGIC_LEN] = buf.get(..MAGIC_LEN)?.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}

pub(crate) fn read_header(r: &mut Reader<'_>) -> Result<SnapshotHeader, DecodeError> {
    let start = r.offset();
    r.require_from(start, MAGIC_LEN)?;
    let magic = r.u32()?;
    let family = Family::from_magic(magic).ok_or(DecodeError::BadMagic { found: magic })?;
    // Check the whole header up front so truncation reports the header start.
    r.require_from(start, family.header_len())?;

    let version = r.u8()?;
    let header = match family {
        Family::Named => {
            r.bytes(3)?;
            SnapshotHeader {
                family,
                version,
                stat_count: r.u16()?,
                event_count: r.u16()?,
                numa_count: 0,
            }
        }
        Family::Indexed => SnapshotHeader {
            family,
            version,
            stat_count: r.u16()?,
            event_count: r.u16()?,
            numa_count: r.u16()?,
        },
    };
    Ok(header)
}
