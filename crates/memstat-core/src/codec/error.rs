//! Errors raised by the snapshot codec.

use super::header::Family;

/// Failure to decode a snapshot buffer.
///
/// Offsets are absolute byte positions in the buffer handed to the decoder,
/// so a caller can tell a short read (`Truncated`) from corrupted counts
/// (`TrailingData`) or a foreign file (`BadMagic`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The 4-byte magic matches no known family.
    BadMagic { found: u32 },
    /// Fewer bytes are available than the header or an entry declares.
    Truncated {
        offset: usize,
        expected: usize,
        available: usize,
    },
    /// Bytes remain after every declared entry was consumed.
    TrailingData { offset: usize, remaining: usize },
    /// The CRC-32 trailer does not match the snapshot bytes.
    ChecksumMismatch { expected: u32, actual: u32 },
    /// A typed decoder was handed a buffer of the other family.
    FamilyMismatch { expected: Family, found: Family },
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::BadMagic { found } => write!(f, "bad magic 0x{:08x}", found),
            DecodeError::Truncated {
                offset,
                expected,
                available,
            } => write!(
                f,
                "truncated input at offset {}: need {} bytes, {} available",
                offset, expected, available
            ),
            DecodeError::TrailingData { offset, remaining } => write!(
                f,
                "{} unexpected bytes after last entry at offset {}",
                remaining, offset
            ),
            DecodeError::ChecksumMismatch { expected, actual } => write!(
                f,
                "checksum mismatch: trailer 0x{:08x}, computed 0x{:08x}",
                expected, actual
            ),
            DecodeError::FamilyMismatch { expected, found } => {
                write!(f, "expected {} snapshot, found {}", expected, found)
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// A value the wire format cannot represent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// Entry names are prefixed by a single length byte.
    NameTooLong { len: usize },
    /// Section counts are 16-bit.
    TooManyEntries { section: &'static str, count: usize },
    /// The named-value header has no numa count field.
    NumaCountUnsupported { count: u16 },
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodeError::NameTooLong { len } => {
                write!(f, "entry name is {} bytes, maximum is 255", len)
            }
            EncodeError::TooManyEntries { section, count } => write!(
                f,
                "{} section has {} entries, maximum is {}",
                section,
                count,
                u16::MAX
            ),
            EncodeError::NumaCountUnsupported { count } => write!(
                f,
                "named-value header cannot carry numa count {}",
                count
            ),
        }
    }
}

impl std::error::Error for EncodeError {}
