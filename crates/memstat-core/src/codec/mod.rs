//! Binary snapshot codec for `memory.stat_bin`-style files.
//!
//! Two families share the same framing (fixed header, then counted
//! sections of entries) but differ in header layout and entry encoding:
//!
//! | family  | magic        | header | entry                     |
//! |---------|--------------|--------|---------------------------|
//! | named   | `0x5454534D` | 12 B   | `len:u8 name value:u64`   |
//! | indexed | `0x4D454D43` | 11 B   | `idx:u16 value:u64`       |
//!
//! Decoding is a pure function from bytes to an owned snapshot and never
//! returns partial results.

pub mod entry;
pub mod error;
pub mod header;
pub mod reader;
pub mod snapshot;

pub use entry::{IndexedEntry, MAX_NAME_LEN, NamedEntry, WireEntry, decode_entries, encode_entries};
pub use error::{DecodeError, EncodeError};
pub use header::{
    Family, INDEXED_MAGIC, KNOWN_VERSION, NAMED_MAGIC, SnapshotHeader, decode_header,
    encode_header, peek_magic,
};
pub use snapshot::{
    AnySnapshot, Checksum, IndexedSnapshot, Integrity, NamedSnapshot, Section, Snapshot,
    TRAILER_LEN, decode_indexed_snapshot, decode_named_snapshot, decode_snapshot,
    encode_snapshot,
};
