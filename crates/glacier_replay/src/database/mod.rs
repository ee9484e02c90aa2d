//! Fossilize database access
//!
//! The on-disk format, the in-memory entry catalog, and the per-entry replay
//! state live here. Entries are immutable after load except for the atomic
//! replay fields on [`entry::Entry`].

pub mod entry;
pub mod format;
pub mod reader;
pub mod store;

use thiserror::Error;

pub use entry::{Claim, Entry, EntryStatus, PayloadLocation};
pub use format::{EntryRecord, Hash, ResourceTag};
pub use reader::Database;
pub use store::EntryStore;

/// Errors raised while reading the database file.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// The file does not start with the fossilize magic.
    #[error("database magic value does not match")]
    InvalidMagicValue,

    /// An entry key field is not ASCII hex.
    #[error("entry key field is not ASCII hex")]
    BadKeyEncoding,

    /// An entry carries a tag outside the known range.
    #[error("unknown resource tag {0:#x}")]
    UnknownTag(u64),

    /// An entry carries payload flags outside the known set.
    #[error("unknown payload flags {0:#x}")]
    UnknownPayloadFlags(u32),

    /// The stored payload does not match its recorded checksum.
    #[error("payload CRC mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    CrcMismatch {
        /// Checksum recorded in the entry header.
        stored: u32,
        /// Checksum computed over the stored bytes.
        computed: u32,
    },

    /// The compressed payload failed to inflate.
    #[error("payload failed to inflate: {0}")]
    DecompressError(String),

    /// The inflated payload has the wrong length.
    #[error("inflated payload is {actual} bytes, expected {expected}")]
    DecompressedSizeMismatch {
        /// Length recorded in the entry header.
        expected: u32,
        /// Length actually produced by inflation.
        actual: u32,
    },

    /// An underlying I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for database operations.
pub type DatabaseResult<T> = Result<T, DatabaseError>;

#[cfg(test)]
pub(crate) mod fixtures {
    //! On-disk database builders shared by reader and replay tests.

    use std::io::Write;

    use flate2::write::DeflateEncoder;
    use flate2::Compression;
    use tempfile::NamedTempFile;

    use super::format::{self, Hash, ResourceTag};
    use crate::foundation::checksum::crc32;

    /// Builds a fossilize database file byte-by-byte.
    pub struct DbBuilder {
        bytes: Vec<u8>,
    }

    impl DbBuilder {
        pub fn new() -> Self {
            let mut bytes = Vec::new();
            bytes.extend_from_slice(&format::MAGIC);
            bytes.extend_from_slice(&[0, 0, 0]);
            bytes.push(format::HEADER_VERSION);
            Self { bytes }
        }

        fn push_record(
            &mut self,
            tag: u64,
            hash: Hash,
            stored: &[u8],
            flags: u32,
            crc: u32,
            decompressed_size: u32,
        ) {
            self.bytes
                .extend_from_slice(format!("{:08x}{:016x}{:016x}", 0, tag, hash.0).as_bytes());
            self.bytes.extend_from_slice(&(stored.len() as u32).to_le_bytes());
            self.bytes.extend_from_slice(&flags.to_le_bytes());
            self.bytes.extend_from_slice(&crc.to_le_bytes());
            self.bytes.extend_from_slice(&decompressed_size.to_le_bytes());
            self.bytes.extend_from_slice(stored);
        }

        /// Append an uncompressed entry with a valid CRC.
        pub fn entry(mut self, tag: ResourceTag, hash: Hash, payload: &[u8]) -> Self {
            self.push_record(
                tag as u64,
                hash,
                payload,
                format::PAYLOAD_PLAIN,
                crc32(payload),
                payload.len() as u32,
            );
            self
        }

        /// Append an uncompressed entry with CRC checking disabled.
        pub fn entry_no_crc(mut self, tag: ResourceTag, hash: Hash, payload: &[u8]) -> Self {
            self.push_record(
                tag as u64,
                hash,
                payload,
                format::PAYLOAD_PLAIN,
                0,
                payload.len() as u32,
            );
            self
        }

        /// Append an uncompressed entry with a deliberately wrong CRC.
        pub fn entry_bad_crc(mut self, tag: ResourceTag, hash: Hash, payload: &[u8]) -> Self {
            self.push_record(
                tag as u64,
                hash,
                payload,
                format::PAYLOAD_PLAIN,
                crc32(payload) ^ 1,
                payload.len() as u32,
            );
            self
        }

        /// Append a deflate-compressed entry.
        pub fn entry_compressed(mut self, tag: ResourceTag, hash: Hash, payload: &[u8]) -> Self {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(payload).expect("deflate write");
            let stored = encoder.finish().expect("deflate finish");
            let crc = crc32(&stored);
            self.push_record(
                tag as u64,
                hash,
                &stored,
                format::PAYLOAD_DEFLATE,
                crc,
                payload.len() as u32,
            );
            self
        }

        /// Append a deflate-compressed entry whose recorded inflated size lies.
        pub fn entry_compressed_wrong_size(
            mut self,
            tag: ResourceTag,
            hash: Hash,
            payload: &[u8],
        ) -> Self {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(payload).expect("deflate write");
            let stored = encoder.finish().expect("deflate finish");
            let crc = crc32(&stored);
            self.push_record(
                tag as u64,
                hash,
                &stored,
                format::PAYLOAD_DEFLATE,
                crc,
                payload.len() as u32 + 1,
            );
            self
        }

        /// Append an entry with a raw (possibly unknown) tag value.
        pub fn entry_raw_tag(mut self, tag: u64, hash: Hash, payload: &[u8]) -> Self {
            self.push_record(
                tag,
                hash,
                payload,
                format::PAYLOAD_PLAIN,
                0,
                payload.len() as u32,
            );
            self
        }

        /// Append arbitrary trailing bytes (for truncation tests).
        pub fn trailing(mut self, bytes: &[u8]) -> Self {
            self.bytes.extend_from_slice(bytes);
            self
        }

        /// Write the database to a named temporary file.
        pub fn write(self) -> NamedTempFile {
            let mut file = NamedTempFile::new().expect("temp db file");
            file.write_all(&self.bytes).expect("write db");
            file.flush().expect("flush db");
            file
        }
    }
}
