//! Database file loading and payload access
//!
//! The loader scans the record stream once, recording payload offsets without
//! touching payload bytes. Payloads are fetched later with positional reads,
//! so concurrent workers can share the same file handle.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::os::unix::fs::FileExt;
use std::path::Path;

use flate2::read::DeflateDecoder;
use log::{debug, info};

use super::entry::{Entry, PayloadLocation};
use super::format::{self, RECORD_SIZE};
use super::store::EntryStore;
use super::{DatabaseError, DatabaseResult, ResourceTag};
use crate::foundation::checksum::crc32;
use crate::foundation::scratch::PayloadScratch;

/// An open fossilize database.
#[derive(Debug)]
pub struct Database {
    file: File,
    version: u8,
    store: EntryStore,
}

impl Database {
    /// Open a database file and load its entry catalog.
    ///
    /// A truncated tail (partial record or partial payload) ends the scan
    /// cleanly; entries before the truncation point are kept. Records with a
    /// tag outside the known range fail the load.
    pub fn open(path: &Path) -> DatabaseResult<Self> {
        let file = File::open(path)?;
        let mut header = [0u8; format::HEADER_SIZE];
        match file.read_exact_at(&mut header, 0) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                return Err(DatabaseError::InvalidMagicValue)
            }
            Err(err) => return Err(err.into()),
        }
        if header[..format::MAGIC.len()] != format::MAGIC {
            return Err(DatabaseError::InvalidMagicValue);
        }
        let version = header[format::HEADER_SIZE - 1];

        let file_len = file.metadata()?.len();
        let mut store = EntryStore::new();
        let mut record_bytes = [0u8; RECORD_SIZE];
        let mut offset = format::HEADER_SIZE as u64;
        let mut dropped_links = 0usize;

        while offset + RECORD_SIZE as u64 <= file_len {
            file.read_exact_at(&mut record_bytes, offset)?;
            let record = format::decode_record(&record_bytes)?;
            offset += RECORD_SIZE as u64;

            if offset + u64::from(record.stored_size) > file_len {
                debug!(
                    "payload of {:?} {} runs past end of file, stopping scan",
                    record.tag, record.hash
                );
                break;
            }
            let file_offset = offset;
            offset += u64::from(record.stored_size);

            if record.tag == ResourceTag::ApplicationBlobLink {
                dropped_links += 1;
                continue;
            }
            if record.flags != format::PAYLOAD_PLAIN && record.flags != format::PAYLOAD_DEFLATE {
                return Err(DatabaseError::UnknownPayloadFlags(record.flags));
            }

            store.insert(Entry::new(
                record.tag,
                record.hash,
                PayloadLocation {
                    file_offset,
                    stored_size: record.stored_size,
                    decompressed_size: record.decompressed_size,
                    crc: record.crc,
                    compressed: record.flags == format::PAYLOAD_DEFLATE,
                },
            ));
        }

        info!(
            "loaded {} entries from {} (version {}, {} blob links dropped)",
            store.len(),
            path.display(),
            version,
            dropped_links
        );
        Ok(Self {
            file,
            version,
            store,
        })
    }

    /// Entry catalog.
    pub fn store(&self) -> &EntryStore {
        &self.store
    }

    /// Header version byte.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Read an entry's payload into the caller's scratch buffers.
    ///
    /// Verifies the CRC when the entry carries one and inflates compressed
    /// payloads, insisting on the recorded inflated length.
    pub fn read_payload<'a>(
        &self,
        entry: &Entry,
        scratch: &'a mut PayloadScratch,
    ) -> DatabaseResult<&'a [u8]> {
        let location = &entry.payload;
        let PayloadScratch { stored, inflated } = scratch;
        stored.clear();
        inflated.clear();
        stored.resize(location.stored_size as usize, 0);
        self.file.read_exact_at(stored, location.file_offset)?;

        if location.crc != 0 {
            let computed = crc32(stored);
            if computed != location.crc {
                return Err(DatabaseError::CrcMismatch {
                    stored: location.crc,
                    computed,
                });
            }
        }

        if !location.compressed {
            return Ok(stored.as_slice());
        }

        inflated.reserve(location.decompressed_size as usize);
        let mut decoder = DeflateDecoder::new(stored.as_slice());
        decoder
            .read_to_end(inflated)
            .map_err(|err| DatabaseError::DecompressError(err.to_string()))?;
        if inflated.len() != location.decompressed_size as usize {
            return Err(DatabaseError::DecompressedSizeMismatch {
                expected: location.decompressed_size,
                actual: inflated.len() as u32,
            });
        }
        Ok(inflated.as_slice())
    }
}
