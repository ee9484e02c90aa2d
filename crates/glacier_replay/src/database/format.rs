//! On-disk format of a fossilize database
//!
//! A 16-byte header (magic, three reserved bytes, one version byte) followed
//! by fixed-width entry records, each immediately followed by its payload.
//! The record starts with a 40-character ASCII-hex key: 8 characters of
//! padding, 16 encoding the tag, 16 encoding the content hash.

use std::fmt;

use serde::de::Visitor;
use serde::{Deserialize, Deserializer};

use super::{DatabaseError, DatabaseResult};

/// Magic bytes at the start of every database file.
pub const MAGIC: [u8; 12] = *b"\x81FOSSILIZEDB";

/// Size of the file header in bytes.
pub const HEADER_SIZE: usize = 16;

/// Version byte written into new database headers.
pub const HEADER_VERSION: u8 = 6;

/// Length of the ASCII-hex key field of an entry record.
pub const KEY_HEX_SIZE: usize = 40;

/// Size of one on-disk entry record, excluding its payload.
pub const RECORD_SIZE: usize = KEY_HEX_SIZE + 16;

/// Payload stored verbatim.
pub const PAYLOAD_PLAIN: u32 = 1;

/// Payload stored as raw deflate.
pub const PAYLOAD_DEFLATE: u32 = 2;

/// Kind of object an entry describes, ordered by dependency depth.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceTag {
    /// Recording application identity; exactly one expected per database.
    ApplicationInfo = 0,
    /// `VkSampler` description.
    Sampler = 1,
    /// `VkDescriptorSetLayout` description.
    DescriptorSetLayout = 2,
    /// `VkPipelineLayout` description.
    PipelineLayout = 3,
    /// SPIR-V shader module.
    ShaderModule = 4,
    /// `VkRenderPass` description.
    RenderPass = 5,
    /// Graphics pipeline state.
    GraphicsPipeline = 6,
    /// Compute pipeline state.
    ComputePipeline = 7,
    /// Cross-application link blob; dropped at load time.
    ApplicationBlobLink = 8,
    /// Ray-tracing pipeline state.
    RaytracingPipeline = 9,
}

impl ResourceTag {
    /// Map a raw tag byte to a tag, if it is in range.
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::ApplicationInfo),
            1 => Some(Self::Sampler),
            2 => Some(Self::DescriptorSetLayout),
            3 => Some(Self::PipelineLayout),
            4 => Some(Self::ShaderModule),
            5 => Some(Self::RenderPass),
            6 => Some(Self::GraphicsPipeline),
            7 => Some(Self::ComputePipeline),
            8 => Some(Self::ApplicationBlobLink),
            9 => Some(Self::RaytracingPipeline),
            _ => None,
        }
    }

    /// True for graphics, compute, and ray-tracing pipelines.
    pub fn is_pipeline(self) -> bool {
        matches!(
            self,
            Self::GraphicsPipeline | Self::ComputePipeline | Self::RaytracingPipeline
        )
    }

    /// True when replaying this tag yields a driver handle to destroy.
    pub fn produces_handle(self) -> bool {
        !matches!(self, Self::ApplicationInfo | Self::ApplicationBlobLink)
    }
}

/// 64-bit content hash identifying an entry within its tag.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash(pub u64);

impl Hash {
    /// The all-zero hash, used as a "no reference" sentinel in payloads.
    pub const NULL: Self = Self(0);

    /// True for the "no reference" sentinel.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({:016x})", self.0)
    }
}

impl From<u64> for Hash {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

// Payloads reference hashes either as 16-digit hex strings or as integers.
impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct HashVisitor;

        impl Visitor<'_> for HashVisitor {
            type Value = Hash;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a hex string or an unsigned integer")
            }

            fn visit_str<E: serde::de::Error>(self, value: &str) -> Result<Hash, E> {
                u64::from_str_radix(value, 16)
                    .map(Hash)
                    .map_err(|_| E::custom("hash is not valid hex"))
            }

            fn visit_u64<E: serde::de::Error>(self, value: u64) -> Result<Hash, E> {
                Ok(Hash(value))
            }
        }

        deserializer.deserialize_any(HashVisitor)
    }
}

/// Decoded fixed-width portion of an on-disk entry record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryRecord {
    /// Object kind.
    pub tag: ResourceTag,
    /// Content hash.
    pub hash: Hash,
    /// Payload length as stored on disk.
    pub stored_size: u32,
    /// Payload storage flags (`PAYLOAD_PLAIN` or `PAYLOAD_DEFLATE`).
    pub flags: u32,
    /// CRC32/zlib of the stored payload; 0 disables verification.
    pub crc: u32,
    /// Payload length after inflation; equals `stored_size` when plain.
    pub decompressed_size: u32,
}

fn parse_hex_field(bytes: &[u8]) -> DatabaseResult<u64> {
    let text = std::str::from_utf8(bytes).map_err(|_| DatabaseError::BadKeyEncoding)?;
    u64::from_str_radix(text, 16).map_err(|_| DatabaseError::BadKeyEncoding)
}

fn read_u32_le(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Decode one entry record. The first eight key characters are padding.
pub fn decode_record(bytes: &[u8; RECORD_SIZE]) -> DatabaseResult<EntryRecord> {
    let raw_tag = parse_hex_field(&bytes[8..24])?;
    let tag = u8::try_from(raw_tag)
        .ok()
        .and_then(ResourceTag::from_u8)
        .ok_or(DatabaseError::UnknownTag(raw_tag))?;
    let hash = Hash(parse_hex_field(&bytes[24..40])?);
    Ok(EntryRecord {
        tag,
        hash,
        stored_size: read_u32_le(bytes, KEY_HEX_SIZE),
        flags: read_u32_le(bytes, KEY_HEX_SIZE + 4),
        crc: read_u32_le(bytes, KEY_HEX_SIZE + 8),
        decompressed_size: read_u32_le(bytes, KEY_HEX_SIZE + 12),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(tag: u64, hash: u64, sizes: [u32; 4]) -> [u8; RECORD_SIZE] {
        let mut bytes = [0u8; RECORD_SIZE];
        bytes[..KEY_HEX_SIZE]
            .copy_from_slice(format!("{:08x}{tag:016x}{hash:016x}", 0).as_bytes());
        for (i, value) in sizes.iter().enumerate() {
            bytes[KEY_HEX_SIZE + 4 * i..KEY_HEX_SIZE + 4 * (i + 1)]
                .copy_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn test_decode_record() {
        let record = decode_record(&encode(6, 0xDEAD_BEEF, [64, PAYLOAD_PLAIN, 7, 64]))
            .expect("valid record");
        assert_eq!(record.tag, ResourceTag::GraphicsPipeline);
        assert_eq!(record.hash, Hash(0xDEAD_BEEF));
        assert_eq!(record.stored_size, 64);
        assert_eq!(record.flags, PAYLOAD_PLAIN);
        assert_eq!(record.crc, 7);
        assert_eq!(record.decompressed_size, 64);
    }

    #[test]
    fn test_decode_unknown_tag() {
        let err = decode_record(&encode(0x2A, 1, [0, PAYLOAD_PLAIN, 0, 0])).unwrap_err();
        assert!(matches!(err, DatabaseError::UnknownTag(0x2A)));
    }

    #[test]
    fn test_decode_bad_hex() {
        let mut bytes = encode(1, 1, [0, PAYLOAD_PLAIN, 0, 0]);
        bytes[10] = b'g';
        let err = decode_record(&bytes).unwrap_err();
        assert!(matches!(err, DatabaseError::BadKeyEncoding));
    }

    #[test]
    fn test_tag_round_trip() {
        for raw in 0..=9u8 {
            let tag = ResourceTag::from_u8(raw).expect("known tag");
            assert_eq!(tag as u8, raw);
        }
        assert!(ResourceTag::from_u8(10).is_none());
    }

    #[test]
    fn test_hash_display() {
        assert_eq!(Hash(0xAB).to_string(), "00000000000000ab");
    }

    #[test]
    fn test_hash_deserialize_forms() {
        let from_str: Hash = serde_json::from_str("\"00000000000000ab\"").expect("hex string");
        let from_int: Hash = serde_json::from_str("171").expect("integer");
        assert_eq!(from_str, Hash(0xAB));
        assert_eq!(from_int, Hash(171));
    }
}
