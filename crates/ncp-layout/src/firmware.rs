//! Firmware header: the 256-byte block prefixed to every firmware image

use crate::error::{LayoutError, Result};

/// Size in bytes of a firmware header
pub const HEADER_SIZE: usize = 256;

/// Firmware magic number: ASCII "NFZ1" read little-endian
pub const MAGIC: u32 = 0x4E46_5A31;

const OFFSET_MAGIC: usize = 0;
const OFFSET_VERSION: usize = 4;
const OFFSET_SIZE: usize = 8;
const OFFSET_CRC32: usize = 12;
const OFFSET_NAME: usize = 16;
const NAME_LEN: usize = 32;
const OFFSET_DESCRIPTION: usize = 48;
const DESCRIPTION_LEN: usize = 128;
const OFFSET_BUILD_TIMESTAMP: usize = 176;

/// Parsed firmware header
#[derive(Debug, Clone, PartialEq)]
pub struct FirmwareHeader {
    /// Header version
    pub version: u32,
    /// Size in bytes of the firmware payload following the header
    pub firmware_size: u32,
    /// CRC-32 of the firmware payload, as recorded by the builder
    pub crc32: u32,
    /// Human-readable firmware name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Build timestamp (unix epoch seconds)
    pub build_timestamp: u64,
}

impl FirmwareHeader {
    /// Parse a header from its first [`HEADER_SIZE`] bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(LayoutError::short_buffer(HEADER_SIZE, data.len()));
        }

        let magic = u32::from_le_bytes(data[OFFSET_MAGIC..OFFSET_MAGIC + 4].try_into().unwrap());
        if magic != MAGIC {
            return Err(LayoutError::InvalidMagic {
                expected: MAGIC,
                found: magic,
            });
        }

        let version =
            u32::from_le_bytes(data[OFFSET_VERSION..OFFSET_VERSION + 4].try_into().unwrap());
        let firmware_size =
            u32::from_le_bytes(data[OFFSET_SIZE..OFFSET_SIZE + 4].try_into().unwrap());
        let crc32 = u32::from_le_bytes(data[OFFSET_CRC32..OFFSET_CRC32 + 4].try_into().unwrap());
        let name = decode_cstr(&data[OFFSET_NAME..OFFSET_NAME + NAME_LEN]);
        let description =
            decode_cstr(&data[OFFSET_DESCRIPTION..OFFSET_DESCRIPTION + DESCRIPTION_LEN]);
        let build_timestamp = u64::from_le_bytes(
            data[OFFSET_BUILD_TIMESTAMP..OFFSET_BUILD_TIMESTAMP + 8]
                .try_into()
                .unwrap(),
        );

        Ok(Self {
            version,
            firmware_size,
            crc32,
            name,
            description,
            build_timestamp,
        })
    }

    /// Encode this header into a fixed [`HEADER_SIZE`] buffer
    pub fn to_bytes(&self) -> Result<[u8; HEADER_SIZE]> {
        let mut buf = [0u8; HEADER_SIZE];
        buf[OFFSET_MAGIC..OFFSET_MAGIC + 4].copy_from_slice(&MAGIC.to_le_bytes());
        buf[OFFSET_VERSION..OFFSET_VERSION + 4].copy_from_slice(&self.version.to_le_bytes());
        buf[OFFSET_SIZE..OFFSET_SIZE + 4].copy_from_slice(&self.firmware_size.to_le_bytes());
        buf[OFFSET_CRC32..OFFSET_CRC32 + 4].copy_from_slice(&self.crc32.to_le_bytes());

        encode_cstr(&self.name, &mut buf[OFFSET_NAME..OFFSET_NAME + NAME_LEN], "name")?;
        encode_cstr(
            &self.description,
            &mut buf[OFFSET_DESCRIPTION..OFFSET_DESCRIPTION + DESCRIPTION_LEN],
            "description",
        )?;
        buf[OFFSET_BUILD_TIMESTAMP..OFFSET_BUILD_TIMESTAMP + 8]
            .copy_from_slice(&self.build_timestamp.to_le_bytes());

        Ok(buf)
    }
}

/// Compute the CRC-32 of a firmware payload, matching the checksum field a
/// builder records in the header. This crate never rejects a mismatch itself
/// (see the Node model's `load_firmware`); it only exposes the computation
/// for callers that want to verify.
pub fn compute_crc32(payload: &[u8]) -> u32 {
    crc32fast::hash(payload)
}

fn decode_cstr(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

fn encode_cstr(value: &str, slot: &mut [u8], field: &'static str) -> Result<()> {
    let bytes = value.as_bytes();
    if bytes.len() > slot.len() {
        return Err(LayoutError::FieldTooLong {
            field,
            limit: slot.len(),
        });
    }
    slot[..bytes.len()].copy_from_slice(bytes);
    Ok(())
}
