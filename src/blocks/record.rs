// blocks/record.rs
//
// Record (annotation) streams live in .rdat/.ridx files. The format reserves
// these structures; this crate declares them for layout compatibility but
// neither produces nor consumes record streams.

use crate::blocks::common::{
    put_fixed_str, read_fixed_str, read_i64, read_u32, CRC_NO_ENTRY, TYPE_BYTES, UUTC_NO_ENTRY,
};
use crate::crypt::NO_ENCRYPTION;
use crate::{Error, Result};

/// Size of a packed record header.
pub const RECORD_HEADER_BYTES: usize = 24;
/// Size of a packed record index entry.
pub const RECORD_INDEX_BYTES: usize = 24;

pub const RECORD_VERSION_NO_ENTRY: u8 = 0xFF;

/// 24-byte header preceding one record in a `.rdat` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    pub record_crc: u32,
    pub type_string: String,
    pub version_major: u8,
    pub version_minor: u8,
    pub encryption: i8,
    pub bytes: u32,
    pub time: i64,
}

impl Default for RecordHeader {
    fn default() -> Self {
        RecordHeader {
            record_crc: CRC_NO_ENTRY,
            type_string: String::new(),
            version_major: RECORD_VERSION_NO_ENTRY,
            version_minor: RECORD_VERSION_NO_ENTRY,
            encryption: NO_ENCRYPTION,
            bytes: 0,
            time: UUTC_NO_ENTRY,
        }
    }
}

impl RecordHeader {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(RECORD_HEADER_BYTES);
        buffer.extend_from_slice(&self.record_crc.to_le_bytes());
        put_fixed_str(&mut buffer, &self.type_string, TYPE_BYTES);
        buffer.push(self.version_major);
        buffer.push(self.version_minor);
        buffer.push(self.encryption as u8);
        buffer.extend_from_slice(&self.bytes.to_le_bytes());
        buffer.extend_from_slice(&self.time.to_le_bytes());

        if buffer.len() != RECORD_HEADER_BYTES {
            return Err(Error::InvalidFormat(format!(
                "RecordHeader must be exactly {} bytes, got {}",
                RECORD_HEADER_BYTES,
                buffer.len()
            )));
        }
        Ok(buffer)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < RECORD_HEADER_BYTES {
            return Err(Error::TooShortBuffer {
                actual: bytes.len(),
                expected: RECORD_HEADER_BYTES,
                file: file!(),
                line: line!(),
            });
        }
        Ok(RecordHeader {
            record_crc: read_u32(bytes, 0)?,
            type_string: read_fixed_str(&bytes[4..4 + TYPE_BYTES]),
            version_major: bytes[9],
            version_minor: bytes[10],
            encryption: bytes[11] as i8,
            bytes: read_u32(bytes, 12)?,
            time: read_i64(bytes, 16)?,
        })
    }
}

/// 24-byte entry in a `.ridx` file pointing at one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordIndex {
    pub type_string: String,
    pub version_major: u8,
    pub version_minor: u8,
    pub encryption: i8,
    pub file_offset: i64,
    pub time: i64,
}

impl Default for RecordIndex {
    fn default() -> Self {
        RecordIndex {
            type_string: String::new(),
            version_major: RECORD_VERSION_NO_ENTRY,
            version_minor: RECORD_VERSION_NO_ENTRY,
            encryption: NO_ENCRYPTION,
            file_offset: -1,
            time: UUTC_NO_ENTRY,
        }
    }
}

impl RecordIndex {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(RECORD_INDEX_BYTES);
        put_fixed_str(&mut buffer, &self.type_string, TYPE_BYTES);
        buffer.push(self.version_major);
        buffer.push(self.version_minor);
        buffer.push(self.encryption as u8);
        buffer.extend_from_slice(&self.file_offset.to_le_bytes());
        buffer.extend_from_slice(&self.time.to_le_bytes());

        if buffer.len() != RECORD_INDEX_BYTES {
            return Err(Error::InvalidFormat(format!(
                "RecordIndex must be exactly {} bytes, got {}",
                RECORD_INDEX_BYTES,
                buffer.len()
            )));
        }
        Ok(buffer)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < RECORD_INDEX_BYTES {
            return Err(Error::TooShortBuffer {
                actual: bytes.len(),
                expected: RECORD_INDEX_BYTES,
                file: file!(),
                line: line!(),
            });
        }
        Ok(RecordIndex {
            type_string: read_fixed_str(&bytes[0..TYPE_BYTES]),
            version_major: bytes[5],
            version_minor: bytes[6],
            encryption: bytes[7] as i8,
            file_offset: read_i64(bytes, 8)?,
            time: read_i64(bytes, 16)?,
        })
    }
}
