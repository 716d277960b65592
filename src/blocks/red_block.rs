// blocks/red_block.rs
use crate::blocks::common::{put_pad, read_f32, read_i64, read_u32, CRC_NO_ENTRY, UUTC_NO_ENTRY};
use crate::{Error, Result};

/// Size of the fixed RED block header preceding the difference payload.
pub const RED_BLOCK_HEADER_BYTES: usize = 304;

/// Offset of the first difference byte inside a block.
pub const RED_BLOCK_COMPRESSED_DATA_OFFSET: usize = RED_BLOCK_HEADER_BYTES;

/// Size of the difference-byte frequency histogram.
pub const RED_BLOCK_STATISTICS_BYTES: usize = 256;

/// Flag bit: the block starts a discontinuity.
pub const RED_DISCONTINUITY_MASK: u8 = 0x01;
/// Flag bit: the difference payload is encrypted with the level-1 key.
pub const RED_LEVEL_1_ENCRYPTION_MASK: u8 = 0x02;
/// Flag bit: the difference payload is encrypted with the level-2 key.
pub const RED_LEVEL_2_ENCRYPTION_MASK: u8 = 0x04;

const PROTECTED_REGION_BYTES: usize = 3;
const DISCRETIONARY_REGION_BYTES: usize = 8;

/// The 304-byte header of one RED block.
///
/// `block_crc` covers bytes `4..block_bytes` of the final block image
/// (header remainder, differences and padding, after any encryption).
#[derive(Debug, Clone)]
pub struct RedBlockHeader {
    pub block_crc: u32,
    pub flags: u8,
    pub detrend_slope: f32,
    pub detrend_intercept: f32,
    pub scale_factor: f32,
    /// Encoded difference bytes, before padding.
    pub difference_bytes: u32,
    pub number_of_samples: u32,
    /// Total block size: header, differences and padding.
    pub block_bytes: u32,
    pub start_time: i64,
    /// Normalized difference histogram; advisory, ignored on decode.
    pub statistics: [u8; RED_BLOCK_STATISTICS_BYTES],
}

impl Default for RedBlockHeader {
    fn default() -> Self {
        RedBlockHeader {
            block_crc: CRC_NO_ENTRY,
            flags: 0,
            detrend_slope: 0.0,
            detrend_intercept: 0.0,
            scale_factor: 1.0,
            difference_bytes: 0,
            number_of_samples: 0,
            block_bytes: 0,
            start_time: UUTC_NO_ENTRY,
            statistics: [0; RED_BLOCK_STATISTICS_BYTES],
        }
    }
}

impl RedBlockHeader {
    pub fn is_discontinuity(&self) -> bool {
        self.flags & RED_DISCONTINUITY_MASK != 0
    }

    pub fn is_level_1_encrypted(&self) -> bool {
        self.flags & RED_LEVEL_1_ENCRYPTION_MASK != 0
    }

    pub fn is_level_2_encrypted(&self) -> bool {
        self.flags & RED_LEVEL_2_ENCRYPTION_MASK != 0
    }

    pub fn set_discontinuity(&mut self, value: bool) {
        if value {
            self.flags |= RED_DISCONTINUITY_MASK;
        } else {
            self.flags &= !RED_DISCONTINUITY_MASK;
        }
    }

    pub fn set_level_1_encryption(&mut self, value: bool) {
        if value {
            self.flags |= RED_LEVEL_1_ENCRYPTION_MASK;
        } else {
            self.flags &= !RED_LEVEL_1_ENCRYPTION_MASK;
        }
    }

    pub fn set_level_2_encryption(&mut self, value: bool) {
        if value {
            self.flags |= RED_LEVEL_2_ENCRYPTION_MASK;
        } else {
            self.flags &= !RED_LEVEL_2_ENCRYPTION_MASK;
        }
    }

    /// Serialize to exactly [`RED_BLOCK_HEADER_BYTES`] bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(RED_BLOCK_HEADER_BYTES);
        buffer.extend_from_slice(&self.block_crc.to_le_bytes());
        buffer.push(self.flags);
        put_pad(&mut buffer, PROTECTED_REGION_BYTES);
        put_pad(&mut buffer, DISCRETIONARY_REGION_BYTES);
        buffer.extend_from_slice(&self.detrend_slope.to_le_bytes());
        buffer.extend_from_slice(&self.detrend_intercept.to_le_bytes());
        buffer.extend_from_slice(&self.scale_factor.to_le_bytes());
        buffer.extend_from_slice(&self.difference_bytes.to_le_bytes());
        buffer.extend_from_slice(&self.number_of_samples.to_le_bytes());
        buffer.extend_from_slice(&self.block_bytes.to_le_bytes());
        buffer.extend_from_slice(&self.start_time.to_le_bytes());
        buffer.extend_from_slice(&self.statistics);

        if buffer.len() != RED_BLOCK_HEADER_BYTES {
            return Err(Error::InvalidFormat(format!(
                "RedBlockHeader must be exactly {} bytes, got {}",
                RED_BLOCK_HEADER_BYTES,
                buffer.len()
            )));
        }
        Ok(buffer)
    }

    /// Parse a block header from the first 304 bytes of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < RED_BLOCK_HEADER_BYTES {
            return Err(Error::TooShortBuffer {
                actual: bytes.len(),
                expected: RED_BLOCK_HEADER_BYTES,
                file: file!(),
                line: line!(),
            });
        }
        let mut statistics = [0u8; RED_BLOCK_STATISTICS_BYTES];
        statistics.copy_from_slice(&bytes[48..48 + RED_BLOCK_STATISTICS_BYTES]);
        Ok(RedBlockHeader {
            block_crc: read_u32(bytes, 0)?,
            flags: bytes[4],
            detrend_slope: read_f32(bytes, 16)?,
            detrend_intercept: read_f32(bytes, 20)?,
            scale_factor: read_f32(bytes, 24)?,
            difference_bytes: read_u32(bytes, 28)?,
            number_of_samples: read_u32(bytes, 32)?,
            block_bytes: read_u32(bytes, 36)?,
            start_time: read_i64(bytes, 40)?,
            statistics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_is_304() {
        let bytes = RedBlockHeader::default().to_bytes().unwrap();
        assert_eq!(bytes.len(), RED_BLOCK_HEADER_BYTES);
    }

    #[test]
    fn round_trip() {
        let mut header = RedBlockHeader {
            block_crc: 0x1234_5678,
            flags: 0,
            detrend_slope: 0.0,
            detrend_intercept: 0.0,
            scale_factor: 1.0,
            difference_bytes: 871,
            number_of_samples: 500,
            block_bytes: 1184,
            start_time: 1_000_000_000_000,
            statistics: [0; RED_BLOCK_STATISTICS_BYTES],
        };
        header.set_discontinuity(true);
        header.statistics[128] = 255;

        let parsed = RedBlockHeader::from_bytes(&header.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed.block_crc, 0x1234_5678);
        assert!(parsed.is_discontinuity());
        assert!(!parsed.is_level_1_encrypted());
        assert_eq!(parsed.difference_bytes, 871);
        assert_eq!(parsed.number_of_samples, 500);
        assert_eq!(parsed.block_bytes, 1184);
        assert_eq!(parsed.start_time, 1_000_000_000_000);
        assert_eq!(parsed.statistics[128], 255);
        assert_eq!(parsed.scale_factor, 1.0);
    }

    #[test]
    fn flag_setters() {
        let mut header = RedBlockHeader::default();
        header.set_level_1_encryption(true);
        assert!(header.is_level_1_encrypted());
        header.set_level_2_encryption(true);
        assert_eq!(header.flags, RED_LEVEL_1_ENCRYPTION_MASK | RED_LEVEL_2_ENCRYPTION_MASK);
        header.set_level_1_encryption(false);
        assert!(!header.is_level_1_encrypted());
        assert!(header.is_level_2_encrypted());
    }
}
