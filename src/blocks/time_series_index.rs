// blocks/time_series_index.rs
use crate::blocks::common::{put_pad, read_i32, read_i64, read_u32, UUTC_NO_ENTRY};
use crate::red::RED_NAN;
use crate::{Error, Result};

/// Size of one packed index record.
pub const TIME_SERIES_INDEX_BYTES: usize = 56;

pub const TIME_SERIES_INDEX_FILE_OFFSET_NO_ENTRY: i64 = -1;
pub const TIME_SERIES_INDEX_START_SAMPLE_NO_ENTRY: i64 = -1;
pub const TIME_SERIES_INDEX_NUMBER_OF_SAMPLES_NO_ENTRY: u32 = 0xFFFF_FFFF;
pub const TIME_SERIES_INDEX_BLOCK_BYTES_NO_ENTRY: u32 = 0xFFFF_FFFF;

const PROTECTED_REGION_BYTES: usize = 4;
const RED_PROTECTED_REGION_BYTES: usize = 3;
const RED_DISCRETIONARY_REGION_BYTES: usize = 8;

/// One 56-byte record describing a RED block inside a `.tdat` file.
///
/// The ordered array in a `.tidx` file is non-decreasing in both
/// `start_sample` and `file_offset`; `start_sample` counts samples from the
/// beginning of the channel, across segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSeriesIndex {
    /// Byte offset of the block inside its `.tdat` file.
    pub file_offset: i64,
    /// uUTC of the block's first sample.
    pub start_time: i64,
    /// Channel-cumulative index of the block's first sample.
    pub start_sample: i64,
    /// Samples in the block.
    pub number_of_samples: u32,
    /// Total block size: header, differences and padding.
    pub block_bytes: u32,
    /// Largest non-NaN sample value in the block, [`RED_NAN`] if none.
    pub maximum_sample_value: i32,
    /// Smallest non-NaN sample value in the block, [`RED_NAN`] if none.
    pub minimum_sample_value: i32,
    /// Copy of the block header's flag byte.
    pub red_block_flags: u8,
}

impl Default for TimeSeriesIndex {
    fn default() -> Self {
        TimeSeriesIndex {
            file_offset: TIME_SERIES_INDEX_FILE_OFFSET_NO_ENTRY,
            start_time: UUTC_NO_ENTRY,
            start_sample: TIME_SERIES_INDEX_START_SAMPLE_NO_ENTRY,
            number_of_samples: TIME_SERIES_INDEX_NUMBER_OF_SAMPLES_NO_ENTRY,
            block_bytes: TIME_SERIES_INDEX_BLOCK_BYTES_NO_ENTRY,
            maximum_sample_value: RED_NAN,
            minimum_sample_value: RED_NAN,
            red_block_flags: 0,
        }
    }
}

impl TimeSeriesIndex {
    /// Serialize to exactly [`TIME_SERIES_INDEX_BYTES`] bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(TIME_SERIES_INDEX_BYTES);
        buffer.extend_from_slice(&self.file_offset.to_le_bytes());
        buffer.extend_from_slice(&self.start_time.to_le_bytes());
        buffer.extend_from_slice(&self.start_sample.to_le_bytes());
        buffer.extend_from_slice(&self.number_of_samples.to_le_bytes());
        buffer.extend_from_slice(&self.block_bytes.to_le_bytes());
        buffer.extend_from_slice(&self.maximum_sample_value.to_le_bytes());
        buffer.extend_from_slice(&self.minimum_sample_value.to_le_bytes());
        put_pad(&mut buffer, PROTECTED_REGION_BYTES);
        buffer.push(self.red_block_flags);
        put_pad(&mut buffer, RED_PROTECTED_REGION_BYTES);
        put_pad(&mut buffer, RED_DISCRETIONARY_REGION_BYTES);

        if buffer.len() != TIME_SERIES_INDEX_BYTES {
            return Err(Error::InvalidFormat(format!(
                "TimeSeriesIndex must be exactly {} bytes, got {}",
                TIME_SERIES_INDEX_BYTES,
                buffer.len()
            )));
        }
        Ok(buffer)
    }

    /// Parse one index record from the first 56 bytes of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < TIME_SERIES_INDEX_BYTES {
            return Err(Error::TooShortBuffer {
                actual: bytes.len(),
                expected: TIME_SERIES_INDEX_BYTES,
                file: file!(),
                line: line!(),
            });
        }
        Ok(TimeSeriesIndex {
            file_offset: read_i64(bytes, 0)?,
            start_time: read_i64(bytes, 8)?,
            start_sample: read_i64(bytes, 16)?,
            number_of_samples: read_u32(bytes, 24)?,
            block_bytes: read_u32(bytes, 28)?,
            maximum_sample_value: read_i32(bytes, 32)?,
            minimum_sample_value: read_i32(bytes, 36)?,
            red_block_flags: bytes[44],
        })
    }
}
