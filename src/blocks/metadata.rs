// blocks/metadata.rs
//
// The .tmet file is a fixed 16384-byte image: a universal header, then three
// metadata sections at well-known absolute offsets. Each section serializes
// independently; the writer assembles the image and pads the gaps with 0x7E.

use crate::blocks::common::{
    put_fixed_str, put_pad, read_f64, read_fixed_str, read_i32, read_i64, read_u32,
    GMT_OFFSET_NO_ENTRY, UUTC_NO_ENTRY,
};
use crate::crypt::NO_ENCRYPTION;
use crate::{Error, Result};

/// Total size of a metadata file.
pub const METADATA_FILE_BYTES: usize = 16384;

/// Absolute offset of section 1 (immediately after the universal header).
pub const METADATA_SECTION_1_OFFSET: usize = 1024;
pub const METADATA_SECTION_1_BYTES: usize = 1536;
const SECTION_1_PROTECTED_BYTES: usize = 766;
const SECTION_1_DISCRETIONARY_BYTES: usize = 768;

/// Absolute offset of section 2 (type-specific metadata).
pub const METADATA_SECTION_2_OFFSET: usize = 2560;
pub const METADATA_SECTION_2_BYTES: usize = 10752;

/// Absolute offset of section 3 (subject/time metadata).
pub const METADATA_SECTION_3_OFFSET: usize = 13312;
pub const METADATA_SECTION_3_BYTES: usize = 3072;

/// Absolute offset of `sampling_frequency` inside a .tmet file.
pub const TIME_SERIES_METADATA_SAMPLING_FREQUENCY_OFFSET: usize = 8720;

pub const METADATA_CHANNEL_DESCRIPTION_BYTES: usize = 2048;
pub const METADATA_SESSION_DESCRIPTION_BYTES: usize = 2048;
pub const TIME_SERIES_METADATA_REFERENCE_DESCRIPTION_BYTES: usize = 2048;
pub const TIME_SERIES_METADATA_UNITS_DESCRIPTION_BYTES: usize = 128;
pub const METADATA_SUBJECT_NAME_BYTES: usize = 128;
pub const METADATA_SUBJECT_ID_BYTES: usize = 128;
pub const METADATA_RECORDING_LOCATION_BYTES: usize = 512;

const SECTION_2_PROTECTED_BYTES: usize = 2160;
const SECTION_2_DISCRETIONARY_BYTES: usize = 2160;
const SECTION_3_PROTECTED_BYTES: usize = 1124;
const SECTION_3_DISCRETIONARY_BYTES: usize = 1024;

pub const METADATA_RECORDING_DURATION_NO_ENTRY: i64 = -1;
pub const TIME_SERIES_METADATA_ACQUISITION_CHANNEL_NUMBER_NO_ENTRY: i64 = -1;
pub const TIME_SERIES_METADATA_SAMPLING_FREQUENCY_NO_ENTRY: f64 = -1.0;
pub const TIME_SERIES_METADATA_FILTER_SETTING_NO_ENTRY: f64 = -1.0;
pub const TIME_SERIES_METADATA_UNITS_CONVERSION_FACTOR_NO_ENTRY: f64 = 0.0;
pub const TIME_SERIES_METADATA_START_SAMPLE_NO_ENTRY: i64 = -1;
pub const TIME_SERIES_METADATA_NUMBER_OF_SAMPLES_NO_ENTRY: i64 = -1;
pub const TIME_SERIES_METADATA_NUMBER_OF_BLOCKS_NO_ENTRY: i64 = -1;
pub const TIME_SERIES_METADATA_MAXIMUM_BLOCK_BYTES_NO_ENTRY: i64 = -1;
pub const TIME_SERIES_METADATA_MAXIMUM_BLOCK_SAMPLES_NO_ENTRY: u32 = 0xFFFF_FFFF;
pub const TIME_SERIES_METADATA_MAXIMUM_DIFFERENCE_BYTES_NO_ENTRY: u32 = 0xFFFF_FFFF;
pub const TIME_SERIES_METADATA_BLOCK_INTERVAL_NO_ENTRY: i64 = -1;
pub const TIME_SERIES_METADATA_NUMBER_OF_DISCONTINUITIES_NO_ENTRY: i64 = -1;
pub const TIME_SERIES_METADATA_MAXIMUM_CONTIGUOUS_NO_ENTRY: i64 = -1;

/// Metadata section 1: per-section encryption levels.
#[derive(Debug, Clone)]
pub struct MetadataSection1 {
    pub section_2_encryption: i8,
    pub section_3_encryption: i8,
}

impl Default for MetadataSection1 {
    fn default() -> Self {
        MetadataSection1 {
            section_2_encryption: NO_ENCRYPTION,
            section_3_encryption: NO_ENCRYPTION,
        }
    }
}

impl MetadataSection1 {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(METADATA_SECTION_1_BYTES);
        buffer.push(self.section_2_encryption as u8);
        buffer.push(self.section_3_encryption as u8);
        put_pad(&mut buffer, SECTION_1_PROTECTED_BYTES);
        put_pad(&mut buffer, SECTION_1_DISCRETIONARY_BYTES);
        debug_assert_eq!(buffer.len(), METADATA_SECTION_1_BYTES);
        Ok(buffer)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 2 {
            return Err(Error::TooShortBuffer {
                actual: bytes.len(),
                expected: 2,
                file: file!(),
                line: line!(),
            });
        }
        Ok(MetadataSection1 {
            section_2_encryption: bytes[0] as i8,
            section_3_encryption: bytes[1] as i8,
        })
    }
}

/// Time-series metadata section 2.
///
/// Holds the channel's acquisition parameters and the aggregate block
/// statistics the writer computes at segment finalization.
#[derive(Debug, Clone)]
pub struct TimeSeriesMetadataSection2 {
    pub channel_description: String,
    pub session_description: String,
    pub recording_duration: i64,
    pub reference_description: String,
    pub acquisition_channel_number: i64,
    pub sampling_frequency: f64,
    pub low_frequency_filter_setting: f64,
    pub high_frequency_filter_setting: f64,
    pub notch_filter_frequency_setting: f64,
    pub ac_line_frequency: f64,
    pub units_conversion_factor: f64,
    pub units_description: String,
    pub maximum_native_sample_value: f64,
    pub minimum_native_sample_value: f64,
    pub start_sample: i64,
    pub number_of_samples: i64,
    pub number_of_blocks: i64,
    pub maximum_block_bytes: i64,
    pub maximum_block_samples: u32,
    pub maximum_difference_bytes: u32,
    pub block_interval: i64,
    pub number_of_discontinuities: i64,
    pub maximum_contiguous_blocks: i64,
    pub maximum_contiguous_block_bytes: i64,
    pub maximum_contiguous_samples: i64,
}

impl Default for TimeSeriesMetadataSection2 {
    fn default() -> Self {
        TimeSeriesMetadataSection2 {
            channel_description: String::new(),
            session_description: String::new(),
            recording_duration: METADATA_RECORDING_DURATION_NO_ENTRY,
            reference_description: String::new(),
            acquisition_channel_number: TIME_SERIES_METADATA_ACQUISITION_CHANNEL_NUMBER_NO_ENTRY,
            sampling_frequency: TIME_SERIES_METADATA_SAMPLING_FREQUENCY_NO_ENTRY,
            low_frequency_filter_setting: TIME_SERIES_METADATA_FILTER_SETTING_NO_ENTRY,
            high_frequency_filter_setting: TIME_SERIES_METADATA_FILTER_SETTING_NO_ENTRY,
            notch_filter_frequency_setting: TIME_SERIES_METADATA_FILTER_SETTING_NO_ENTRY,
            ac_line_frequency: TIME_SERIES_METADATA_FILTER_SETTING_NO_ENTRY,
            units_conversion_factor: TIME_SERIES_METADATA_UNITS_CONVERSION_FACTOR_NO_ENTRY,
            units_description: String::new(),
            maximum_native_sample_value: f64::NAN,
            minimum_native_sample_value: f64::NAN,
            start_sample: TIME_SERIES_METADATA_START_SAMPLE_NO_ENTRY,
            number_of_samples: TIME_SERIES_METADATA_NUMBER_OF_SAMPLES_NO_ENTRY,
            number_of_blocks: TIME_SERIES_METADATA_NUMBER_OF_BLOCKS_NO_ENTRY,
            maximum_block_bytes: TIME_SERIES_METADATA_MAXIMUM_BLOCK_BYTES_NO_ENTRY,
            maximum_block_samples: TIME_SERIES_METADATA_MAXIMUM_BLOCK_SAMPLES_NO_ENTRY,
            maximum_difference_bytes: TIME_SERIES_METADATA_MAXIMUM_DIFFERENCE_BYTES_NO_ENTRY,
            block_interval: TIME_SERIES_METADATA_BLOCK_INTERVAL_NO_ENTRY,
            number_of_discontinuities: TIME_SERIES_METADATA_NUMBER_OF_DISCONTINUITIES_NO_ENTRY,
            maximum_contiguous_blocks: TIME_SERIES_METADATA_MAXIMUM_CONTIGUOUS_NO_ENTRY,
            maximum_contiguous_block_bytes: TIME_SERIES_METADATA_MAXIMUM_CONTIGUOUS_NO_ENTRY,
            maximum_contiguous_samples: TIME_SERIES_METADATA_MAXIMUM_CONTIGUOUS_NO_ENTRY,
        }
    }
}

impl TimeSeriesMetadataSection2 {
    /// Serialize to exactly [`METADATA_SECTION_2_BYTES`] bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(METADATA_SECTION_2_BYTES);
        put_fixed_str(
            &mut buffer,
            &self.channel_description,
            METADATA_CHANNEL_DESCRIPTION_BYTES,
        );
        put_fixed_str(
            &mut buffer,
            &self.session_description,
            METADATA_SESSION_DESCRIPTION_BYTES,
        );
        buffer.extend_from_slice(&self.recording_duration.to_le_bytes());
        put_fixed_str(
            &mut buffer,
            &self.reference_description,
            TIME_SERIES_METADATA_REFERENCE_DESCRIPTION_BYTES,
        );
        buffer.extend_from_slice(&self.acquisition_channel_number.to_le_bytes());
        buffer.extend_from_slice(&self.sampling_frequency.to_le_bytes());
        buffer.extend_from_slice(&self.low_frequency_filter_setting.to_le_bytes());
        buffer.extend_from_slice(&self.high_frequency_filter_setting.to_le_bytes());
        buffer.extend_from_slice(&self.notch_filter_frequency_setting.to_le_bytes());
        buffer.extend_from_slice(&self.ac_line_frequency.to_le_bytes());
        buffer.extend_from_slice(&self.units_conversion_factor.to_le_bytes());
        put_fixed_str(
            &mut buffer,
            &self.units_description,
            TIME_SERIES_METADATA_UNITS_DESCRIPTION_BYTES,
        );
        buffer.extend_from_slice(&self.maximum_native_sample_value.to_le_bytes());
        buffer.extend_from_slice(&self.minimum_native_sample_value.to_le_bytes());
        buffer.extend_from_slice(&self.start_sample.to_le_bytes());
        buffer.extend_from_slice(&self.number_of_samples.to_le_bytes());
        buffer.extend_from_slice(&self.number_of_blocks.to_le_bytes());
        buffer.extend_from_slice(&self.maximum_block_bytes.to_le_bytes());
        buffer.extend_from_slice(&self.maximum_block_samples.to_le_bytes());
        buffer.extend_from_slice(&self.maximum_difference_bytes.to_le_bytes());
        buffer.extend_from_slice(&self.block_interval.to_le_bytes());
        buffer.extend_from_slice(&self.number_of_discontinuities.to_le_bytes());
        buffer.extend_from_slice(&self.maximum_contiguous_blocks.to_le_bytes());
        buffer.extend_from_slice(&self.maximum_contiguous_block_bytes.to_le_bytes());
        buffer.extend_from_slice(&self.maximum_contiguous_samples.to_le_bytes());
        put_pad(&mut buffer, SECTION_2_PROTECTED_BYTES);
        put_pad(&mut buffer, SECTION_2_DISCRETIONARY_BYTES);

        if buffer.len() != METADATA_SECTION_2_BYTES {
            return Err(Error::InvalidFormat(format!(
                "TimeSeriesMetadataSection2 must be exactly {} bytes, got {}",
                METADATA_SECTION_2_BYTES,
                buffer.len()
            )));
        }
        Ok(buffer)
    }

    /// Parse a section 2 image (the slice starting at its section offset).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < METADATA_SECTION_2_BYTES {
            return Err(Error::TooShortBuffer {
                actual: bytes.len(),
                expected: METADATA_SECTION_2_BYTES,
                file: file!(),
                line: line!(),
            });
        }
        Ok(TimeSeriesMetadataSection2 {
            channel_description: read_fixed_str(&bytes[0..2048]),
            session_description: read_fixed_str(&bytes[2048..4096]),
            recording_duration: read_i64(bytes, 4096)?,
            reference_description: read_fixed_str(&bytes[4104..6152]),
            acquisition_channel_number: read_i64(bytes, 6152)?,
            sampling_frequency: read_f64(bytes, 6160)?,
            low_frequency_filter_setting: read_f64(bytes, 6168)?,
            high_frequency_filter_setting: read_f64(bytes, 6176)?,
            notch_filter_frequency_setting: read_f64(bytes, 6184)?,
            ac_line_frequency: read_f64(bytes, 6192)?,
            units_conversion_factor: read_f64(bytes, 6200)?,
            units_description: read_fixed_str(&bytes[6208..6336]),
            maximum_native_sample_value: read_f64(bytes, 6336)?,
            minimum_native_sample_value: read_f64(bytes, 6344)?,
            start_sample: read_i64(bytes, 6352)?,
            number_of_samples: read_i64(bytes, 6360)?,
            number_of_blocks: read_i64(bytes, 6368)?,
            maximum_block_bytes: read_i64(bytes, 6376)?,
            maximum_block_samples: read_u32(bytes, 6384)?,
            maximum_difference_bytes: read_u32(bytes, 6388)?,
            block_interval: read_i64(bytes, 6392)?,
            number_of_discontinuities: read_i64(bytes, 6400)?,
            maximum_contiguous_blocks: read_i64(bytes, 6408)?,
            maximum_contiguous_block_bytes: read_i64(bytes, 6416)?,
            maximum_contiguous_samples: read_i64(bytes, 6424)?,
        })
    }
}

/// Metadata section 3: recording time context and subject identity.
#[derive(Debug, Clone)]
pub struct MetadataSection3 {
    pub recording_time_offset: i64,
    pub dst_start_time: i64,
    pub dst_end_time: i64,
    pub gmt_offset: i32,
    pub subject_name_1: String,
    pub subject_name_2: String,
    pub subject_id: String,
    pub recording_location: String,
}

impl Default for MetadataSection3 {
    fn default() -> Self {
        MetadataSection3 {
            recording_time_offset: UUTC_NO_ENTRY,
            dst_start_time: UUTC_NO_ENTRY,
            dst_end_time: UUTC_NO_ENTRY,
            gmt_offset: GMT_OFFSET_NO_ENTRY,
            subject_name_1: String::new(),
            subject_name_2: String::new(),
            subject_id: String::new(),
            recording_location: String::new(),
        }
    }
}

impl MetadataSection3 {
    /// Serialize to exactly [`METADATA_SECTION_3_BYTES`] bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(METADATA_SECTION_3_BYTES);
        buffer.extend_from_slice(&self.recording_time_offset.to_le_bytes());
        buffer.extend_from_slice(&self.dst_start_time.to_le_bytes());
        buffer.extend_from_slice(&self.dst_end_time.to_le_bytes());
        buffer.extend_from_slice(&self.gmt_offset.to_le_bytes());
        put_fixed_str(&mut buffer, &self.subject_name_1, METADATA_SUBJECT_NAME_BYTES);
        put_fixed_str(&mut buffer, &self.subject_name_2, METADATA_SUBJECT_NAME_BYTES);
        put_fixed_str(&mut buffer, &self.subject_id, METADATA_SUBJECT_ID_BYTES);
        put_fixed_str(
            &mut buffer,
            &self.recording_location,
            METADATA_RECORDING_LOCATION_BYTES,
        );
        put_pad(&mut buffer, SECTION_3_PROTECTED_BYTES);
        put_pad(&mut buffer, SECTION_3_DISCRETIONARY_BYTES);

        if buffer.len() != METADATA_SECTION_3_BYTES {
            return Err(Error::InvalidFormat(format!(
                "MetadataSection3 must be exactly {} bytes, got {}",
                METADATA_SECTION_3_BYTES,
                buffer.len()
            )));
        }
        Ok(buffer)
    }

    /// Parse a section 3 image (the slice starting at its section offset).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < METADATA_SECTION_3_BYTES {
            return Err(Error::TooShortBuffer {
                actual: bytes.len(),
                expected: METADATA_SECTION_3_BYTES,
                file: file!(),
                line: line!(),
            });
        }
        Ok(MetadataSection3 {
            recording_time_offset: read_i64(bytes, 0)?,
            dst_start_time: read_i64(bytes, 8)?,
            dst_end_time: read_i64(bytes, 16)?,
            gmt_offset: read_i32(bytes, 24)?,
            subject_name_1: read_fixed_str(&bytes[28..156]),
            subject_name_2: read_fixed_str(&bytes[156..284]),
            subject_id: read_fixed_str(&bytes[284..412]),
            recording_location: read_fixed_str(&bytes[412..924]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_sizes() {
        assert_eq!(
            MetadataSection1::default().to_bytes().unwrap().len(),
            METADATA_SECTION_1_BYTES
        );
        assert_eq!(
            TimeSeriesMetadataSection2::default().to_bytes().unwrap().len(),
            METADATA_SECTION_2_BYTES
        );
        assert_eq!(
            MetadataSection3::default().to_bytes().unwrap().len(),
            METADATA_SECTION_3_BYTES
        );
        // Sections tile the file exactly
        assert_eq!(
            METADATA_SECTION_3_OFFSET + METADATA_SECTION_3_BYTES,
            METADATA_FILE_BYTES
        );
        assert_eq!(
            METADATA_SECTION_2_OFFSET + METADATA_SECTION_2_BYTES,
            METADATA_SECTION_3_OFFSET
        );
    }

    #[test]
    fn sampling_frequency_offset_is_pinned() {
        // sampling_frequency sits at absolute offset 8720 inside the file,
        // i.e. 6160 bytes into section 2.
        assert_eq!(
            METADATA_SECTION_2_OFFSET + 6160,
            TIME_SERIES_METADATA_SAMPLING_FREQUENCY_OFFSET
        );
        let mut meta2 = TimeSeriesMetadataSection2::default();
        meta2.sampling_frequency = 1024.0;
        let bytes = meta2.to_bytes().unwrap();
        assert_eq!(read_f64(&bytes, 6160).unwrap(), 1024.0);
    }

    #[test]
    fn section_2_round_trip() {
        let mut meta2 = TimeSeriesMetadataSection2::default();
        meta2.channel_description = "frontal electrode".to_string();
        meta2.session_description = "overnight recording".to_string();
        meta2.recording_duration = 3_600_000_000;
        meta2.sampling_frequency = 250.0;
        meta2.units_conversion_factor = 0.001;
        meta2.units_description = "uV".to_string();
        meta2.number_of_samples = 900_000;
        meta2.number_of_blocks = 900;
        meta2.maximum_block_samples = 1000;
        meta2.maximum_block_bytes = 4096;
        meta2.block_interval = 4_000_000;

        let parsed = TimeSeriesMetadataSection2::from_bytes(&meta2.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed.channel_description, "frontal electrode");
        assert_eq!(parsed.session_description, "overnight recording");
        assert_eq!(parsed.recording_duration, 3_600_000_000);
        assert_eq!(parsed.sampling_frequency, 250.0);
        assert_eq!(parsed.units_conversion_factor, 0.001);
        assert_eq!(parsed.units_description, "uV");
        assert_eq!(parsed.number_of_samples, 900_000);
        assert_eq!(parsed.number_of_blocks, 900);
        assert_eq!(parsed.maximum_block_samples, 1000);
        assert_eq!(parsed.maximum_block_bytes, 4096);
        assert_eq!(parsed.block_interval, 4_000_000);
        // Untouched fields keep their no-entry values
        assert_eq!(
            parsed.maximum_difference_bytes,
            TIME_SERIES_METADATA_MAXIMUM_DIFFERENCE_BYTES_NO_ENTRY
        );
        assert!(parsed.maximum_native_sample_value.is_nan());
    }

    #[test]
    fn section_3_round_trip() {
        let mut meta3 = MetadataSection3::default();
        meta3.recording_time_offset = 42;
        meta3.gmt_offset = -5 * 3600;
        meta3.subject_name_1 = "Test Subject".to_string();
        meta3.subject_id = "S-001".to_string();
        meta3.recording_location = "ward 3".to_string();

        let parsed = MetadataSection3::from_bytes(&meta3.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed.recording_time_offset, 42);
        assert_eq!(parsed.gmt_offset, -5 * 3600);
        assert_eq!(parsed.subject_name_1, "Test Subject");
        assert_eq!(parsed.subject_name_2, "");
        assert_eq!(parsed.subject_id, "S-001");
        assert_eq!(parsed.recording_location, "ward 3");
        assert_eq!(parsed.dst_start_time, UUTC_NO_ENTRY);
    }

    #[test]
    fn section_1_round_trip() {
        let meta1 = MetadataSection1 {
            section_2_encryption: 1,
            section_3_encryption: 2,
        };
        let parsed = MetadataSection1::from_bytes(&meta1.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed.section_2_encryption, 1);
        assert_eq!(parsed.section_3_encryption, 2);
    }
}
