// src/blocks/mod.rs
mod common;
mod metadata;
mod record;
mod red_block;
mod time_series_index;
mod universal_header;

// Re-export shared types and constants
pub use common::{
    put_fixed_str, put_pad, read_f32, read_f64, read_fixed_str, read_i32, read_i64, read_u32,
    FileType, CRC_NO_ENTRY, FILE_NUMBERING_DIGITS, GMT_OFFSET_NO_ENTRY, MEF_BASE_FILE_NAME_BYTES,
    MEF_BIG_ENDIAN, MEF_LITTLE_ENDIAN, MEF_VERSION_MAJOR, MEF_VERSION_MINOR, PAD_BYTE_VALUE,
    TYPE_BYTES, UNKNOWN_NUMBER_OF_ENTRIES, UUID_BYTES, UUTC_NO_ENTRY,
};

// Re-export block types
pub use metadata::{
    MetadataSection1, MetadataSection3, TimeSeriesMetadataSection2, METADATA_FILE_BYTES,
    METADATA_SECTION_1_BYTES, METADATA_SECTION_1_OFFSET, METADATA_SECTION_2_BYTES,
    METADATA_SECTION_2_OFFSET, METADATA_SECTION_3_BYTES, METADATA_SECTION_3_OFFSET,
    TIME_SERIES_METADATA_MAXIMUM_BLOCK_SAMPLES_NO_ENTRY,
    TIME_SERIES_METADATA_MAXIMUM_DIFFERENCE_BYTES_NO_ENTRY,
    TIME_SERIES_METADATA_SAMPLING_FREQUENCY_OFFSET, TIME_SERIES_METADATA_UNITS_DESCRIPTION_BYTES,
};
pub use record::{RecordHeader, RecordIndex, RECORD_HEADER_BYTES, RECORD_INDEX_BYTES};
pub use red_block::{
    RedBlockHeader, RED_BLOCK_COMPRESSED_DATA_OFFSET, RED_BLOCK_HEADER_BYTES,
    RED_BLOCK_STATISTICS_BYTES, RED_DISCONTINUITY_MASK, RED_LEVEL_1_ENCRYPTION_MASK,
    RED_LEVEL_2_ENCRYPTION_MASK,
};
pub use time_series_index::{TimeSeriesIndex, TIME_SERIES_INDEX_BYTES};
pub use universal_header::{
    UniversalHeader, UNIVERSAL_HEADER_BYTES, UNIVERSAL_HEADER_CHANNEL_LEVEL_CODE,
    UNIVERSAL_HEADER_SEGMENT_NUMBER_NO_ENTRY, UNIVERSAL_HEADER_SESSION_LEVEL_CODE,
};
