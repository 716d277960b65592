// blocks/universal_header.rs
use crate::blocks::common::{
    put_fixed_str, put_pad, read_fixed_str, read_i32, read_i64, read_u32, FileType, CRC_NO_ENTRY,
    MEF_BASE_FILE_NAME_BYTES, MEF_LITTLE_ENDIAN, MEF_VERSION_MAJOR, MEF_VERSION_MINOR, TYPE_BYTES,
    UNKNOWN_NUMBER_OF_ENTRIES, UUID_BYTES, UUTC_NO_ENTRY,
};
use crate::{crc, Error, Result};

/// Total size of the universal header.
pub const UNIVERSAL_HEADER_BYTES: usize = 1024;

pub const UNIVERSAL_HEADER_HEADER_CRC_OFFSET: usize = 0;
pub const UNIVERSAL_HEADER_BODY_CRC_OFFSET: usize = 4;
pub const UNIVERSAL_HEADER_FILE_TYPE_OFFSET: usize = 8;
pub const UNIVERSAL_HEADER_MEF_VERSION_MAJOR_OFFSET: usize = 13;
pub const UNIVERSAL_HEADER_MEF_VERSION_MINOR_OFFSET: usize = 14;
pub const UNIVERSAL_HEADER_BYTE_ORDER_CODE_OFFSET: usize = 15;
pub const UNIVERSAL_HEADER_START_TIME_OFFSET: usize = 16;
pub const UNIVERSAL_HEADER_END_TIME_OFFSET: usize = 24;
pub const UNIVERSAL_HEADER_NUMBER_OF_ENTRIES_OFFSET: usize = 32;
pub const UNIVERSAL_HEADER_MAXIMUM_ENTRY_SIZE_OFFSET: usize = 40;
pub const UNIVERSAL_HEADER_SEGMENT_NUMBER_OFFSET: usize = 48;
pub const UNIVERSAL_HEADER_CHANNEL_NAME_OFFSET: usize = 52;
pub const UNIVERSAL_HEADER_SESSION_NAME_OFFSET: usize = 308;
pub const UNIVERSAL_HEADER_ANONYMIZED_NAME_OFFSET: usize = 564;
pub const UNIVERSAL_HEADER_LEVEL_UUID_OFFSET: usize = 820;
pub const UNIVERSAL_HEADER_FILE_UUID_OFFSET: usize = 836;
pub const UNIVERSAL_HEADER_PROVENANCE_UUID_OFFSET: usize = 852;
pub const UNIVERSAL_HEADER_LEVEL_1_PASSWORD_VALIDATION_FIELD_OFFSET: usize = 868;
pub const UNIVERSAL_HEADER_LEVEL_2_PASSWORD_VALIDATION_FIELD_OFFSET: usize = 884;
pub const UNIVERSAL_HEADER_PROTECTED_REGION_OFFSET: usize = 900;
pub const UNIVERSAL_HEADER_PROTECTED_REGION_BYTES: usize = 60;
pub const UNIVERSAL_HEADER_DISCRETIONARY_REGION_OFFSET: usize = 960;
pub const UNIVERSAL_HEADER_DISCRETIONARY_REGION_BYTES: usize = 64;

/// `segment_number` when the file does not belong to a segment.
pub const UNIVERSAL_HEADER_SEGMENT_NUMBER_NO_ENTRY: i32 = -1;
/// `segment_number` for channel-level files.
pub const UNIVERSAL_HEADER_CHANNEL_LEVEL_CODE: i32 = -2;
/// `segment_number` for session-level files.
pub const UNIVERSAL_HEADER_SESSION_LEVEL_CODE: i32 = -3;

/// The 1024-byte preamble present on every MEF 3.0 file.
///
/// The header CRC at offset 0 covers bytes `4..1024`; the body CRC at offset
/// 4 covers everything after the header (or [`CRC_NO_ENTRY`] when it was not
/// computed).
#[derive(Debug, Clone)]
pub struct UniversalHeader {
    pub header_crc: u32,
    pub body_crc: u32,
    pub file_type: String,
    pub mef_version_major: u8,
    pub mef_version_minor: u8,
    pub byte_order_code: u8,
    pub start_time: i64,
    pub end_time: i64,
    pub number_of_entries: i64,
    pub maximum_entry_size: i64,
    pub segment_number: i32,
    pub channel_name: String,
    pub session_name: String,
    pub anonymized_name: String,
    pub level_uuid: [u8; UUID_BYTES],
    pub file_uuid: [u8; UUID_BYTES],
    pub provenance_uuid: [u8; UUID_BYTES],
    pub level_1_password_validation_field: [u8; 16],
    pub level_2_password_validation_field: [u8; 16],
}

impl Default for UniversalHeader {
    fn default() -> Self {
        UniversalHeader {
            header_crc: CRC_NO_ENTRY,
            body_crc: CRC_NO_ENTRY,
            file_type: String::new(),
            mef_version_major: MEF_VERSION_MAJOR,
            mef_version_minor: MEF_VERSION_MINOR,
            byte_order_code: MEF_LITTLE_ENDIAN,
            start_time: UUTC_NO_ENTRY,
            end_time: UUTC_NO_ENTRY,
            number_of_entries: UNKNOWN_NUMBER_OF_ENTRIES,
            maximum_entry_size: UNKNOWN_NUMBER_OF_ENTRIES,
            segment_number: UNIVERSAL_HEADER_SEGMENT_NUMBER_NO_ENTRY,
            channel_name: String::new(),
            session_name: String::new(),
            anonymized_name: String::new(),
            level_uuid: [0; UUID_BYTES],
            file_uuid: [0; UUID_BYTES],
            provenance_uuid: [0; UUID_BYTES],
            level_1_password_validation_field: [0; 16],
            level_2_password_validation_field: [0; 16],
        }
    }
}

impl UniversalHeader {
    /// Create a header for a file of the given type.
    pub fn new(file_type: FileType) -> Self {
        UniversalHeader {
            file_type: file_type.type_str().to_string(),
            ..Default::default()
        }
    }

    /// Serialize to exactly [`UNIVERSAL_HEADER_BYTES`] bytes.
    ///
    /// The header CRC field is recomputed over bytes `4..1024` before the
    /// buffer is returned; `self.header_crc` is not consulted.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(UNIVERSAL_HEADER_BYTES);

        // Placeholder for header CRC, patched below.
        buffer.extend_from_slice(&CRC_NO_ENTRY.to_le_bytes());
        buffer.extend_from_slice(&self.body_crc.to_le_bytes());
        put_fixed_str(&mut buffer, &self.file_type, TYPE_BYTES);
        buffer.push(self.mef_version_major);
        buffer.push(self.mef_version_minor);
        buffer.push(self.byte_order_code);
        buffer.extend_from_slice(&self.start_time.to_le_bytes());
        buffer.extend_from_slice(&self.end_time.to_le_bytes());
        buffer.extend_from_slice(&self.number_of_entries.to_le_bytes());
        buffer.extend_from_slice(&self.maximum_entry_size.to_le_bytes());
        buffer.extend_from_slice(&self.segment_number.to_le_bytes());
        put_fixed_str(&mut buffer, &self.channel_name, MEF_BASE_FILE_NAME_BYTES);
        put_fixed_str(&mut buffer, &self.session_name, MEF_BASE_FILE_NAME_BYTES);
        put_fixed_str(&mut buffer, &self.anonymized_name, MEF_BASE_FILE_NAME_BYTES);
        buffer.extend_from_slice(&self.level_uuid);
        buffer.extend_from_slice(&self.file_uuid);
        buffer.extend_from_slice(&self.provenance_uuid);
        buffer.extend_from_slice(&self.level_1_password_validation_field);
        buffer.extend_from_slice(&self.level_2_password_validation_field);
        put_pad(&mut buffer, UNIVERSAL_HEADER_PROTECTED_REGION_BYTES);
        put_pad(&mut buffer, UNIVERSAL_HEADER_DISCRETIONARY_REGION_BYTES);

        if buffer.len() != UNIVERSAL_HEADER_BYTES {
            return Err(Error::InvalidFormat(format!(
                "UniversalHeader must be exactly {} bytes, got {}",
                UNIVERSAL_HEADER_BYTES,
                buffer.len()
            )));
        }

        let header_crc = crc::calculate(&buffer[UNIVERSAL_HEADER_BODY_CRC_OFFSET..]);
        buffer[..4].copy_from_slice(&header_crc.to_le_bytes());
        Ok(buffer)
    }

    /// Parse a universal header from the first 1024 bytes of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < UNIVERSAL_HEADER_BYTES {
            return Err(Error::TooShortBuffer {
                actual: bytes.len(),
                expected: UNIVERSAL_HEADER_BYTES,
                file: file!(),
                line: line!(),
            });
        }

        let uuid = |offset: usize| -> [u8; UUID_BYTES] {
            bytes[offset..offset + UUID_BYTES].try_into().unwrap()
        };

        Ok(UniversalHeader {
            header_crc: read_u32(bytes, UNIVERSAL_HEADER_HEADER_CRC_OFFSET)?,
            body_crc: read_u32(bytes, UNIVERSAL_HEADER_BODY_CRC_OFFSET)?,
            file_type: read_fixed_str(
                &bytes[UNIVERSAL_HEADER_FILE_TYPE_OFFSET
                    ..UNIVERSAL_HEADER_FILE_TYPE_OFFSET + TYPE_BYTES],
            ),
            mef_version_major: bytes[UNIVERSAL_HEADER_MEF_VERSION_MAJOR_OFFSET],
            mef_version_minor: bytes[UNIVERSAL_HEADER_MEF_VERSION_MINOR_OFFSET],
            byte_order_code: bytes[UNIVERSAL_HEADER_BYTE_ORDER_CODE_OFFSET],
            start_time: read_i64(bytes, UNIVERSAL_HEADER_START_TIME_OFFSET)?,
            end_time: read_i64(bytes, UNIVERSAL_HEADER_END_TIME_OFFSET)?,
            number_of_entries: read_i64(bytes, UNIVERSAL_HEADER_NUMBER_OF_ENTRIES_OFFSET)?,
            maximum_entry_size: read_i64(bytes, UNIVERSAL_HEADER_MAXIMUM_ENTRY_SIZE_OFFSET)?,
            segment_number: read_i32(bytes, UNIVERSAL_HEADER_SEGMENT_NUMBER_OFFSET)?,
            channel_name: read_fixed_str(
                &bytes[UNIVERSAL_HEADER_CHANNEL_NAME_OFFSET
                    ..UNIVERSAL_HEADER_CHANNEL_NAME_OFFSET + MEF_BASE_FILE_NAME_BYTES],
            ),
            session_name: read_fixed_str(
                &bytes[UNIVERSAL_HEADER_SESSION_NAME_OFFSET
                    ..UNIVERSAL_HEADER_SESSION_NAME_OFFSET + MEF_BASE_FILE_NAME_BYTES],
            ),
            anonymized_name: read_fixed_str(
                &bytes[UNIVERSAL_HEADER_ANONYMIZED_NAME_OFFSET
                    ..UNIVERSAL_HEADER_ANONYMIZED_NAME_OFFSET + MEF_BASE_FILE_NAME_BYTES],
            ),
            level_uuid: uuid(UNIVERSAL_HEADER_LEVEL_UUID_OFFSET),
            file_uuid: uuid(UNIVERSAL_HEADER_FILE_UUID_OFFSET),
            provenance_uuid: uuid(UNIVERSAL_HEADER_PROVENANCE_UUID_OFFSET),
            level_1_password_validation_field: uuid(
                UNIVERSAL_HEADER_LEVEL_1_PASSWORD_VALIDATION_FIELD_OFFSET,
            ),
            level_2_password_validation_field: uuid(
                UNIVERSAL_HEADER_LEVEL_2_PASSWORD_VALIDATION_FIELD_OFFSET,
            ),
        })
    }

    /// Validate this header against an expected file type.
    ///
    /// Checks the type tag, the MEF major version and the byte order code.
    pub fn check(&self, expected: FileType) -> Result<()> {
        if self.file_type != expected.type_str() {
            return Err(Error::InvalidFormat(format!(
                "expected file type {:?}, found {:?}",
                expected.type_str(),
                self.file_type
            )));
        }
        if self.mef_version_major != MEF_VERSION_MAJOR {
            return Err(Error::InvalidFormat(format!(
                "unsupported MEF version {}.{}",
                self.mef_version_major, self.mef_version_minor
            )));
        }
        if self.byte_order_code != MEF_LITTLE_ENDIAN {
            return Err(Error::InvalidFormat(
                "big-endian MEF files are not supported".to_string(),
            ));
        }
        Ok(())
    }

    /// Verify the header CRC over raw file bytes.
    pub fn validate_header_crc(bytes: &[u8]) -> Result<()> {
        if bytes.len() < UNIVERSAL_HEADER_BYTES {
            return Err(Error::TooShortBuffer {
                actual: bytes.len(),
                expected: UNIVERSAL_HEADER_BYTES,
                file: file!(),
                line: line!(),
            });
        }
        let stored = read_u32(bytes, UNIVERSAL_HEADER_HEADER_CRC_OFFSET)?;
        let actual = crc::calculate(
            &bytes[UNIVERSAL_HEADER_BODY_CRC_OFFSET..UNIVERSAL_HEADER_BYTES],
        );
        if stored != actual {
            return Err(Error::CrcMismatch {
                expected: stored,
                actual,
                context: "universal header",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::common::PAD_BYTE_VALUE;

    #[test]
    fn size_is_1024() {
        let uh = UniversalHeader::new(FileType::TimeSeriesData);
        assert_eq!(uh.to_bytes().unwrap().len(), UNIVERSAL_HEADER_BYTES);
    }

    #[test]
    fn round_trip() {
        let mut uh = UniversalHeader::new(FileType::TimeSeriesMetadata);
        uh.start_time = 1_000_000_000_000;
        uh.end_time = 1_000_000_999_000;
        uh.number_of_entries = 12;
        uh.maximum_entry_size = 848;
        uh.segment_number = 3;
        uh.channel_name = "ch_left_01".to_string();
        uh.session_name = "session".to_string();
        uh.level_uuid = [0xAB; 16];

        let bytes = uh.to_bytes().unwrap();
        let parsed = UniversalHeader::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.file_type, "tmet");
        assert_eq!(parsed.start_time, uh.start_time);
        assert_eq!(parsed.end_time, uh.end_time);
        assert_eq!(parsed.number_of_entries, 12);
        assert_eq!(parsed.maximum_entry_size, 848);
        assert_eq!(parsed.segment_number, 3);
        assert_eq!(parsed.channel_name, "ch_left_01");
        assert_eq!(parsed.session_name, "session");
        assert_eq!(parsed.level_uuid, [0xAB; 16]);
        assert_eq!(parsed.mef_version_major, MEF_VERSION_MAJOR);
        assert_eq!(parsed.byte_order_code, MEF_LITTLE_ENDIAN);
        parsed.check(FileType::TimeSeriesMetadata).unwrap();
    }

    #[test]
    fn header_crc_is_stamped_and_validates() {
        let uh = UniversalHeader::new(FileType::TimeSeriesIndices);
        let bytes = uh.to_bytes().unwrap();
        UniversalHeader::validate_header_crc(&bytes).unwrap();

        let mut corrupted = bytes.clone();
        corrupted[100] ^= 0xFF;
        assert!(matches!(
            UniversalHeader::validate_header_crc(&corrupted),
            Err(Error::CrcMismatch { .. })
        ));
    }

    #[test]
    fn check_rejects_wrong_type_and_version() {
        let uh = UniversalHeader::new(FileType::TimeSeriesData);
        let bytes = uh.to_bytes().unwrap();
        let parsed = UniversalHeader::from_bytes(&bytes).unwrap();
        assert!(parsed.check(FileType::TimeSeriesMetadata).is_err());

        let mut wrong_version = bytes.clone();
        wrong_version[UNIVERSAL_HEADER_MEF_VERSION_MAJOR_OFFSET] = 2;
        let parsed = UniversalHeader::from_bytes(&wrong_version).unwrap();
        assert!(parsed.check(FileType::TimeSeriesData).is_err());
    }

    #[test]
    fn reserved_regions_are_padded() {
        let bytes = UniversalHeader::new(FileType::TimeSeriesData)
            .to_bytes()
            .unwrap();
        assert!(bytes[UNIVERSAL_HEADER_PROTECTED_REGION_OFFSET..]
            .iter()
            .all(|&b| b == PAD_BYTE_VALUE));
    }
}
