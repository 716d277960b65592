// Session tree loading: enumerate channels and segments, parse metadata and
// indices, aggregate time bounds.

use std::path::Path;

use tracing::warn;

use super::{ChannelData, MefReader, SegmentData};
use crate::blocks::{
    FileType, MetadataSection3, TimeSeriesIndex, TimeSeriesMetadataSection2, UniversalHeader,
    CRC_NO_ENTRY, METADATA_FILE_BYTES, METADATA_SECTION_2_OFFSET, METADATA_SECTION_3_OFFSET,
    TIME_SERIES_INDEX_BYTES, UNIVERSAL_HEADER_BYTES, UUTC_NO_ENTRY,
};
use crate::channel::{ChannelInfo, SegmentInfo};
use crate::crc;
use crate::crypt::password_validation_field;
use crate::session::{
    parse_segment_number, segment_file, sorted_subdirectories, SEGMENT_DIRECTORY_EXTENSION,
    TIME_SERIES_CHANNEL_DIRECTORY_EXTENSION, TIME_SERIES_DATA_FILE_EXTENSION,
    TIME_SERIES_INDICES_FILE_EXTENSION, TIME_SERIES_METADATA_FILE_EXTENSION,
};
use crate::{Error, Result};

impl MefReader {
    /// Walk the session tree and populate the channel map.
    ///
    /// Channels or segments with missing or corrupt files are skipped with a
    /// warning; a wrong password aborts the load.
    pub(super) fn load_session(&mut self) -> Result<()> {
        let channel_dirs =
            sorted_subdirectories(&self.path, TIME_SERIES_CHANNEL_DIRECTORY_EXTENSION)?;

        for channel_dir in channel_dirs {
            let channel_name = channel_dir
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            match self.load_channel(&channel_dir, &channel_name) {
                Ok(channel) => {
                    self.channels.insert(channel_name, channel);
                }
                Err(Error::WrongPassword) => return Err(Error::WrongPassword),
                Err(e) => {
                    warn!(channel = %channel_name, error = %e, "skipping channel");
                }
            }
        }

        // Session bounds are the extremes over all channels with known times.
        for channel in self.channels.values() {
            let info = &channel.info;
            if info.start_time != UUTC_NO_ENTRY
                && (self.start_time == UUTC_NO_ENTRY || info.start_time < self.start_time)
            {
                self.start_time = info.start_time;
            }
            if info.end_time != UUTC_NO_ENTRY
                && (self.end_time == UUTC_NO_ENTRY || info.end_time > self.end_time)
            {
                self.end_time = info.end_time;
            }
        }
        Ok(())
    }

    fn load_channel(&self, channel_dir: &Path, channel_name: &str) -> Result<ChannelData> {
        let mut info = ChannelInfo {
            name: channel_name.to_string(),
            ..Default::default()
        };
        let mut segments = Vec::new();
        let mut channel_metadata: Option<(TimeSeriesMetadataSection2, MetadataSection3)> = None;

        for segment_dir in sorted_subdirectories(channel_dir, SEGMENT_DIRECTORY_EXTENSION)? {
            match self.load_segment(&segment_dir) {
                Ok((segment, meta2, meta3)) => {
                    if channel_metadata.is_none() {
                        channel_metadata = Some((meta2, meta3));
                    }
                    segments.push(segment);
                }
                Err(Error::WrongPassword) => return Err(Error::WrongPassword),
                Err(e) => {
                    warn!(
                        segment = %segment_dir.display(),
                        error = %e,
                        "skipping segment"
                    );
                }
            }
        }

        for segment in &segments {
            info.number_of_samples += segment.info.number_of_samples;
            let seg = &segment.info;
            if seg.start_time != UUTC_NO_ENTRY
                && (info.start_time == UUTC_NO_ENTRY || seg.start_time < info.start_time)
            {
                info.start_time = seg.start_time;
            }
            if seg.end_time != UUTC_NO_ENTRY
                && (info.end_time == UUTC_NO_ENTRY || seg.end_time > info.end_time)
            {
                info.end_time = seg.end_time;
            }
        }
        info.number_of_segments = segments.len() as i32;

        // The first segment's metadata describes the channel as a whole.
        let (metadata_2, metadata_3) = channel_metadata.ok_or_else(|| {
            Error::InvalidFormat(format!("channel {channel_name} has no readable segments"))
        })?;
        info.sampling_frequency = metadata_2.sampling_frequency;
        info.units = metadata_2.units_description.clone();
        info.units_conversion_factor = metadata_2.units_conversion_factor;

        Ok(ChannelData {
            info,
            segments,
            metadata_2,
            metadata_3,
        })
    }

    fn load_segment(
        &self,
        segment_dir: &Path,
    ) -> Result<(SegmentData, TimeSeriesMetadataSection2, MetadataSection3)> {
        let segment_name = segment_dir
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let segment_number = parse_segment_number(&segment_name)?;

        // Metadata file: universal header plus sections 2 and 3.
        let meta_bytes = std::fs::read(segment_file(
            segment_dir,
            TIME_SERIES_METADATA_FILE_EXTENSION,
        ))?;
        if meta_bytes.len() < METADATA_FILE_BYTES {
            return Err(Error::TooShortBuffer {
                actual: meta_bytes.len(),
                expected: METADATA_FILE_BYTES,
                file: file!(),
                line: line!(),
            });
        }
        let meta_uh = self.parse_universal_header(&meta_bytes, FileType::TimeSeriesMetadata)?;
        let meta2 = TimeSeriesMetadataSection2::from_bytes(&meta_bytes[METADATA_SECTION_2_OFFSET..])?;
        let meta3 = MetadataSection3::from_bytes(&meta_bytes[METADATA_SECTION_3_OFFSET..])?;

        // Index file: universal header plus the packed index array.
        let indices = self.load_indices(segment_dir)?;

        let number_of_samples = if meta2.number_of_samples >= 0 {
            meta2.number_of_samples
        } else {
            indices
                .iter()
                .map(|i| i64::from(i.number_of_samples))
                .sum()
        };

        let info = SegmentInfo {
            name: segment_name,
            segment_number,
            start_time: meta_uh.start_time,
            end_time: meta_uh.end_time,
            start_sample: meta2.start_sample,
            number_of_samples,
            number_of_blocks: meta2.number_of_blocks,
        };

        let data_path = segment_file(segment_dir, TIME_SERIES_DATA_FILE_EXTENSION);
        Ok((
            SegmentData {
                info,
                indices,
                data_path,
            },
            meta2,
            meta3,
        ))
    }

    fn load_indices(&self, segment_dir: &Path) -> Result<Vec<TimeSeriesIndex>> {
        let bytes = std::fs::read(segment_file(
            segment_dir,
            TIME_SERIES_INDICES_FILE_EXTENSION,
        ))?;
        let uh = self.parse_universal_header(&bytes, FileType::TimeSeriesIndices)?;

        let entries = uh.number_of_entries.max(0) as usize;
        let body = &bytes[UNIVERSAL_HEADER_BYTES..];
        if body.len() < entries * TIME_SERIES_INDEX_BYTES {
            return Err(Error::TooShortBuffer {
                actual: bytes.len(),
                expected: UNIVERSAL_HEADER_BYTES + entries * TIME_SERIES_INDEX_BYTES,
                file: file!(),
                line: line!(),
            });
        }

        if uh.body_crc != CRC_NO_ENTRY {
            let actual = crc::calculate(body);
            if actual != uh.body_crc {
                let mismatch = Error::CrcMismatch {
                    expected: uh.body_crc,
                    actual,
                    context: "index file body",
                };
                if self.validate_crc {
                    return Err(mismatch);
                }
                warn!(error = %mismatch, "ignoring index body CRC mismatch");
            }
        }

        let mut indices = Vec::with_capacity(entries);
        for i in 0..entries {
            let offset = i * TIME_SERIES_INDEX_BYTES;
            indices.push(TimeSeriesIndex::from_bytes(&body[offset..])?);
        }
        Ok(indices)
    }

    /// Parse and validate a universal header from raw file bytes, including
    /// the password check when the file is protected.
    fn parse_universal_header(
        &self,
        bytes: &[u8],
        expected_type: FileType,
    ) -> Result<UniversalHeader> {
        let uh = UniversalHeader::from_bytes(bytes)?;
        uh.check(expected_type)?;

        match UniversalHeader::validate_header_crc(bytes) {
            Ok(()) => {}
            Err(mismatch) => {
                if self.validate_crc {
                    return Err(mismatch);
                }
                warn!(error = %mismatch, "ignoring universal header CRC mismatch");
            }
        }

        if let Some(password) = &self.password {
            let field = password_validation_field(password, &uh.level_uuid);
            let level_1_set = uh.level_1_password_validation_field.iter().any(|&b| b != 0);
            let level_2_set = uh.level_2_password_validation_field.iter().any(|&b| b != 0);
            // A password is accepted when it matches any tier the file
            // actually protects; unprotected files accept anything.
            if (level_1_set || level_2_set)
                && !(level_1_set && field == uh.level_1_password_validation_field)
                && !(level_2_set && field == uh.level_2_password_validation_field)
            {
                return Err(Error::WrongPassword);
            }
        }
        Ok(uh)
    }
}
