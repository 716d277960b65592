// Segment lifecycle: creation, block bookkeeping and finalization.
//
// A segment is durable once finalize_segment has written its .tmet and .tidx
// files; the open .tdat alone is not recoverable because the indices only
// exist in memory until then.

use std::fs::File;
use std::io::{BufWriter, Write};

use tracing::debug;

use super::{MefWriter, DATA_FILE_BUFFER_BYTES};
use crate::blocks::{
    FileType, MetadataSection1, MetadataSection3, TimeSeriesIndex, TimeSeriesMetadataSection2,
    UNIVERSAL_HEADER_BYTES, UUTC_NO_ENTRY,
};
use crate::blocks::{RED_DISCONTINUITY_MASK, METADATA_FILE_BYTES};
use crate::crc;
use crate::session::{
    segment_dir, segment_file, TIME_SERIES_DATA_FILE_EXTENSION,
    TIME_SERIES_INDICES_FILE_EXTENSION, TIME_SERIES_METADATA_FILE_EXTENSION,
};
use crate::Result;

/// Time bounds and totals derived from a segment's accumulated indices.
struct SegmentSummary {
    start_time: i64,
    end_time: i64,
    total_samples: i64,
    max_block_samples: u32,
    max_block_bytes: i64,
    discontinuities: i64,
}

fn summarize(indices: &[TimeSeriesIndex], sampling_frequency: f64) -> SegmentSummary {
    let mut summary = SegmentSummary {
        start_time: UUTC_NO_ENTRY,
        end_time: UUTC_NO_ENTRY,
        total_samples: 0,
        max_block_samples: 0,
        max_block_bytes: 0,
        discontinuities: 0,
    };
    if let (Some(first), Some(last)) = (indices.first(), indices.last()) {
        summary.start_time = first.start_time;
        let tail = ((f64::from(last.number_of_samples) - 1.0) * 1e6 / sampling_frequency).round()
            as i64;
        summary.end_time = last.start_time + tail;
        for index in indices {
            summary.total_samples += i64::from(index.number_of_samples);
            summary.max_block_samples = summary.max_block_samples.max(index.number_of_samples);
            summary.max_block_bytes = summary.max_block_bytes.max(i64::from(index.block_bytes));
            if index.red_block_flags & RED_DISCONTINUITY_MASK != 0 {
                summary.discontinuities += 1;
            }
        }
    }
    summary
}

impl MefWriter {
    /// Open the next segment for a channel: create the `.segd` directory and
    /// the `.tdat` file with its universal header.
    pub(super) fn create_segment(&mut self, channel_name: &str) -> Result<()> {
        let (segment_number, seg_dir_path) = {
            let state = self.channels.get_mut(channel_name).expect("channel exists");
            if let Some(mut file) = state.data_file.take() {
                file.flush()?;
            }
            state.current_segment += 1;
            (
                state.current_segment,
                segment_dir(&state.path, channel_name, state.current_segment),
            )
        };
        std::fs::create_dir_all(&seg_dir_path)?;

        let uh = self.universal_header(FileType::TimeSeriesData, channel_name, segment_number);
        let data_path = segment_file(&seg_dir_path, TIME_SERIES_DATA_FILE_EXTENSION);
        let mut writer =
            BufWriter::with_capacity(DATA_FILE_BUFFER_BYTES, File::create(&data_path)?);
        writer.write_all(&uh.to_bytes()?)?;

        let state = self.channels.get_mut(channel_name).expect("channel exists");
        state.data_file = Some(writer);
        state.data_offset = UNIVERSAL_HEADER_BYTES as i64;
        state.indices.clear();
        state.last_sample_index = state.total_samples;
        Ok(())
    }

    /// Close the open `.tdat` and commit the segment by writing its
    /// `.tmet` and `.tidx` files.
    pub(super) fn finalize_segment(&mut self, channel_name: &str) -> Result<()> {
        let segment_number = {
            let state = self.channels.get_mut(channel_name).expect("channel exists");
            if let Some(mut file) = state.data_file.take() {
                file.flush()?;
            }
            state.current_segment
        };

        self.write_metadata(channel_name, segment_number)?;
        self.write_indices(channel_name, segment_number)?;
        debug!(channel = channel_name, segment = segment_number, "segment finalized");
        Ok(())
    }

    fn write_metadata(&self, channel_name: &str, segment_number: i32) -> Result<()> {
        let state = &self.channels[channel_name];
        let summary = summarize(&state.indices, state.sampling_frequency);

        let mut uh = self.universal_header(
            FileType::TimeSeriesMetadata,
            channel_name,
            segment_number,
        );
        uh.start_time = summary.start_time;
        uh.end_time = summary.end_time;
        uh.number_of_entries = 1;

        let meta1 = MetadataSection1::default();

        let mut meta2 = TimeSeriesMetadataSection2 {
            sampling_frequency: state.sampling_frequency,
            number_of_samples: summary.total_samples,
            number_of_blocks: state.indices.len() as i64,
            units_conversion_factor: state
                .units_conversion_factor
                .unwrap_or(self.units_conversion_factor),
            units_description: self.data_units.clone(),
            channel_description: self.channel_description.clone(),
            session_description: self.session_description.clone(),
            number_of_discontinuities: summary.discontinuities,
            ..Default::default()
        };
        if let Some(first) = state.indices.first() {
            meta2.start_sample = first.start_sample;
            meta2.maximum_block_samples = summary.max_block_samples;
            meta2.maximum_block_bytes = summary.max_block_bytes;
            if state.sampling_frequency > 0.0 {
                meta2.block_interval = (f64::from(summary.max_block_samples) * 1e6
                    / state.sampling_frequency)
                    .round() as i64;
            }
        }
        if summary.start_time != UUTC_NO_ENTRY && summary.end_time != UUTC_NO_ENTRY {
            meta2.recording_duration = summary.end_time - summary.start_time;
        }

        let mut meta3 = MetadataSection3 {
            recording_time_offset: self.recording_time_offset,
            gmt_offset: self.gmt_offset,
            ..Default::default()
        };
        meta3.subject_name_1 = self.subject_name.clone();
        meta3.subject_id = self.subject_id.clone();
        meta3.recording_location = self.recording_location.clone();

        // Sections tile the file exactly: 1024 + 1536 + 10752 + 3072 = 16384.
        let mut body = Vec::with_capacity(METADATA_FILE_BYTES - UNIVERSAL_HEADER_BYTES);
        body.extend_from_slice(&meta1.to_bytes()?);
        body.extend_from_slice(&meta2.to_bytes()?);
        body.extend_from_slice(&meta3.to_bytes()?);
        uh.body_crc = crc::calculate(&body);

        let mut image = uh.to_bytes()?;
        image.append(&mut body);
        debug_assert_eq!(image.len(), METADATA_FILE_BYTES);

        let seg_dir_path = segment_dir(&state.path, channel_name, segment_number);
        let meta_path = segment_file(&seg_dir_path, TIME_SERIES_METADATA_FILE_EXTENSION);
        std::fs::write(meta_path, image)?;
        Ok(())
    }

    fn write_indices(&self, channel_name: &str, segment_number: i32) -> Result<()> {
        let state = &self.channels[channel_name];
        let summary = summarize(&state.indices, state.sampling_frequency);

        let mut body = Vec::with_capacity(state.indices.len() * 56);
        for index in &state.indices {
            body.extend_from_slice(&index.to_bytes()?);
        }

        let mut uh = self.universal_header(
            FileType::TimeSeriesIndices,
            channel_name,
            segment_number,
        );
        uh.start_time = summary.start_time;
        uh.end_time = summary.end_time;
        uh.number_of_entries = state.indices.len() as i64;
        uh.maximum_entry_size = summary.max_block_bytes;
        uh.body_crc = crc::calculate(&body);

        let mut image = uh.to_bytes()?;
        image.append(&mut body);

        let seg_dir_path = segment_dir(&state.path, channel_name, segment_number);
        let idx_path = segment_file(&seg_dir_path, TIME_SERIES_INDICES_FILE_EXTENSION);
        std::fs::write(idx_path, image)?;
        Ok(())
    }
}
