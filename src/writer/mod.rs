//! MEF 3.0 session writer.
//!
//! This module provides [`MefWriter`], a stateful API for building a session
//! directory tree. The writer handles quantization, block compression,
//! segment rollover on time discontinuities, and metadata/index
//! finalization.
//!
//! # Writing workflow
//!
//! 1. Create a [`MefWriter`] for a `.mefd` path
//! 2. Configure block length, units and subject metadata with the setters
//! 3. Call [`write_data()`](MefWriter::write_data) (floats) or
//!    [`write_raw_data()`](MefWriter::write_raw_data) (quantized `i32`) per
//!    channel; channels and segments are created on demand
//! 4. Call [`close()`](MefWriter::close) to finalize metadata and indices
//!
//! A segment becomes durable only when it is finalized: its `.tmet` and
//! `.tidx` files are the commit point. Dropping the writer closes it
//! best-effort.
//!
//! # Example
//!
//! ```no_run
//! use mef3_rs::{MefWriter, Result};
//!
//! fn write_sine(path: &str) -> Result<()> {
//!     let mut writer = MefWriter::new(path, true)?;
//!     writer.set_block_len(1000);
//!     writer.set_data_units("uV");
//!
//!     let data: Vec<f64> = (0..10_000)
//!         .map(|i| 100.0 * (i as f64 / 250.0).sin())
//!         .collect();
//!     // 250 Hz starting at t = 1.5e15 uUTC
//!     writer.write_data("eeg_01", &data, 1_500_000_000_000_000, 250.0, None, false)?;
//!     writer.close()
//! }
//! ```

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::blocks::{FileType, TimeSeriesIndex, UniversalHeader, UUID_BYTES, UUTC_NO_ENTRY};
use crate::crypt::{password_validation_field, PasswordData, NO_ENCRYPTION};
use crate::red::{self, CompressionParams};
use crate::session;
use crate::{Error, Result};

mod quantize;
mod segment;

/// Default samples per RED block.
const DEFAULT_BLOCK_LEN: u32 = 1000;

/// Buffer size for open `.tdat` files.
const DATA_FILE_BUFFER_BYTES: usize = 1_048_576;

/// Per-channel writer state.
struct ChannelState {
    /// `<session>.mefd/<name>.timd`
    path: PathBuf,
    /// Current segment number, -1 until the first block is written.
    current_segment: i32,
    /// Channel-cumulative sample index assigned to the next block.
    last_sample_index: i64,
    /// uUTC of the most recently written sample.
    last_end_time: i64,
    sampling_frequency: f64,
    /// `1 / scale` from the channel's most recent quantization, if any.
    units_conversion_factor: Option<f64>,
    /// Indices accumulated for the open segment.
    indices: Vec<TimeSeriesIndex>,
    total_samples: i64,
    total_blocks: i64,
    data_file: Option<BufWriter<File>>,
    /// Write position inside the open `.tdat`.
    data_offset: i64,
}

impl ChannelState {
    fn new(path: PathBuf, sampling_frequency: f64) -> Self {
        ChannelState {
            path,
            current_segment: -1,
            last_sample_index: 0,
            last_end_time: UUTC_NO_ENTRY,
            sampling_frequency,
            units_conversion_factor: None,
            indices: Vec::new(),
            total_samples: 0,
            total_blocks: 0,
            data_file: None,
            data_offset: 0,
        }
    }
}

/// Writer for creating MEF 3.0 sessions.
///
/// # Thread safety
///
/// `MefWriter` owns every file under its session path exclusively and is not
/// thread-safe; perform all writes from a single thread.
pub struct MefWriter {
    path: PathBuf,
    session_name: String,
    session_uuid: [u8; UUID_BYTES],
    password_1: Option<String>,
    password_2: Option<String>,
    password_data: PasswordData,
    closed: bool,

    block_len: u32,
    encryption_level: i8,
    data_units: String,
    units_conversion_factor: f64,
    recording_time_offset: i64,
    gmt_offset: i32,
    subject_name: String,
    subject_id: String,
    recording_location: String,
    channel_description: String,
    session_description: String,

    channels: BTreeMap<String, ChannelState>,
}

impl MefWriter {
    /// Create or open a session at `path`.
    ///
    /// A missing `.mefd` extension is appended. When `overwrite` is true an
    /// existing session directory is removed recursively; otherwise new data
    /// is appended alongside whatever the directory already holds.
    pub fn new(path: impl AsRef<Path>, overwrite: bool) -> Result<Self> {
        Self::with_passwords(path, overwrite, None, None)
    }

    /// Create a session with optional level-1 and level-2 passwords.
    ///
    /// Passwords stamp validation fields into every universal header. Block
    /// payload encryption is additionally controlled by
    /// [`set_encryption_level()`](Self::set_encryption_level).
    pub fn with_passwords(
        path: impl AsRef<Path>,
        overwrite: bool,
        password_1: Option<&str>,
        password_2: Option<&str>,
    ) -> Result<Self> {
        let path = session::with_session_extension(path.as_ref());

        if path.exists() && overwrite {
            std::fs::remove_dir_all(&path)
                .map_err(|e| Error::InvalidPath(format!("{}: {e}", path.display())))?;
        }
        std::fs::create_dir_all(&path)
            .map_err(|e| Error::InvalidPath(format!("{}: {e}", path.display())))?;

        let session_name = session::session_name_from_path(&path);
        let password_1 = password_1.filter(|p| !p.is_empty()).map(str::to_string);
        let password_2 = password_2.filter(|p| !p.is_empty()).map(str::to_string);
        let password_data =
            PasswordData::from_passwords(password_1.as_deref(), password_2.as_deref());

        Ok(MefWriter {
            path,
            session_name,
            session_uuid: *Uuid::new_v4().as_bytes(),
            password_1,
            password_2,
            password_data,
            closed: false,
            block_len: DEFAULT_BLOCK_LEN,
            encryption_level: NO_ENCRYPTION,
            data_units: "V".to_string(),
            units_conversion_factor: 1.0,
            recording_time_offset: 0,
            gmt_offset: crate::blocks::GMT_OFFSET_NO_ENTRY,
            subject_name: String::new(),
            subject_id: String::new(),
            recording_location: String::new(),
            channel_description: String::new(),
            session_description: String::new(),
            channels: BTreeMap::new(),
        })
    }

    /// Session path, always ending in `.mefd`.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Samples per RED block.
    pub fn block_len(&self) -> u32 {
        self.block_len
    }

    /// Set the number of samples per RED block (default 1000).
    pub fn set_block_len(&mut self, block_len: u32) {
        self.block_len = block_len.max(1);
    }

    /// Encrypt RED block payloads at the given tier (0, 1 or 2).
    ///
    /// The matching password must have been supplied at construction or
    /// every subsequent write fails.
    pub fn set_encryption_level(&mut self, level: i8) {
        self.encryption_level = level;
    }

    /// Set the unit string recorded in channel metadata (default `"V"`).
    pub fn set_data_units(&mut self, units: &str) {
        self.data_units = units.to_string();
    }

    /// Override the units conversion factor.
    ///
    /// [`write_data()`](Self::write_data) replaces this with `1 / scale`
    /// whenever it quantizes with a scale other than 1.
    pub fn set_units_conversion_factor(&mut self, factor: f64) {
        self.units_conversion_factor = factor;
    }

    /// Set the recording time offset stored in metadata section 3.
    pub fn set_recording_time_offset(&mut self, offset: i64) {
        self.recording_time_offset = offset;
    }

    /// Set the GMT offset stored in metadata section 3.
    pub fn set_gmt_offset(&mut self, offset: i32) {
        self.gmt_offset = offset;
    }

    /// Set the subject name stored in metadata section 3.
    pub fn set_subject_name(&mut self, name: &str) {
        self.subject_name = name.to_string();
    }

    /// Set the subject ID stored in metadata section 3.
    pub fn set_subject_id(&mut self, id: &str) {
        self.subject_id = id.to_string();
    }

    /// Set the recording location stored in metadata section 3.
    pub fn set_recording_location(&mut self, location: &str) {
        self.recording_location = location.to_string();
    }

    /// Set the channel description stored in metadata section 2.
    pub fn set_channel_description(&mut self, description: &str) {
        self.channel_description = description.to_string();
    }

    /// Set the session description stored in metadata section 2.
    pub fn set_session_description(&mut self, description: &str) {
        self.session_description = description.to_string();
    }

    /// Write floating-point samples to a channel.
    ///
    /// Samples are quantized to `i32`: with `precision` of `Some(p)` the
    /// scale is `10^p`, otherwise it is derived so the largest finite sample
    /// uses 90% of the representable range. NaN samples become the
    /// [`RED_NAN`](crate::red::RED_NAN) sentinel and survive the round trip.
    ///
    /// # Arguments
    /// * `channel_name` - Target channel; created on first use.
    /// * `data` - The samples.
    /// * `start_uutc` - Time of `data[0]` in microseconds since the epoch.
    /// * `sampling_frequency` - Hz; must match earlier writes to the channel.
    /// * `precision` - Optional decimal quantization precision.
    /// * `new_segment` - Force a segment boundary before this write.
    pub fn write_data(
        &mut self,
        channel_name: &str,
        data: &[f64],
        start_uutc: i64,
        sampling_frequency: f64,
        precision: Option<i32>,
        new_segment: bool,
    ) -> Result<()> {
        if self.closed {
            return Err(Error::WriterClosed);
        }
        if data.is_empty() {
            return Ok(());
        }

        let quantized = quantize::quantize(data, precision);
        self.write_raw_data(
            channel_name,
            &quantized.samples,
            start_uutc,
            sampling_frequency,
            new_segment,
        )?;
        // The factor is per channel: metadata written at finalization must
        // reflect the scale this channel's samples were quantized with.
        if let Some(factor) = quantized.units_conversion_factor {
            if let Some(state) = self.channels.get_mut(channel_name) {
                state.units_conversion_factor = Some(factor);
            }
        }
        Ok(())
    }

    /// Write already-quantized samples to a channel.
    ///
    /// Values must lie in the RED sample range or be the
    /// [`RED_NAN`](crate::red::RED_NAN) sentinel.
    pub fn write_raw_data(
        &mut self,
        channel_name: &str,
        data: &[i32],
        start_uutc: i64,
        sampling_frequency: f64,
        new_segment: bool,
    ) -> Result<()> {
        if self.closed {
            return Err(Error::WriterClosed);
        }
        if data.is_empty() {
            return Ok(());
        }

        self.ensure_channel(channel_name, sampling_frequency)?;

        let state = &self.channels[channel_name];
        let mut need_new_segment = new_segment || state.current_segment < 0;

        // A gap (or overlap) of more than two blocks' duration relative to
        // the expected next-sample time starts a new segment.
        if !need_new_segment && state.last_end_time != UUTC_NO_ENTRY {
            let sample_period = (1e6 / sampling_frequency).round() as i64;
            let expected_start = state.last_end_time + sample_period;
            let gap = start_uutc - expected_start;
            let max_gap = (2.0 * f64::from(self.block_len) * 1e6 / sampling_frequency) as i64;
            if gap.abs() > max_gap {
                need_new_segment = true;
            }
        }

        if need_new_segment {
            if self.channels[channel_name].current_segment >= 0 {
                self.finalize_segment(channel_name)?;
            }
            self.create_segment(channel_name)?;
        }

        let block_len = self.block_len as usize;
        let mut written = 0usize;
        let mut first_block = true;
        while written < data.len() {
            let take = (data.len() - written).min(block_len);
            let offset_us = (written as f64 * 1e6 / sampling_frequency).round() as i64;
            let discontinuity = first_block && need_new_segment;
            self.write_block(
                channel_name,
                &data[written..written + take],
                start_uutc + offset_us,
                discontinuity,
            )?;
            written += take;
            first_block = false;
        }

        let state = self.channels.get_mut(channel_name).expect("channel exists");
        let last_offset = ((data.len() - 1) as f64 * 1e6 / sampling_frequency).round() as i64;
        state.last_end_time = start_uutc + last_offset;
        state.total_samples += data.len() as i64;
        Ok(())
    }

    /// Flush open `.tdat` files without finalizing segments.
    ///
    /// Data flushed here is not yet durable: a segment's `.tmet`/`.tidx`
    /// pair, written at finalization, is its commit point.
    pub fn flush(&mut self) -> Result<()> {
        for state in self.channels.values_mut() {
            if let Some(file) = state.data_file.as_mut() {
                file.flush()?;
            }
        }
        Ok(())
    }

    /// Finalize every open segment and close the writer.
    ///
    /// Idempotent; later write calls fail with [`Error::WriterClosed`].
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let names: Vec<String> = self.channels.keys().cloned().collect();
        for name in names {
            if self.channels[&name].current_segment >= 0 {
                self.finalize_segment(&name)?;
            }
        }
        self.closed = true;
        Ok(())
    }

    fn ensure_channel(&mut self, channel_name: &str, sampling_frequency: f64) -> Result<()> {
        if let Some(state) = self.channels.get(channel_name) {
            if state.sampling_frequency != 0.0 && state.sampling_frequency != sampling_frequency {
                return Err(Error::SamplingFrequencyMismatch {
                    channel: channel_name.to_string(),
                    expected: state.sampling_frequency,
                    actual: sampling_frequency,
                });
            }
            return Ok(());
        }

        let channel_path = self.path.join(format!(
            "{channel_name}.{}",
            session::TIME_SERIES_CHANNEL_DIRECTORY_EXTENSION
        ));
        std::fs::create_dir_all(&channel_path)?;
        self.channels.insert(
            channel_name.to_string(),
            ChannelState::new(channel_path, sampling_frequency),
        );
        Ok(())
    }

    fn write_block(
        &mut self,
        channel_name: &str,
        samples: &[i32],
        start_time: i64,
        discontinuity: bool,
    ) -> Result<()> {
        let params = CompressionParams {
            discontinuity,
            encryption_level: self.encryption_level,
        };
        let result = red::compress(samples, start_time, &params, Some(&self.password_data))?;

        let state = self.channels.get_mut(channel_name).expect("channel exists");
        let mut index = result.index;
        index.file_offset = state.data_offset;
        index.start_sample = state.last_sample_index;

        let file = state
            .data_file
            .as_mut()
            .expect("segment data file is open while writing blocks");
        file.write_all(&result.compressed_data)?;

        state.data_offset += result.compressed_data.len() as i64;
        state.indices.push(index);
        state.last_sample_index += samples.len() as i64;
        state.total_blocks += 1;
        Ok(())
    }

    /// Build a universal header carrying the session identity.
    fn universal_header(
        &self,
        file_type: FileType,
        channel_name: &str,
        segment_number: i32,
    ) -> UniversalHeader {
        let mut uh = UniversalHeader::new(file_type);
        uh.segment_number = segment_number;
        uh.channel_name = channel_name.to_string();
        uh.session_name = self.session_name.clone();
        uh.level_uuid = self.session_uuid;
        uh.file_uuid = *Uuid::new_v4().as_bytes();
        uh.provenance_uuid = uh.file_uuid;
        if let Some(password) = &self.password_1 {
            uh.level_1_password_validation_field =
                password_validation_field(password, &self.session_uuid);
        }
        if let Some(password) = &self.password_2 {
            uh.level_2_password_validation_field =
                password_validation_field(password, &self.session_uuid);
        }
        uh
    }
}

impl Drop for MefWriter {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.close();
        }
    }
}
