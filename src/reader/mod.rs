//! MEF 3.0 session reader.
//!
//! [`MefReader`] opens a `.mefd` directory, loads every channel's metadata
//! and block indices into memory, and then serves time- or sample-range
//! queries by decompressing only the overlapping RED blocks. The session is
//! treated as immutable for the reader's lifetime; no file handles are held
//! between queries.
//!
//! # Example
//!
//! ```no_run
//! use mef3_rs::{MefReader, Result};
//!
//! fn read_channel(path: &str) -> Result<()> {
//!     let reader = MefReader::open(path)?;
//!     for name in reader.channels() {
//!         let info = reader.get_channel_info(&name)?;
//!         println!("{name}: {} samples at {} Hz", info.number_of_samples,
//!             info.sampling_frequency);
//!         let data = reader.get_data(&name, None, None)?;
//!         println!("  read {} values", data.len());
//!     }
//!     Ok(())
//! }
//! ```

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::blocks::{
    MetadataSection3, TimeSeriesIndex, TimeSeriesMetadataSection2, UUTC_NO_ENTRY,
};
use crate::channel::{ChannelInfo, SegmentInfo};
use crate::crypt::PasswordData;
use crate::red::{self, RED_NAN};
use crate::session;
use crate::{Error, Result};

mod load;

/// One loaded segment: its summary, its block indices, and the `.tdat` path
/// blocks are fetched from.
pub(crate) struct SegmentData {
    pub info: SegmentInfo,
    pub indices: Vec<TimeSeriesIndex>,
    pub data_path: PathBuf,
}

/// One loaded channel. The first segment's metadata sections describe the
/// channel as a whole.
pub(crate) struct ChannelData {
    pub info: ChannelInfo,
    pub segments: Vec<SegmentData>,
    pub metadata_2: TimeSeriesMetadataSection2,
    pub metadata_3: MetadataSection3,
}

/// Reader for MEF 3.0 sessions.
///
/// All metadata and indices are copied into memory during
/// [`open()`](Self::open); queries only touch `.tdat` files. The reader is
/// stateless after load, so shared references may be used from multiple
/// threads.
pub struct MefReader {
    path: PathBuf,
    session_name: String,
    start_time: i64,
    end_time: i64,
    valid: bool,
    validate_crc: bool,
    password: Option<String>,
    password_data: PasswordData,
    channels: BTreeMap<String, ChannelData>,
}

impl MefReader {
    /// Open a session directory.
    ///
    /// # Arguments
    /// * `path` - An existing directory whose name ends in `.mefd`.
    ///
    /// # Returns
    /// The loaded reader. A session containing no readable channels loads
    /// with [`is_valid()`](Self::is_valid) returning false.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_password(path, None)
    }

    /// Open a session, providing a password for encrypted content.
    ///
    /// The password is checked against the password validation fields of the
    /// session's files; a mismatch fails with [`Error::WrongPassword`].
    pub fn open_with_password(path: impl AsRef<Path>, password: Option<&str>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(Error::InvalidPath(path.display().to_string()));
        }
        if path
            .extension()
            .map_or(true, |ext| ext != session::SESSION_DIRECTORY_EXTENSION)
        {
            return Err(Error::InvalidPath(format!(
                "{}: session directories end in .mefd",
                path.display()
            )));
        }

        let password = password.filter(|p| !p.is_empty()).map(str::to_string);
        // A single password may unlock either tier; try it for both.
        let password_data =
            PasswordData::from_passwords(password.as_deref(), password.as_deref());

        let mut reader = MefReader {
            path: path.to_path_buf(),
            session_name: session::session_name_from_path(path),
            start_time: UUTC_NO_ENTRY,
            end_time: UUTC_NO_ENTRY,
            valid: false,
            validate_crc: false,
            password,
            password_data,
            channels: BTreeMap::new(),
        };
        reader.load_session()?;
        reader.valid = !reader.channels.is_empty();
        Ok(reader)
    }

    /// Whether the session loaded with at least one readable channel.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Treat CRC mismatches in RED blocks as errors during queries.
    ///
    /// Off by default: mismatches are logged and decoding proceeds.
    pub fn set_validate_crc(&mut self, validate: bool) {
        self.validate_crc = validate;
    }

    /// The session directory path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The session name (directory stem without `.mefd`).
    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    /// Earliest channel start time, or [`UUTC_NO_ENTRY`].
    pub fn start_time(&self) -> i64 {
        self.start_time
    }

    /// Latest channel end time, or [`UUTC_NO_ENTRY`].
    pub fn end_time(&self) -> i64 {
        self.end_time
    }

    /// Session duration in microseconds.
    pub fn duration(&self) -> i64 {
        if self.start_time == UUTC_NO_ENTRY || self.end_time == UUTC_NO_ENTRY {
            return 0;
        }
        self.end_time - self.start_time
    }

    /// Names of all channels, sorted.
    pub fn channels(&self) -> Vec<String> {
        self.channels.keys().cloned().collect()
    }

    /// Names of all time-series channels, sorted.
    ///
    /// Currently identical to [`channels()`](Self::channels); video channels
    /// are not loaded.
    pub fn get_time_series_channels(&self) -> Vec<String> {
        self.channels()
    }

    /// Aggregated information for one channel.
    pub fn get_channel_info(&self, channel_name: &str) -> Result<&ChannelInfo> {
        self.channels
            .get(channel_name)
            .map(|c| &c.info)
            .ok_or_else(|| Error::ChannelNotFound(channel_name.to_string()))
    }

    /// The channel's time-series metadata (section 2), from its first
    /// segment.
    pub fn get_channel_metadata(
        &self,
        channel_name: &str,
    ) -> Result<&TimeSeriesMetadataSection2> {
        self.channels
            .get(channel_name)
            .map(|c| &c.metadata_2)
            .ok_or_else(|| Error::ChannelNotFound(channel_name.to_string()))
    }

    /// The channel's subject and recording-time metadata (section 3), from
    /// its first segment.
    pub fn get_subject_metadata(&self, channel_name: &str) -> Result<&MetadataSection3> {
        self.channels
            .get(channel_name)
            .map(|c| &c.metadata_3)
            .ok_or_else(|| Error::ChannelNotFound(channel_name.to_string()))
    }

    /// Per-segment information for one channel, in segment order.
    pub fn get_segments(&self, channel_name: &str) -> Result<Vec<SegmentInfo>> {
        let channel = self
            .channels
            .get(channel_name)
            .ok_or_else(|| Error::ChannelNotFound(channel_name.to_string()))?;
        Ok(channel.segments.iter().map(|s| s.info.clone()).collect())
    }

    /// Look up a numeric property.
    ///
    /// Session-scoped (`channel` = `None`): `start_time`, `end_time`,
    /// `duration`. Channel-scoped: `fsamp`/`sampling_frequency`,
    /// `num_samples`/`number_of_samples`, `start_time`, `end_time`,
    /// `duration`, `units_conversion_factor`.
    pub fn get_numeric_property(&self, property_name: &str, channel: Option<&str>) -> Result<f64> {
        match channel {
            None => match property_name {
                "start_time" => Ok(self.start_time as f64),
                "end_time" => Ok(self.end_time as f64),
                "duration" => Ok(self.duration() as f64),
                _ => Err(Error::UnknownProperty(property_name.to_string())),
            },
            Some(channel_name) => {
                let info = self.get_channel_info(channel_name)?;
                match property_name {
                    "fsamp" | "sampling_frequency" => Ok(info.sampling_frequency),
                    "num_samples" | "number_of_samples" => Ok(info.number_of_samples as f64),
                    "start_time" => Ok(info.start_time as f64),
                    "end_time" => Ok(info.end_time as f64),
                    "duration" => Ok((info.end_time - info.start_time) as f64),
                    "units_conversion_factor" => Ok(info.units_conversion_factor),
                    _ => Err(Error::UnknownProperty(property_name.to_string())),
                }
            }
        }
    }

    /// Look up a string property.
    ///
    /// Session-scoped: `session_name`, `path`. Channel-scoped:
    /// `unit`/`units`, `channel_name`.
    pub fn get_string_property(
        &self,
        property_name: &str,
        channel: Option<&str>,
    ) -> Result<String> {
        match channel {
            None => match property_name {
                "session_name" => Ok(self.session_name.clone()),
                "path" => Ok(self.path.display().to_string()),
                _ => Err(Error::UnknownProperty(property_name.to_string())),
            },
            Some(channel_name) => {
                let info = self.get_channel_info(channel_name)?;
                match property_name {
                    "unit" | "units" => Ok(info.units.clone()),
                    "channel_name" => Ok(info.name.clone()),
                    _ => Err(Error::UnknownProperty(property_name.to_string())),
                }
            }
        }
    }

    /// Read converted samples from a channel by time range.
    ///
    /// Both bounds are in uUTC and inclusive; `None` defaults to the
    /// channel's own bounds, so `get_data(ch, None, None)` returns the whole
    /// channel. Raw samples are multiplied by the channel's units conversion
    /// factor (a stored factor of 0 is treated as 1) and the
    /// [`RED_NAN`] sentinel maps back to `f64::NAN`.
    pub fn get_data(
        &self,
        channel_name: &str,
        start_time: Option<i64>,
        end_time: Option<i64>,
    ) -> Result<Vec<f64>> {
        let info = self.get_channel_info(channel_name)?;
        let sampling_frequency = info.sampling_frequency;
        if sampling_frequency <= 0.0 {
            return Err(Error::InvalidFormat(format!(
                "channel {channel_name} has no valid sampling frequency"
            )));
        }

        let t_start = start_time.unwrap_or(info.start_time);
        let t_end = end_time.unwrap_or(info.end_time);

        let to_sample = |t: i64| {
            (t.saturating_sub(info.start_time) as f64 * sampling_frequency / 1e6).round() as i64
        };
        let start_sample = to_sample(t_start).clamp(0, info.number_of_samples);
        // The end bound is inclusive: the sample at t_end is returned.
        let end_sample = to_sample(t_end)
            .saturating_add(1)
            .clamp(0, info.number_of_samples);

        let conversion = if info.units_conversion_factor == 0.0 {
            1.0
        } else {
            info.units_conversion_factor
        };

        let raw = self.get_raw_data(channel_name, start_sample, end_sample)?;
        Ok(raw
            .into_iter()
            .map(|sample| {
                if sample == RED_NAN {
                    f64::NAN
                } else {
                    f64::from(sample) * conversion
                }
            })
            .collect())
    }

    /// Read raw `i32` samples from a channel by sample range.
    ///
    /// The range `[start_sample, end_sample)` is in channel-cumulative
    /// coordinates across segments. Results concatenate in segment order;
    /// segments whose data files are missing or unreadable are skipped with a
    /// warning.
    pub fn get_raw_data(
        &self,
        channel_name: &str,
        start_sample: i64,
        end_sample: i64,
    ) -> Result<Vec<i32>> {
        let channel = self
            .channels
            .get(channel_name)
            .ok_or_else(|| Error::ChannelNotFound(channel_name.to_string()))?;

        let mut result = Vec::with_capacity((end_sample - start_sample).max(0) as usize);
        let mut accumulated_samples = 0i64;

        for segment in &channel.segments {
            let segment_start = accumulated_samples;
            let segment_end = accumulated_samples + segment.info.number_of_samples;
            accumulated_samples = segment_end;

            if segment_end <= start_sample || segment_start >= end_sample {
                continue;
            }
            let window_start = start_sample.max(segment_start);
            let window_end = end_sample.min(segment_end);

            match self.read_segment_range(segment, window_start, window_end, &mut result) {
                Ok(()) => {}
                // Integrity and access failures must reach the caller.
                Err(e @ (Error::WrongPassword | Error::CrcMismatch { .. })) => return Err(e),
                Err(e) => {
                    warn!(
                        segment = %segment.info.name,
                        error = %e,
                        "skipping unreadable segment"
                    );
                }
            }
        }
        Ok(result)
    }

    /// Decompress the blocks of one segment overlapping
    /// `[window_start, window_end)` (channel-cumulative coordinates) and
    /// append the clipped samples to `result`.
    fn read_segment_range(
        &self,
        segment: &SegmentData,
        window_start: i64,
        window_end: i64,
        result: &mut Vec<i32>,
    ) -> Result<()> {
        let mut file = File::open(&segment.data_path)?;

        for index in &segment.indices {
            let block_start = index.start_sample;
            let block_end = block_start + i64::from(index.number_of_samples);
            if block_end <= window_start || block_start >= window_end {
                continue;
            }

            file.seek(SeekFrom::Start(index.file_offset as u64))?;
            let mut compressed = vec![0u8; index.block_bytes as usize];
            file.read_exact(&mut compressed)?;

            let decoded =
                red::decompress(&compressed, Some(&self.password_data), self.validate_crc)?;

            let local_start = (window_start - block_start).max(0) as usize;
            let local_end =
                ((window_end - block_start).max(0) as usize).min(decoded.samples.len());
            if local_start < local_end {
                result.extend_from_slice(&decoded.samples[local_start..local_end]);
            }
        }
        Ok(())
    }
}
