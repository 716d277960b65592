//! Public channel and segment summaries exposed by [`MefReader`](crate::MefReader).

use crate::blocks::UUTC_NO_ENTRY;

/// Aggregated description of one time-series channel.
///
/// Built during session load by summing segment sample counts and taking the
/// min/max of the per-segment time bounds (ignoring unknown times).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChannelInfo {
    /// Channel name (the `.timd` directory stem).
    pub name: String,
    /// Samples across all segments.
    pub number_of_samples: i64,
    /// Sampling frequency in Hz, identical across segments.
    pub sampling_frequency: f64,
    /// uUTC of the first sample, or [`UUTC_NO_ENTRY`].
    pub start_time: i64,
    /// uUTC of the last sample, or [`UUTC_NO_ENTRY`].
    pub end_time: i64,
    /// Unit string from the channel metadata, e.g. `"uV"`.
    pub units: String,
    /// Multiply raw samples by this to recover native units.
    pub units_conversion_factor: f64,
    /// Segment directories found for the channel.
    pub number_of_segments: i32,
}

impl Default for ChannelInfo {
    fn default() -> Self {
        ChannelInfo {
            name: String::new(),
            number_of_samples: 0,
            sampling_frequency: 0.0,
            start_time: UUTC_NO_ENTRY,
            end_time: UUTC_NO_ENTRY,
            units: String::new(),
            units_conversion_factor: 1.0,
            number_of_segments: 0,
        }
    }
}

/// Description of one segment of a channel.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SegmentInfo {
    /// Segment stem, `<channel>-NNNNNN`.
    pub name: String,
    /// Zero-based segment number parsed from the name.
    pub segment_number: i32,
    /// uUTC of the segment's first sample, or [`UUTC_NO_ENTRY`].
    pub start_time: i64,
    /// uUTC of the segment's last sample, or [`UUTC_NO_ENTRY`].
    pub end_time: i64,
    /// Channel-cumulative index of the segment's first sample.
    pub start_sample: i64,
    /// Samples in the segment.
    pub number_of_samples: i64,
    /// RED blocks in the segment.
    pub number_of_blocks: i64,
}

impl Default for SegmentInfo {
    fn default() -> Self {
        SegmentInfo {
            name: String::new(),
            segment_number: 0,
            start_time: UUTC_NO_ENTRY,
            end_time: UUTC_NO_ENTRY,
            start_sample: 0,
            number_of_samples: 0,
            number_of_blocks: 0,
        }
    }
}
