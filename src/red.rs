//! RED (Range Encoded Differences) codec.
//!
//! RED is MEF 3.0's lossless block codec for 32-bit signed samples. The
//! encoder stores the first sample verbatim and every following sample as the
//! difference from its predecessor, then packs each difference with a
//! variable-length prefix code:
//!
//! | Difference | Bytes | Wire form |
//! |---|---|---|
//! | `0..=127` | 1 | `0xxxxxxx` |
//! | `-64..=-1` | 1 | `10xxxxxx` stores `-d - 1` |
//! | `-4096..=4095` | 2 | `110s xxxx xxxxxxxx`, 12-bit magnitude |
//! | `-524288..=524287` | 3 | `1110 sxxx …`, 19-bit magnitude |
//! | otherwise | 5 | `0xF0` then the value, big-endian two's complement |
//!
//! A block is `[304-byte header | differences | 0x7E padding]`, padded to an
//! 8-byte boundary, with a CRC-32 over everything after the CRC field itself.
//! Blocks are the atomic decompression unit; there is no partial decode.
//!
//! Missing samples travel as the [`RED_NAN`] sentinel and are encoded like
//! any other value, so round-trips preserve them exactly. Differences use
//! wrapping arithmetic: the sentinel minus a neighbor overflows `i32`, and
//! the decoder's wrapping cumulative sum undoes it.

use crate::blocks::{
    RedBlockHeader, TimeSeriesIndex, PAD_BYTE_VALUE, RED_BLOCK_HEADER_BYTES,
    RED_BLOCK_STATISTICS_BYTES,
};
use crate::crypt::{PasswordData, LEVEL_1_ENCRYPTION, LEVEL_2_ENCRYPTION, NO_ENCRYPTION};
use crate::{crc, Error, Result};

use tracing::warn;

/// Sentinel for a missing sample.
pub const RED_NAN: i32 = i32::MIN;
/// Sentinel for negative infinity.
pub const RED_NEGATIVE_INFINITY: i32 = 0x8000_0001u32 as i32;
/// Sentinel for positive infinity.
pub const RED_POSITIVE_INFINITY: i32 = 0x7FFF_FFFF;
/// Largest representable finite sample value.
pub const RED_MAXIMUM_SAMPLE_VALUE: i32 = 0x7FFF_FFFE;
/// Smallest representable finite sample value.
pub const RED_MINIMUM_SAMPLE_VALUE: i32 = 0x8000_0002u32 as i32;

/// Worst-case compressed size for `num_samples` samples: every difference at
/// the 5-byte encoding, plus the header and padding slack.
pub fn max_compressed_size(num_samples: usize) -> usize {
    num_samples * 5 + RED_BLOCK_HEADER_BYTES + 7
}

/// Per-block compression options.
#[derive(Debug, Clone)]
pub struct CompressionParams {
    /// Mark the block as the start of a discontinuity.
    pub discontinuity: bool,
    /// Encryption tier for the difference payload (0, 1 or 2).
    pub encryption_level: i8,
}

impl Default for CompressionParams {
    fn default() -> Self {
        CompressionParams {
            discontinuity: true,
            encryption_level: NO_ENCRYPTION,
        }
    }
}

/// Output of [`compress`]: the finished block plus the bookkeeping the writer
/// needs to index it.
#[derive(Debug, Clone)]
pub struct CompressionResult {
    /// The complete block: header, differences, padding.
    pub compressed_data: Vec<u8>,
    /// The header as written into `compressed_data`.
    pub block_header: RedBlockHeader,
    /// A pre-filled index record; `file_offset` and `start_sample` are left
    /// at zero for the caller to assign.
    pub index: TimeSeriesIndex,
}

/// Output of [`decompress`].
#[derive(Debug, Clone)]
pub struct DecompressionResult {
    /// The reconstructed samples.
    pub samples: Vec<i32>,
    /// The parsed block header.
    pub block_header: RedBlockHeader,
}

/// Minimum and maximum sample value, ignoring [`RED_NAN`].
///
/// Returns `(RED_NAN, RED_NAN)` for an empty slice.
pub fn find_extrema(samples: &[i32]) -> (i32, i32) {
    if samples.is_empty() {
        return (RED_NAN, RED_NAN);
    }
    let mut min_val = RED_MAXIMUM_SAMPLE_VALUE;
    let mut max_val = RED_MINIMUM_SAMPLE_VALUE;
    for &value in samples {
        if value == RED_NAN {
            continue;
        }
        if value < min_val {
            min_val = value;
        }
        if value > max_val {
            max_val = value;
        }
    }
    (min_val, max_val)
}

fn differences(samples: &[i32]) -> Vec<i32> {
    let mut diffs = Vec::with_capacity(samples.len());
    diffs.push(samples[0]);
    for window in samples.windows(2) {
        diffs.push(window[1].wrapping_sub(window[0]));
    }
    diffs
}

fn encode_differences(diffs: &[i32], output: &mut Vec<u8>) {
    for &diff in diffs {
        if (0..=127).contains(&diff) {
            output.push(diff as u8);
        } else if (-64..0).contains(&diff) {
            output.push(0x80 | (-diff - 1) as u8);
        } else if (-4096..=4095).contains(&diff) {
            let magnitude = if diff >= 0 { diff } else { -diff - 1 };
            let sign = if diff < 0 { 0x10 } else { 0 };
            output.push(0xC0 | sign | ((magnitude >> 8) & 0x0F) as u8);
            output.push((magnitude & 0xFF) as u8);
        } else if (-524_288..=524_287).contains(&diff) {
            let magnitude = if diff >= 0 { diff } else { -diff - 1 };
            let sign = if diff < 0 { 0x08 } else { 0 };
            output.push(0xE0 | sign | ((magnitude >> 16) & 0x07) as u8);
            output.push(((magnitude >> 8) & 0xFF) as u8);
            output.push((magnitude & 0xFF) as u8);
        } else {
            output.push(0xF0);
            output.extend_from_slice(&diff.to_be_bytes());
        }
    }
}

fn decode_differences(input: &[u8], num_samples: usize) -> Result<Vec<i32>> {
    let mut samples = Vec::with_capacity(num_samples);
    let mut pos = 0usize;
    let mut previous = 0i32;

    let truncated = || {
        Error::DecompressionFailed("difference payload ends mid-stream".to_string())
    };

    for i in 0..num_samples {
        let byte = *input.get(pos).ok_or_else(truncated)?;
        pos += 1;

        let diff = if byte & 0x80 == 0 {
            i32::from(byte)
        } else if byte & 0xC0 == 0x80 {
            -i32::from(byte & 0x3F) - 1
        } else if byte & 0xE0 == 0xC0 {
            let low = *input.get(pos).ok_or_else(truncated)?;
            pos += 1;
            let magnitude = (i32::from(byte & 0x0F) << 8) | i32::from(low);
            if byte & 0x10 != 0 {
                -magnitude - 1
            } else {
                magnitude
            }
        } else if byte & 0xF0 == 0xE0 {
            if pos + 2 > input.len() {
                return Err(truncated());
            }
            let magnitude = (i32::from(byte & 0x07) << 16)
                | (i32::from(input[pos]) << 8)
                | i32::from(input[pos + 1]);
            pos += 2;
            if byte & 0x08 != 0 {
                -magnitude - 1
            } else {
                magnitude
            }
        } else if byte == 0xF0 {
            if pos + 4 > input.len() {
                return Err(truncated());
            }
            let value = i32::from_be_bytes(input[pos..pos + 4].try_into().unwrap());
            pos += 4;
            value
        } else {
            return Err(Error::DecompressionFailed(format!(
                "unknown prefix code {byte:#04x} at difference {i}"
            )));
        };

        previous = if i == 0 {
            diff
        } else {
            previous.wrapping_add(diff)
        };
        samples.push(previous);
    }

    Ok(samples)
}

/// Normalized frequency histogram of the differences.
///
/// Each difference is bucketed by `(diff + 128) & 0xFF`; the fullest bucket
/// scales to 255 and non-empty buckets never round down to zero. Decoders
/// ignore the histogram, it only participates in the block CRC.
fn compute_statistics(diffs: &[i32]) -> [u8; RED_BLOCK_STATISTICS_BYTES] {
    let mut counts = [0u64; RED_BLOCK_STATISTICS_BYTES];
    for &diff in diffs {
        let bucket = (diff.wrapping_add(128) & 0xFF) as usize;
        counts[bucket] += 1;
    }
    let mut stats = [0u8; RED_BLOCK_STATISTICS_BYTES];
    let max_count = counts.iter().copied().max().unwrap_or(0);
    if max_count > 0 {
        for (stat, &count) in stats.iter_mut().zip(counts.iter()) {
            *stat = ((count * 255) / max_count) as u8;
            if count > 0 && *stat == 0 {
                *stat = 1;
            }
        }
    }
    stats
}

/// Compress one block of samples.
///
/// # Arguments
/// * `samples` - Samples to encode; must be non-empty and at most one block.
/// * `start_time` - uUTC of the first sample.
/// * `params` - Discontinuity flag and encryption tier.
/// * `password_data` - Keys, required when `params.encryption_level > 0`.
///
/// # Returns
/// The finished block together with its header and a pre-filled index record,
/// or [`Error::CompressionFailed`] for an empty input or a missing key.
pub fn compress(
    samples: &[i32],
    start_time: i64,
    params: &CompressionParams,
    password_data: Option<&PasswordData>,
) -> Result<CompressionResult> {
    if samples.is_empty() {
        return Err(Error::CompressionFailed("empty sample block".to_string()));
    }

    let diffs = differences(samples);
    let mut encoded = Vec::with_capacity(max_compressed_size(samples.len()));
    encode_differences(&diffs, &mut encoded);

    let difference_bytes = encoded.len();
    let unpadded = RED_BLOCK_HEADER_BYTES + difference_bytes;
    let block_bytes = (unpadded + 7) & !7;

    let mut header = RedBlockHeader {
        difference_bytes: difference_bytes as u32,
        number_of_samples: samples.len() as u32,
        block_bytes: block_bytes as u32,
        start_time,
        statistics: compute_statistics(&diffs),
        ..Default::default()
    };
    header.set_discontinuity(params.discontinuity);
    match params.encryption_level {
        LEVEL_1_ENCRYPTION => header.set_level_1_encryption(true),
        LEVEL_2_ENCRYPTION => header.set_level_2_encryption(true),
        _ => {}
    }

    let mut block = header.to_bytes()?;
    block.append(&mut encoded);
    block.resize(block_bytes, PAD_BYTE_VALUE);

    if params.encryption_level != NO_ENCRYPTION {
        let key = password_data
            .and_then(|pd| pd.key_for_level(params.encryption_level).ok())
            .ok_or_else(|| {
                Error::CompressionFailed(format!(
                    "encryption level {} requested but no matching password was provided",
                    params.encryption_level
                ))
            })?;
        key.encrypt_region(
            &mut block[RED_BLOCK_HEADER_BYTES..RED_BLOCK_HEADER_BYTES + difference_bytes],
        );
    }

    let block_crc = crc::calculate(&block[4..]);
    header.block_crc = block_crc;
    block[..4].copy_from_slice(&block_crc.to_le_bytes());

    let (min_val, max_val) = find_extrema(samples);
    let index = TimeSeriesIndex {
        file_offset: 0,
        start_time,
        start_sample: 0,
        number_of_samples: samples.len() as u32,
        block_bytes: block_bytes as u32,
        maximum_sample_value: max_val,
        minimum_sample_value: min_val,
        red_block_flags: header.flags,
    };

    Ok(CompressionResult {
        compressed_data: block,
        block_header: header,
        index,
    })
}

/// Decompress one block.
///
/// # Arguments
/// * `data` - The block bytes; may extend past the block's declared size.
/// * `password_data` - Keys for encrypted payloads.
/// * `validate_crc` - When true a CRC mismatch is an error; otherwise it is
///   logged and decoding proceeds.
pub fn decompress(
    data: &[u8],
    password_data: Option<&PasswordData>,
    validate_crc: bool,
) -> Result<DecompressionResult> {
    if data.len() < RED_BLOCK_HEADER_BYTES {
        return Err(Error::DecompressionFailed(format!(
            "block of {} bytes is smaller than the {}-byte header",
            data.len(),
            RED_BLOCK_HEADER_BYTES
        )));
    }

    let header = RedBlockHeader::from_bytes(data)?;
    let block_bytes = header.block_bytes as usize;
    if block_bytes < RED_BLOCK_HEADER_BYTES || block_bytes > data.len() {
        return Err(Error::DecompressionFailed(format!(
            "declared block size {} bytes is inconsistent with {} available",
            block_bytes,
            data.len()
        )));
    }
    let block = &data[..block_bytes];

    let difference_bytes = header.difference_bytes as usize;
    if difference_bytes > block_bytes - RED_BLOCK_HEADER_BYTES {
        return Err(Error::DecompressionFailed(format!(
            "declared {} difference bytes exceed the {}-byte payload",
            difference_bytes,
            block_bytes - RED_BLOCK_HEADER_BYTES
        )));
    }

    let actual_crc = crc::calculate(&block[4..]);
    if actual_crc != header.block_crc {
        if validate_crc {
            return Err(Error::CrcMismatch {
                expected: header.block_crc,
                actual: actual_crc,
                context: "RED block",
            });
        }
        warn!(
            stored = header.block_crc,
            computed = actual_crc,
            "RED block CRC mismatch, decoding anyway"
        );
    }

    if header.number_of_samples == 0 {
        return Ok(DecompressionResult {
            samples: Vec::new(),
            block_header: header,
        });
    }

    let encryption_level = if header.is_level_2_encrypted() {
        LEVEL_2_ENCRYPTION
    } else if header.is_level_1_encrypted() {
        LEVEL_1_ENCRYPTION
    } else {
        NO_ENCRYPTION
    };

    let payload = &block[RED_BLOCK_HEADER_BYTES..RED_BLOCK_HEADER_BYTES + difference_bytes];
    let decrypted;
    let payload: &[u8] = if encryption_level != NO_ENCRYPTION {
        let key = password_data
            .ok_or(Error::WrongPassword)?
            .key_for_level(encryption_level)?;
        let mut buffer = payload.to_vec();
        key.decrypt_region(&mut buffer);
        decrypted = buffer;
        &decrypted
    } else {
        payload
    };

    let mut samples = decode_differences(payload, header.number_of_samples as usize)?;

    // Lossy blocks carry a pre-scale; undo it so callers always see sample
    // space. Out of scope for round-trip guarantees but tolerated on decode.
    if header.scale_factor != 1.0 && header.scale_factor != 0.0 {
        for sample in &mut samples {
            *sample = (f64::from(*sample) * f64::from(header.scale_factor)).round() as i32;
        }
    }

    Ok(DecompressionResult {
        samples,
        block_header: header,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::RED_DISCONTINUITY_MASK;

    fn round_trip(samples: &[i32]) -> CompressionResult {
        let result = compress(samples, 0, &CompressionParams::default(), None).unwrap();
        let decoded = decompress(&result.compressed_data, None, true).unwrap();
        assert_eq!(decoded.samples, samples);
        assert_eq!(
            decoded.block_header.number_of_samples as usize,
            samples.len()
        );
        result
    }

    #[test]
    fn single_sample() {
        round_trip(&[42]);
        round_trip(&[-42]);
        round_trip(&[RED_NAN]);
    }

    #[test]
    fn encoding_class_boundaries() {
        // Each value lands a difference exactly on a prefix-code boundary.
        round_trip(&[
            0, 127, 0, -64, -65, 4030, -66, 4095, -1, -4097, 0, 524_287, -1, -524_289, 0,
            RED_MAXIMUM_SAMPLE_VALUE, RED_MINIMUM_SAMPLE_VALUE, 0,
        ]);
    }

    #[test]
    fn nan_passthrough() {
        round_trip(&[100, RED_NAN, 102, RED_NAN, RED_NAN, -5]);
    }

    #[test]
    fn block_bytes_matches_output_len() {
        let result = round_trip(&[5; 1000]);
        assert_eq!(
            result.block_header.block_bytes as usize,
            result.compressed_data.len()
        );
        assert_eq!(result.compressed_data.len() % 8, 0);
        assert!(result.compressed_data.len() <= max_compressed_size(1000));
    }

    #[test]
    fn padding_uses_pad_byte() {
        let result = compress(&[1, 2, 3], 0, &CompressionParams::default(), None).unwrap();
        let diff_end = RED_BLOCK_HEADER_BYTES + result.block_header.difference_bytes as usize;
        assert!(result.compressed_data[diff_end..]
            .iter()
            .all(|&b| b == PAD_BYTE_VALUE));
    }

    #[test]
    fn extrema_ignore_nan() {
        assert_eq!(find_extrema(&[-100, 50, 200, -300, 150, 0, 75]), (-300, 200));
        assert_eq!(find_extrema(&[RED_NAN, 7, RED_NAN]), (7, 7));
        assert_eq!(find_extrema(&[]), (RED_NAN, RED_NAN));
    }

    #[test]
    fn index_is_prefilled() {
        let result = compress(
            &[10, -20, 30],
            1_000_000,
            &CompressionParams {
                discontinuity: true,
                encryption_level: NO_ENCRYPTION,
            },
            None,
        )
        .unwrap();
        assert_eq!(result.index.start_time, 1_000_000);
        assert_eq!(result.index.number_of_samples, 3);
        assert_eq!(result.index.maximum_sample_value, 30);
        assert_eq!(result.index.minimum_sample_value, -20);
        assert_eq!(result.index.red_block_flags & RED_DISCONTINUITY_MASK, 1);
        assert_eq!(result.index.block_bytes, result.block_header.block_bytes);
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(
            compress(&[], 0, &CompressionParams::default(), None),
            Err(Error::CompressionFailed(_))
        ));
    }

    #[test]
    fn truncated_header_is_rejected() {
        assert!(matches!(
            decompress(&[0u8; 100], None, true),
            Err(Error::DecompressionFailed(_))
        ));
    }

    #[test]
    fn inconsistent_difference_bytes_is_rejected() {
        let mut block = compress(&[1, 2, 3], 0, &CompressionParams::default(), None)
            .unwrap()
            .compressed_data;
        // Claim more difference bytes than the payload holds.
        block[28..32].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(
            decompress(&block, None, false),
            Err(Error::DecompressionFailed(_))
        ));
    }

    #[test]
    fn crc_mismatch_respects_validation_mode() {
        let mut block = compress(&[1, 2, 3, 4], 0, &CompressionParams::default(), None)
            .unwrap()
            .compressed_data;
        let flip = block.len() - 1;
        block[flip] ^= 0xFF;
        assert!(matches!(
            decompress(&block, None, true),
            Err(Error::CrcMismatch { .. })
        ));
        // Tolerant mode decodes anyway (the flipped byte was padding).
        let decoded = decompress(&block, None, false).unwrap();
        assert_eq!(decoded.samples, [1, 2, 3, 4]);
    }

    #[test]
    fn unknown_prefix_code_is_rejected() {
        let good = compress(&[1], 0, &CompressionParams::default(), None)
            .unwrap()
            .compressed_data;
        let mut bad = good.clone();
        bad[RED_BLOCK_HEADER_BYTES] = 0xF7;
        // Recompute the CRC so only the prefix code is at fault.
        let crc = crc::calculate(&bad[4..]);
        bad[..4].copy_from_slice(&crc.to_le_bytes());
        assert!(matches!(
            decompress(&bad, None, true),
            Err(Error::DecompressionFailed(_))
        ));
    }

    #[test]
    fn encrypted_round_trip() {
        let passwords = PasswordData::from_passwords(Some("level one"), None);
        let samples: Vec<i32> = (0..500).map(|i| (i * 37) % 1000 - 500).collect();
        let params = CompressionParams {
            discontinuity: false,
            encryption_level: LEVEL_1_ENCRYPTION,
        };
        let result = compress(&samples, 0, &params, Some(&passwords)).unwrap();
        assert!(result.block_header.is_level_1_encrypted());

        let decoded = decompress(&result.compressed_data, Some(&passwords), true).unwrap();
        assert_eq!(decoded.samples, samples);

        // Without the key the payload is unreadable.
        assert!(matches!(
            decompress(&result.compressed_data, None, true),
            Err(Error::WrongPassword)
        ));
    }

    #[test]
    fn encryption_without_key_fails_compression() {
        let params = CompressionParams {
            discontinuity: false,
            encryption_level: LEVEL_2_ENCRYPTION,
        };
        assert!(matches!(
            compress(&[1, 2, 3], 0, &params, None),
            Err(Error::CompressionFailed(_))
        ));
    }

    #[test]
    fn statistics_are_normalized() {
        let samples = vec![0i32; 100];
        let result = compress(&samples, 0, &CompressionParams::default(), None).unwrap();
        // All differences are zero, so bucket 128 dominates at 255.
        assert_eq!(result.block_header.statistics[128], 255);
        assert!(result
            .block_header
            .statistics
            .iter()
            .enumerate()
            .all(|(i, &s)| i == 128 || s == 0));
    }
}
