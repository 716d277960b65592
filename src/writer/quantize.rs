// Float-to-integer quantization for the write path.
use crate::red::{RED_MAXIMUM_SAMPLE_VALUE, RED_MINIMUM_SAMPLE_VALUE, RED_NAN};

pub(super) struct Quantized {
    pub samples: Vec<i32>,
    /// `1 / scale` when a scale other than 1 was applied.
    pub units_conversion_factor: Option<f64>,
}

/// Quantize floats into the RED sample range.
///
/// With an explicit `precision` the scale is `10^precision`. Otherwise the
/// scale maps the largest finite magnitude onto 90% of the representable
/// range. NaN becomes the `RED_NAN` sentinel; finite values are rounded and
/// clamped.
pub(super) fn quantize(data: &[f64], precision: Option<i32>) -> Quantized {
    let scale = match precision {
        Some(p) => 10f64.powi(p),
        None => {
            let max_magnitude = data
                .iter()
                .copied()
                .filter(|v| !v.is_nan())
                .fold(0.0f64, |acc, v| acc.max(v.abs()));
            if max_magnitude > 0.0 {
                f64::from(RED_MAXIMUM_SAMPLE_VALUE) / max_magnitude * 0.9
            } else {
                1.0
            }
        }
    };

    let samples = data
        .iter()
        .map(|&value| {
            if value.is_nan() {
                RED_NAN
            } else {
                (value * scale)
                    .round()
                    .clamp(
                        f64::from(RED_MINIMUM_SAMPLE_VALUE),
                        f64::from(RED_MAXIMUM_SAMPLE_VALUE),
                    ) as i32
            }
        })
        .collect();

    Quantized {
        samples,
        units_conversion_factor: (scale != 1.0).then(|| 1.0 / scale),
    }
}
