//! Sequence windowing, padding and tensorization

use super::features::{FeatureVector, FIELDS};
use crate::error::{Error, Result};
use ndarray::Array2;

/// Penalty applied to the data-quality score per corrupt field value
pub const QUALITY_PENALTY: f64 = 0.1;

/// Fit a sequence to exactly `window` steps
///
/// Longer sequences keep the most recent `window` elements. Shorter ones are
/// left-padded by repeating the earliest element.
///
/// # Errors
/// `EmptyInput` when `seq` is empty.
pub fn pad_sequence<T: Clone>(seq: &[T], window: usize) -> Result<Vec<T>> {
    let first = seq.first().ok_or(Error::EmptyInput)?;

    if seq.len() >= window {
        return Ok(seq[seq.len() - window..].to_vec());
    }

    let mut padded = Vec::with_capacity(window);
    padded.extend(std::iter::repeat(first.clone()).take(window - seq.len()));
    padded.extend_from_slice(seq);
    Ok(padded)
}

/// Numeric form of a sequence plus the quality assessment of its raw values
#[derive(Debug, Clone)]
pub struct Tensorized {
    /// Rows are time steps, columns follow [`FIELDS`]
    pub data: Array2<f64>,
    /// 1.0 for clean input, reduced by [`QUALITY_PENALTY`] per bad value
    pub quality: f64,
    /// Number of NaN, infinite or out-of-range values seen
    pub issues: usize,
}

/// Convert feature vectors to a matrix in field order
///
/// Unusable values (non-finite, or non-positive on a log-scaled field) are
/// replaced by the same field at the previous step, else the next usable
/// step, else the field's neutral reading. Out-of-range values are clamped.
/// Each occurrence lowers the quality score. With `strict` set, a non-finite
/// value is an error instead.
pub fn tensorize(seq: &[FeatureVector], strict: bool) -> Result<Tensorized> {
    let raw: Vec<[f64; FeatureVector::WIDTH]> = seq.iter().map(FeatureVector::values).collect();
    let neutral = FeatureVector::default().values();
    let mut data = Array2::zeros((seq.len(), FeatureVector::WIDTH));
    let mut issues = 0usize;

    for (j, spec) in FIELDS.iter().enumerate() {
        let mut previous: Option<f64> = None;

        for (t, row) in raw.iter().enumerate() {
            let value = row[j];
            let repaired = if spec.is_usable(value) {
                let clamped = spec.clamp(value);
                if clamped != value {
                    issues += 1;
                }
                clamped
            } else {
                if strict && !value.is_finite() {
                    return Err(Error::CorruptSample(format!(
                        "non-finite {} at step {}",
                        spec.name, t
                    )));
                }
                issues += 1;
                let fill = previous
                    .or_else(|| {
                        raw[t + 1..]
                            .iter()
                            .map(|later| later[j])
                            .find(|v| spec.is_usable(*v))
                    })
                    .unwrap_or(neutral[j]);
                spec.clamp(fill)
            };

            previous = Some(repaired);
            data[[t, j]] = spec.transform.apply(repaired);
        }
    }

    let quality = (1.0 - QUALITY_PENALTY * issues as f64).max(0.0);
    Ok(Tensorized {
        data,
        quality,
        issues,
    })
}
