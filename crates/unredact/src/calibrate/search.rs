//! Font × tracking × kerning sweep.
//!
//! Every sweep point converts each reference word into an implied scale
//! factor. A correct font/tracking/kerning hypothesis makes all words agree
//! on the same scale, so the coefficient of variation of the implied scales
//! is the score (lower is better). Points are evaluated in parallel and then
//! ordered by a single comparator, which makes the winner independent of
//! thread scheduling.

use std::cmp::Ordering;

use rayon::prelude::*;

use super::reference::ReferenceObservation;
use crate::collab::{FontDescriptor, FontLibrary, GlyphMetrics, KerningMode};
use crate::error::CalibrationError;
use crate::matching::tracking_adjustment;

const MAX_TRACKING_STEPS: usize = 10_000;

/// Mean, population standard deviation and coefficient of variation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleStats {
    pub mean: f64,
    pub std_dev: f64,
    pub variation: f64,
    pub count: usize,
}

/// Statistics of a set of implied scale samples.
///
/// Returns `None` for an empty set or a non-positive mean (the coefficient of
/// variation is undefined there).
pub fn scale_stats(samples: &[f64]) -> Option<ScaleStats> {
    if samples.is_empty() {
        return None;
    }
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    if !(mean > 0.0) || !mean.is_finite() {
        return None;
    }
    let var = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
    let std_dev = var.sqrt();
    Some(ScaleStats {
        mean,
        std_dev,
        variation: std_dev / mean,
        count: samples.len(),
    })
}

/// Tracking offsets from `min_px` to `max_px` inclusive.
///
/// Offsets are generated from an integer index so the sweep never drifts,
/// and rounded to 1e-6 px.
pub fn tracking_offsets(
    min_px: f64,
    max_px: f64,
    step_px: f64,
) -> Result<Vec<f64>, CalibrationError> {
    if !(min_px.is_finite() && max_px.is_finite()) || max_px < min_px {
        return Err(CalibrationError::InvalidSweep(format!(
            "tracking range [{min_px}, {max_px}] is empty"
        )));
    }
    if !(step_px > 0.0) || !step_px.is_finite() {
        return Err(CalibrationError::InvalidSweep(format!(
            "tracking step {step_px} must be positive"
        )));
    }
    let steps = ((max_px - min_px) / step_px + 1e-9).floor();
    if steps > MAX_TRACKING_STEPS as f64 {
        return Err(CalibrationError::InvalidSweep(format!(
            "{steps} tracking steps exceed the limit of {MAX_TRACKING_STEPS}"
        )));
    }
    Ok((0..=steps as usize)
        .map(|i| ((min_px + i as f64 * step_px) * 1e6).round() / 1e6 + 0.0)
        .collect())
}

/// One evaluated hypothesis of the sweep.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SweepPoint {
    pub font: FontDescriptor,
    pub tracking_offset_px: f64,
    pub kerning_mode: KerningMode,
    /// Mean implied scale (working pixels per unit-scale pixel).
    pub mean_scale: f64,
    pub std_dev: f64,
    pub coefficient_of_variation: f64,
    pub sample_count: usize,
    /// Reference word whose implied scale is closest to the mean.
    pub reference_text: String,
}

pub(crate) fn evaluate_point(
    refs: &[&ReferenceObservation],
    font: &FontDescriptor,
    tracking_px: f64,
    kerning: KerningMode,
    metrics: &dyn GlyphMetrics,
    min_samples: usize,
) -> Option<SweepPoint> {
    let mut scales = Vec::with_capacity(refs.len());
    let mut texts = Vec::with_capacity(refs.len());
    for obs in refs {
        let text = obs.measured_text();
        let measured = metrics.measure_width(text, font, kerning);
        if !(measured > 0.0) || !measured.is_finite() {
            continue;
        }
        let corrected = obs.width as f64 - tracking_adjustment(text, tracking_px);
        if !(corrected > 0.0) {
            continue;
        }
        scales.push(corrected / measured);
        texts.push(text);
    }
    if scales.len() < min_samples {
        return None;
    }
    let stats = scale_stats(&scales)?;

    let mut closest = 0usize;
    for (i, s) in scales.iter().enumerate() {
        if (s - stats.mean).abs() < (scales[closest] - stats.mean).abs() {
            closest = i;
        }
    }

    Some(SweepPoint {
        font: font.clone(),
        tracking_offset_px: tracking_px,
        kerning_mode: kerning,
        mean_scale: stats.mean,
        std_dev: stats.std_dev,
        coefficient_of_variation: stats.variation,
        sample_count: stats.count,
        reference_text: texts[closest].to_string(),
    })
}

/// Coefficient of variation quantized to 1e-9 so rounding noise between
/// otherwise equivalent hypotheses falls through to the tie-breaks.
fn variation_key(p: &SweepPoint) -> i64 {
    (p.coefficient_of_variation * 1e9).round() as i64
}

/// Total order over sweep points, best first.
///
/// Lower variation, then more samples, then smaller point size, then smaller
/// |tracking|, then metric kerning before standard, then family id.
pub fn compare_points(a: &SweepPoint, b: &SweepPoint) -> Ordering {
    variation_key(a)
        .cmp(&variation_key(b))
        .then_with(|| b.sample_count.cmp(&a.sample_count))
        .then_with(|| a.font.point_size.total_cmp(&b.font.point_size))
        .then_with(|| {
            a.tracking_offset_px
                .abs()
                .total_cmp(&b.tracking_offset_px.abs())
        })
        .then_with(|| a.kerning_mode.cmp(&b.kerning_mode))
        .then_with(|| a.font.family_id.cmp(&b.font.family_id))
        .then_with(|| a.tracking_offset_px.total_cmp(&b.tracking_offset_px))
        .then_with(|| {
            a.coefficient_of_variation
                .total_cmp(&b.coefficient_of_variation)
        })
}

/// Result of a full sweep: every accepted point, best first.
pub(crate) struct SweepOutcome {
    pub tuples_evaluated: usize,
    pub points: Vec<SweepPoint>,
}

pub(crate) fn sweep(
    refs: &[&ReferenceObservation],
    library: &FontLibrary,
    offsets: &[f64],
    modes: &[KerningMode],
    metrics: &dyn GlyphMetrics,
    min_samples: usize,
) -> SweepOutcome {
    let tuples: Vec<(&FontDescriptor, f64, KerningMode)> = library
        .descriptors()
        .iter()
        .flat_map(|font| {
            offsets
                .iter()
                .flat_map(move |&t| modes.iter().map(move |&k| (font, t, k)))
        })
        .collect();

    let mut points: Vec<SweepPoint> = tuples
        .par_iter()
        .filter_map(|&(font, t, k)| evaluate_point(refs, font, t, k, metrics, min_samples))
        .collect();
    points.par_sort_by(compare_points);

    tracing::debug!(
        "calibration sweep: {} tuples, {} with at least {} samples",
        tuples.len(),
        points.len(),
        min_samples
    );
    SweepOutcome {
        tuples_evaluated: tuples.len(),
        points,
    }
}
