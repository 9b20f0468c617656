//! Width prediction and the tolerance gate.

use super::{Candidate, MatchResult, TextVariant, UnitFailureKind, WidthMatchConfig};
use crate::calibrate::CalibrationProfile;
use crate::collab::GlyphMetrics;
use crate::detect::RedactionBox;
use crate::rank;

/// Extra width contributed by tracking: one offset per inter-letter gap.
pub fn tracking_adjustment(text: &str, offset_px: f64) -> f64 {
    let gaps = text.chars().count().saturating_sub(1);
    offset_px * gaps as f64
}

/// Predicted rendered width of `text` in working pixels.
pub fn predict_width(profile: &CalibrationProfile, metrics: &dyn GlyphMetrics, text: &str) -> f64 {
    metrics.measure_width(text, &profile.font, profile.kerning_mode) * profile.scale_factor
        + tracking_adjustment(text, profile.tracking_offset_px)
}

/// Allowed absolute width difference for a predicted width.
pub fn tolerance_px(predicted_px: f64, config: &WidthMatchConfig) -> f64 {
    (config.tolerance_fraction * predicted_px.max(0.0)).max(config.tolerance_floor_px)
}

/// Width comparison between one string and one box.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WidthVerdict {
    pub predicted_width_px: f64,
    /// `predicted - box.width`; negative when the string is too narrow.
    pub width_diff_px: f64,
    pub width_error_pct: f64,
    pub tolerance_px: f64,
}

impl WidthVerdict {
    pub fn within_tolerance(&self) -> bool {
        self.width_diff_px.abs() <= self.tolerance_px
    }
}

/// Compare the predicted width of `text` against `bx`.
pub fn judge_width(
    profile: &CalibrationProfile,
    metrics: &dyn GlyphMetrics,
    bx: &RedactionBox,
    text: &str,
    config: &WidthMatchConfig,
) -> Result<WidthVerdict, UnitFailureKind> {
    if text.trim().is_empty() {
        return Err(UnitFailureKind::EmptyText);
    }
    let measured = metrics.measure_width(text, &profile.font, profile.kerning_mode);
    if !(measured > 0.0) || !measured.is_finite() {
        return Err(UnitFailureKind::ZeroWidth);
    }
    let predicted = measured * profile.scale_factor
        + tracking_adjustment(text, profile.tracking_offset_px);
    if !(predicted > 0.0) || !predicted.is_finite() {
        return Err(UnitFailureKind::ZeroWidth);
    }
    let diff = predicted - bx.width as f64;
    let error_pct = if bx.width > 0 {
        diff.abs() / bx.width as f64 * 100.0
    } else {
        f64::INFINITY
    };
    Ok(WidthVerdict {
        predicted_width_px: predicted,
        width_diff_px: diff,
        width_error_pct: error_pct,
        tolerance_px: tolerance_px(predicted, config),
    })
}

/// One (box, candidate variant) pair.
#[derive(Debug, Clone, Copy)]
pub struct MatchUnit<'a> {
    pub box_index: usize,
    pub redaction_box: &'a RedactionBox,
    pub candidate: &'a Candidate,
    pub variant: TextVariant,
    /// Variant text actually measured.
    pub text: &'a str,
}

/// Score one unit. `Ok(None)` means the width is outside tolerance.
pub fn match_box(
    profile: &CalibrationProfile,
    metrics: &dyn GlyphMetrics,
    unit: &MatchUnit<'_>,
    config: &WidthMatchConfig,
) -> Result<Option<MatchResult>, UnitFailureKind> {
    let verdict = judge_width(profile, metrics, unit.redaction_box, unit.text, config)?;
    if !verdict.within_tolerance() {
        return Ok(None);
    }
    let declared = unit.candidate.confidence();
    Ok(Some(MatchResult {
        box_index: unit.box_index,
        redaction_box: *unit.redaction_box,
        candidate_text: unit.text.to_string(),
        base_text: unit.candidate.text.trim().to_string(),
        variant: unit.variant,
        declared_confidence: declared,
        predicted_width_px: verdict.predicted_width_px,
        width_diff_px: verdict.width_diff_px,
        width_error_pct: verdict.width_error_pct,
        tolerance_px: verdict.tolerance_px,
        artifact_score: 0.0,
        combined_score: rank::combined_score(verdict.width_error_pct, declared, 0.0, 0.0),
        notes: unit.candidate.notes.clone(),
    }))
}
