//! Width matching of candidate strings against redaction boxes.
//!
//! Under a calibration profile every candidate string has a predicted
//! rendered width. A candidate (in any of its text variants) matches a box
//! when that prediction is within tolerance of the box width. Matching is
//! the primary, geometric signal; halo artifacts only corroborate it.

mod batch;
mod variants;
mod width;

pub use batch::{find_matches, MatchBatch};
pub use variants::{text_variants, TextVariant};
pub use width::{
    judge_width, match_box, predict_width, tolerance_px, tracking_adjustment, MatchUnit,
    WidthVerdict,
};

use crate::detect::RedactionBox;

/// Upper bound of the declared-confidence scale.
pub const MAX_DECLARED_CONFIDENCE: f64 = 10.0;

/// A name or phrase that may be hidden under a redaction.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Candidate {
    #[serde(alias = "name")]
    pub text: String,
    /// Prior plausibility on a 0..=10 scale.
    #[serde(default, alias = "confidence")]
    pub declared_confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Candidate {
    /// New candidate. The declared confidence is kept as given and clamped
    /// on use by [`Candidate::confidence`].
    pub fn new(text: impl Into<String>, declared_confidence: f64) -> Self {
        Self {
            text: text.into(),
            declared_confidence,
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Declared confidence clamped to [0, 10]; non-finite values count as 0.
    pub fn confidence(&self) -> f64 {
        if self.declared_confidence.is_finite() {
            self.declared_confidence.clamp(0.0, MAX_DECLARED_CONFIDENCE)
        } else {
            0.0
        }
    }

    pub(crate) fn confidence_in_range(&self) -> bool {
        (0.0..=MAX_DECLARED_CONFIDENCE).contains(&self.declared_confidence)
    }
}

/// Tolerances and variant selection for width matching.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct WidthMatchConfig {
    /// Minimum absolute tolerance (working pixels).
    pub tolerance_floor_px: f64,
    /// Tolerance as a fraction of the predicted width.
    pub tolerance_fraction: f64,
    /// Text variants scored besides the original.
    pub variants: Vec<TextVariant>,
}

impl Default for WidthMatchConfig {
    fn default() -> Self {
        Self {
            tolerance_floor_px: 3.0,
            tolerance_fraction: 0.05,
            variants: TextVariant::ALL.to_vec(),
        }
    }
}

/// A candidate variant whose predicted width fits a box.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MatchResult {
    /// Index of the box in the detector's reading-order list.
    pub box_index: usize,
    #[serde(rename = "box")]
    pub redaction_box: RedactionBox,
    /// Variant text that was measured.
    pub candidate_text: String,
    /// Candidate text before the variant transformation.
    pub base_text: String,
    pub variant: TextVariant,
    pub declared_confidence: f64,
    pub predicted_width_px: f64,
    /// `predicted - box.width` (working pixels).
    pub width_diff_px: f64,
    /// `|width_diff_px| / box.width * 100`.
    pub width_error_pct: f64,
    pub tolerance_px: f64,
    /// Halo corroboration in [0, 1]; 0 when not evaluated.
    pub artifact_score: f64,
    /// Ranking key, lower is better.
    pub combined_score: f64,
    /// Free-text notes of the candidate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Why a unit produced neither a match nor a tolerance rejection.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum UnitFailureKind {
    #[error("degenerate candidate: empty text")]
    EmptyText,
    #[error("degenerate candidate: measured width is zero")]
    ZeroWidth,
    #[error("no glyph template could be rendered")]
    TemplateUnavailable,
}

impl UnitFailureKind {
    pub fn is_degenerate(self) -> bool {
        matches!(
            self,
            UnitFailureKind::EmptyText | UnitFailureKind::ZeroWidth
        )
    }
}

/// A per-unit failure carried next to the results.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UnitFailure {
    pub box_index: usize,
    pub candidate_text: String,
    pub kind: UnitFailureKind,
}
