//! Calibration of the document's rendering profile against visible text.
//!
//! The visible words on the page were rendered by the same pipeline that
//! rendered the redacted text. Sweeping font, size, tracking and kerning
//! hypotheses over those words and keeping the one under which they agree
//! best on a single scale factor recovers that pipeline well enough to
//! predict the width of hidden strings.

mod profile;
mod reference;
mod search;

pub use profile::{CalibrationProfile, ReferenceFit, PROFILE_SCHEMA};
pub use reference::{usable_references, ReferenceFilterConfig, ReferenceObservation};
pub use search::{compare_points, scale_stats, tracking_offsets, ScaleStats, SweepPoint};

use crate::collab::{FontLibrary, GlyphMetrics, KerningMode};
use crate::error::CalibrationError;
use crate::raster::PageRaster;

/// Configuration for the calibration search.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Which OCR words are trusted as references.
    pub references: ReferenceFilterConfig,
    /// Minimum usable observations, both overall and per sweep point.
    pub min_samples: usize,
    /// Maximum accepted coefficient of variation of implied scales.
    pub max_variation: f64,
    /// Tracking sweep lower bound (working pixels).
    pub tracking_min_px: f64,
    /// Tracking sweep upper bound (working pixels).
    pub tracking_max_px: f64,
    /// Tracking sweep step (working pixels).
    pub tracking_step_px: f64,
    /// Kerning modes to try. Empty means all.
    pub kerning_modes: Vec<KerningMode>,
    /// Number of best sweep points kept in [`CalibrationReport::top`].
    pub report_top_n: usize,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            references: ReferenceFilterConfig::default(),
            min_samples: 5,
            max_variation: 0.05,
            tracking_min_px: -0.5,
            tracking_max_px: 1.0,
            tracking_step_px: 0.1,
            kerning_modes: KerningMode::ALL.to_vec(),
            report_top_n: 20,
        }
    }
}

impl CalibrationConfig {
    fn modes(&self) -> Vec<KerningMode> {
        let mut modes = if self.kerning_modes.is_empty() {
            KerningMode::ALL.to_vec()
        } else {
            self.kerning_modes.clone()
        };
        modes.sort();
        modes.dedup();
        modes
    }
}

/// Calibration outcome with sweep diagnostics.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CalibrationReport {
    pub profile: CalibrationProfile,
    /// Observations that passed the reference filter.
    pub usable_references: usize,
    /// Font × tracking × kerning tuples evaluated.
    pub tuples_evaluated: usize,
    /// Tuples that measured at least `min_samples` references.
    pub points_accepted: usize,
    /// Best sweep points, best first.
    pub top: Vec<SweepPoint>,
}

/// Recover the rendering profile of `page` from its visible words.
pub fn calibrate(
    page: &PageRaster,
    observations: &[ReferenceObservation],
    library: &FontLibrary,
    metrics: &dyn GlyphMetrics,
    config: &CalibrationConfig,
) -> Result<CalibrationProfile, CalibrationError> {
    calibrate_detailed(page, observations, library, metrics, config).map(|r| r.profile)
}

/// [`calibrate`], also returning sweep diagnostics.
pub fn calibrate_detailed(
    page: &PageRaster,
    observations: &[ReferenceObservation],
    library: &FontLibrary,
    metrics: &dyn GlyphMetrics,
    config: &CalibrationConfig,
) -> Result<CalibrationReport, CalibrationError> {
    if library.is_empty() {
        return Err(CalibrationError::EmptyFontLibrary);
    }
    let min_samples = config.min_samples.max(1);
    let refs = usable_references(page, observations, &config.references);
    if refs.len() < min_samples {
        tracing::warn!(
            "Calibration: only {}/{} reference words usable, need {}",
            refs.len(),
            observations.len(),
            min_samples
        );
        return Err(CalibrationError::InsufficientReferences {
            needed: min_samples,
            got: refs.len(),
        });
    }

    let offsets = tracking_offsets(
        config.tracking_min_px,
        config.tracking_max_px,
        config.tracking_step_px,
    )?;
    let modes = config.modes();
    let outcome = search::sweep(&refs, library, &offsets, &modes, metrics, min_samples);

    let best = outcome
        .points
        .first()
        .ok_or(CalibrationError::NoMeasurableReferences {
            needed: min_samples,
        })?;
    if best.coefficient_of_variation > config.max_variation {
        tracing::warn!(
            "Calibration: best hypothesis {} has CV {:.2}% > {:.2}%",
            best.font.label(),
            best.coefficient_of_variation * 100.0,
            config.max_variation * 100.0
        );
        return Err(CalibrationError::Inconsistent {
            best_variation: best.coefficient_of_variation,
            max_allowed: config.max_variation,
        });
    }

    let profile = CalibrationProfile::from_point(best, page.ppi());
    tracing::info!(
        "Calibrated {} tracking {:+.2}px {:?}: scale {:.4}, CV {:.2}% over {} words ({} tuples)",
        profile.font.label(),
        profile.tracking_offset_px,
        profile.kerning_mode,
        profile.scale_factor,
        profile.coefficient_of_variation * 100.0,
        profile.sample_count,
        outcome.tuples_evaluated
    );

    let points_accepted = outcome.points.len();
    Ok(CalibrationReport {
        profile,
        usable_references: refs.len(),
        tuples_evaluated: outcome.tuples_evaluated,
        points_accepted,
        top: outcome
            .points
            .into_iter()
            .take(config.report_top_n)
            .collect(),
    })
}
