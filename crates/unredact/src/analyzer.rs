//! End-to-end analysis of one page.
//!
//! The [`Analyzer`] runs the stages in order: detect boxes, calibrate (or
//! adopt a saved profile), width-match every candidate, optionally score halo
//! artifacts on a high-resolution raster, and rank. Calibration failure is
//! returned before any matching happens.

use std::collections::{BTreeSet, HashMap};

use rayon::prelude::*;

use crate::artifact::{build_template, score_counts, ArtifactScore};
use crate::calibrate::{calibrate_detailed, CalibrationProfile, ReferenceObservation};
use crate::collab::{FontLibrary, GlyphMetrics, GlyphRenderer};
use crate::config::EngineConfig;
use crate::detect::{detect, RedactionBox};
use crate::error::{CalibrationError, EngineError};
use crate::halo::{enhance, extract_halo, EnhancedStrip, HaloData, RegionEdges};
use crate::matching::{
    find_matches, Candidate, MatchBatch, MatchResult, UnitFailure, UnitFailureKind,
};
use crate::rank::{rank, rank_matches, ArtifactScores, MatchRating};
use crate::raster::PageRaster;

/// Resolution below which halo evidence is unreliable.
const MIN_HALO_PPI: f32 = 600.0;

/// Everything the analysis reads about one page.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisInput<'a> {
    /// Working raster: detection and width matching.
    pub page: &'a PageRaster,
    /// Same page at high resolution, for halo scoring.
    pub high_res: Option<&'a PageRaster>,
    /// OCR words used for calibration.
    pub references: &'a [ReferenceObservation],
    pub fonts: &'a FontLibrary,
    pub candidates: &'a [Candidate],
    /// Previously saved profile; skips calibration when present.
    pub profile: Option<&'a CalibrationProfile>,
}

/// Font collaborators used by the analysis.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub metrics: &'a dyn GlyphMetrics,
    /// Template source for artifact scoring; without it halos are skipped.
    pub renderer: Option<&'a dyn GlyphRenderer>,
}

/// Overall outcome of an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    /// At least one candidate fits at least one box.
    Matched,
    /// Boxes were found but no candidate fits any of them.
    NoMatches,
    NoRedactionsFound,
}

/// Calibration diagnostics, present when the profile was computed here.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CalibrationSummary {
    pub usable_references: usize,
    pub tuples_evaluated: usize,
    pub points_accepted: usize,
}

/// Artifact evidence behind one ranked match.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ArtifactRecord {
    pub box_index: usize,
    pub candidate_text: String,
    /// Box on the high-resolution raster.
    pub halo_box: RedactionBox,
    #[serde(flatten)]
    pub score: ArtifactScore,
}

/// Counts for a quick read of the report.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct MatchSummary {
    pub boxes: usize,
    pub boxes_with_matches: usize,
    pub matches: usize,
    pub excellent: usize,
    pub strong: usize,
    pub fair: usize,
    pub weak: usize,
    pub failures: usize,
}

/// Result of [`Analyzer::analyze`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AnalysisReport {
    pub status: AnalysisStatus,
    pub page_size: [u32; 2],
    pub working_ppi: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high_res_ppi: Option<f32>,
    pub boxes: Vec<RedactionBox>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<CalibrationProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calibration: Option<CalibrationSummary>,
    /// Ranked best first.
    pub matches: Vec<MatchResult>,
    pub artifacts: Vec<ArtifactRecord>,
    pub failures: Vec<UnitFailure>,
    pub units_evaluated: usize,
    pub summary: MatchSummary,
}

impl AnalysisReport {
    fn empty(input: &AnalysisInput<'_>, status: AnalysisStatus) -> Self {
        let (w, h) = input.page.dimensions();
        Self {
            status,
            page_size: [w, h],
            working_ppi: input.page.ppi(),
            high_res_ppi: input.high_res.map(|p| p.ppi()),
            boxes: Vec::new(),
            profile: input.profile.cloned(),
            calibration: None,
            matches: Vec::new(),
            artifacts: Vec::new(),
            failures: Vec::new(),
            units_evaluated: 0,
            summary: MatchSummary::default(),
        }
    }

    /// Ranked matches for one box.
    pub fn matches_for_box(&self, box_index: usize) -> impl Iterator<Item = &MatchResult> {
        self.matches
            .iter()
            .filter(move |m| m.box_index == box_index)
    }
}

/// High-level analysis entry point.
///
/// # Example
///
/// ```no_run
/// use unredact::{Analyzer, EngineConfig};
///
/// let analyzer = Analyzer::new(EngineConfig::default());
/// assert_eq!(analyzer.config().width.tolerance_floor_px, 3.0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    config: EngineConfig,
}

impl Analyzer {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut EngineConfig {
        &mut self.config
    }

    /// Redaction boxes on the working raster, in reading order.
    pub fn detect(&self, page: &PageRaster) -> Vec<RedactionBox> {
        detect(page, &self.config.detect)
    }

    /// Calibrate against the visible words of `page`.
    pub fn calibrate(
        &self,
        page: &PageRaster,
        references: &[ReferenceObservation],
        fonts: &FontLibrary,
        metrics: &dyn GlyphMetrics,
    ) -> Result<CalibrationProfile, CalibrationError> {
        calibrate_detailed(page, references, fonts, metrics, &self.config.calibration)
            .map(|r| r.profile)
    }

    pub fn find_matches(
        &self,
        profile: &CalibrationProfile,
        metrics: &dyn GlyphMetrics,
        boxes: &[RedactionBox],
        candidates: &[Candidate],
    ) -> MatchBatch {
        find_matches(profile, metrics, boxes, candidates, &self.config.width)
    }

    pub fn rank_matches(&self, results: &[MatchResult]) -> Vec<MatchResult> {
        rank_matches(results, &self.config.rank)
    }

    /// Halo of a high-resolution box with every enhancement lens.
    pub fn inspect_halo(
        &self,
        high_res: &PageRaster,
        halo_box: &RedactionBox,
    ) -> (HaloData, Vec<EnhancedStrip>) {
        let halo = extract_halo(
            high_res,
            halo_box,
            self.config.halo.thickness_px,
            self.config.halo.corner_radius_px,
        );
        let lenses = halo
            .strips()
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| enhance(s, &self.config.halo.enhance, &self.config.artifact.edges))
            .collect();
        (halo, lenses)
    }

    /// Run the whole pipeline on one page.
    pub fn analyze(
        &self,
        input: &AnalysisInput<'_>,
        collab: &Collaborators<'_>,
    ) -> Result<AnalysisReport, EngineError> {
        self.config.validate()?;

        let boxes = self.detect(input.page);
        if boxes.is_empty() {
            tracing::info!("No redactions found, nothing to match");
            return Ok(AnalysisReport::empty(input, AnalysisStatus::NoRedactionsFound));
        }

        let (profile, calibration) = match input.profile {
            Some(saved) => {
                saved.check()?;
                let profile = saved.at_ppi(input.page.ppi());
                tracing::info!(
                    "Using saved profile {} (scale {:.4} at {} ppi)",
                    profile.font.label(),
                    profile.scale_factor,
                    profile.working_ppi
                );
                (profile, None)
            }
            None => {
                let report = calibrate_detailed(
                    input.page,
                    input.references,
                    input.fonts,
                    collab.metrics,
                    &self.config.calibration,
                )?;
                let summary = CalibrationSummary {
                    usable_references: report.usable_references,
                    tuples_evaluated: report.tuples_evaluated,
                    points_accepted: report.points_accepted,
                };
                (report.profile, Some(summary))
            }
        };

        let batch = self.find_matches(&profile, collab.metrics, &boxes, input.candidates);
        let mut failures = batch.failures;

        let mut artifacts = Vec::new();
        let mut scores = ArtifactScores::new();
        if let (Some(high_res), Some(renderer)) = (input.high_res, collab.renderer) {
            if !batch.results.is_empty() {
                let (records, template_failures) = self.score_artifacts(
                    input.page,
                    high_res,
                    &profile,
                    &boxes,
                    &batch.results,
                    collab.metrics,
                    renderer,
                );
                for r in &records {
                    scores.insert(r.box_index, r.candidate_text.clone(), r.score.score);
                }
                artifacts = records;
                failures.extend(template_failures);
            }
        } else if input.high_res.is_some() {
            tracing::info!("No glyph renderer supplied, skipping halo scoring");
        }

        let matches = rank(&batch.results, &scores, &self.config.rank);
        let summary = summarize(&boxes, &matches, failures.len());
        let status = if matches.is_empty() {
            AnalysisStatus::NoMatches
        } else {
            AnalysisStatus::Matched
        };
        tracing::info!(
            "Analysis: {} boxes, {} matches on {} boxes ({} excellent, {} strong), {} failures",
            summary.boxes,
            summary.matches,
            summary.boxes_with_matches,
            summary.excellent,
            summary.strong,
            summary.failures
        );

        let (w, h) = input.page.dimensions();
        Ok(AnalysisReport {
            status,
            page_size: [w, h],
            working_ppi: input.page.ppi(),
            high_res_ppi: input.high_res.map(|p| p.ppi()),
            boxes,
            profile: Some(profile),
            calibration,
            matches,
            artifacts,
            failures,
            units_evaluated: batch.units_evaluated,
            summary,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn score_artifacts(
        &self,
        page: &PageRaster,
        high_res: &PageRaster,
        profile: &CalibrationProfile,
        boxes: &[RedactionBox],
        results: &[MatchResult],
        metrics: &dyn GlyphMetrics,
        renderer: &dyn GlyphRenderer,
    ) -> (Vec<ArtifactRecord>, Vec<UnitFailure>) {
        if high_res.ppi() < MIN_HALO_PPI {
            tracing::warn!(
                "High-resolution raster is {} ppi, halo evidence is weak below {}",
                high_res.ppi(),
                MIN_HALO_PPI
            );
        }
        let hires_scale = page.scale_to(high_res.ppi());
        let halo_cfg = &self.config.halo;
        let edges = &self.config.artifact.edges;

        // One halo per box that has at least one width match.
        let box_indices: Vec<usize> = results
            .iter()
            .map(|r| r.box_index)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let halos: HashMap<usize, (HaloData, RegionEdges)> = box_indices
            .par_iter()
            .map(|&bi| {
                let hb = boxes[bi].rescale(page.ppi(), high_res.ppi());
                let halo = extract_halo(
                    high_res,
                    &hb,
                    halo_cfg.thickness_px,
                    halo_cfg.corner_radius_px,
                );
                let observed = halo.edge_counts(edges);
                (bi, (halo, observed))
            })
            .collect();

        let outcomes: Vec<Result<ArtifactRecord, UnitFailure>> = results
            .par_iter()
            .filter_map(|r| {
                let (halo, observed) = halos.get(&r.box_index)?;
                let outcome = match build_template(
                    renderer,
                    metrics,
                    profile,
                    halo,
                    &r.candidate_text,
                    hires_scale,
                    edges,
                ) {
                    Some(template) => Ok(ArtifactRecord {
                        box_index: r.box_index,
                        candidate_text: r.candidate_text.clone(),
                        halo_box: halo.redaction_box,
                        score: score_counts(observed, &template, &self.config.artifact.weights),
                    }),
                    None => Err(UnitFailure {
                        box_index: r.box_index,
                        candidate_text: r.candidate_text.clone(),
                        kind: UnitFailureKind::TemplateUnavailable,
                    }),
                };
                Some(outcome)
            })
            .collect();

        let mut records = Vec::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(rec) => {
                    tracing::debug!(
                        "box {}: '{}' artifact score {:.3} over {} regions",
                        rec.box_index,
                        rec.candidate_text,
                        rec.score.score,
                        rec.score.regions_used
                    );
                    records.push(rec);
                }
                Err(f) => {
                    tracing::warn!(
                        "box {}: no template for '{}', artifact score left at 0",
                        f.box_index,
                        f.candidate_text
                    );
                    failures.push(f);
                }
            }
        }
        tracing::info!(
            "Halo scoring: {} boxes, {} templates, {} unavailable",
            halos.len(),
            records.len(),
            failures.len()
        );
        (records, failures)
    }
}

fn summarize(boxes: &[RedactionBox], matches: &[MatchResult], failures: usize) -> MatchSummary {
    let mut s = MatchSummary {
        boxes: boxes.len(),
        matches: matches.len(),
        failures,
        ..MatchSummary::default()
    };
    s.boxes_with_matches = matches
        .iter()
        .map(|m| m.box_index)
        .collect::<BTreeSet<_>>()
        .len();
    for m in matches {
        match MatchRating::from_error_pct(m.width_error_pct) {
            MatchRating::Excellent => s.excellent += 1,
            MatchRating::Strong => s.strong += 1,
            MatchRating::Fair => s.fair += 1,
            MatchRating::Weak => s.weak += 1,
        }
    }
    s
}
