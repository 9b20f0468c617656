//! Batch matching over every (box, candidate, variant) unit.

use std::collections::{BTreeMap, HashSet};

use rayon::prelude::*;

use super::{
    match_box, text_variants, Candidate, MatchResult, MatchUnit, TextVariant, UnitFailure,
    UnitFailureKind, WidthMatchConfig,
};
use crate::calibrate::CalibrationProfile;
use crate::collab::GlyphMetrics;
use crate::detect::RedactionBox;

/// Output of [`find_matches`].
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MatchBatch {
    /// At most one result per (box, candidate): the best-fitting variant.
    /// Ordered by box index, then candidate order.
    pub results: Vec<MatchResult>,
    pub failures: Vec<UnitFailure>,
    pub units_evaluated: usize,
    /// Units inside tolerance before the per-candidate variant reduction.
    pub units_within_tolerance: usize,
}

struct Expanded<'a> {
    candidate_index: usize,
    candidate: &'a Candidate,
    variant: TextVariant,
    text: String,
}

fn better(new: &MatchResult, old: &MatchResult) -> bool {
    match new.width_error_pct.total_cmp(&old.width_error_pct) {
        std::cmp::Ordering::Less => true,
        std::cmp::Ordering::Equal => new.variant < old.variant,
        std::cmp::Ordering::Greater => false,
    }
}

/// Match every candidate (and its variants) against every box.
///
/// Units are evaluated in parallel and independently: a degenerate
/// candidate is recorded as a failure and never affects other units.
pub fn find_matches(
    profile: &CalibrationProfile,
    metrics: &dyn GlyphMetrics,
    boxes: &[RedactionBox],
    candidates: &[Candidate],
    config: &WidthMatchConfig,
) -> MatchBatch {
    for c in candidates.iter().filter(|c| !c.confidence_in_range()) {
        tracing::warn!(
            "candidate '{}': declared confidence {} clamped to {}",
            c.text,
            c.declared_confidence,
            c.confidence()
        );
    }

    let expanded: Vec<Expanded<'_>> = candidates
        .iter()
        .enumerate()
        .flat_map(|(candidate_index, candidate)| {
            text_variants(&candidate.text, &config.variants)
                .into_iter()
                .map(move |(variant, text)| Expanded {
                    candidate_index,
                    candidate,
                    variant,
                    text,
                })
        })
        .collect();

    let units: Vec<(usize, usize)> = (0..boxes.len())
        .flat_map(|b| (0..expanded.len()).map(move |e| (b, e)))
        .collect();

    let outcomes: Vec<(usize, usize, Result<Option<MatchResult>, UnitFailureKind>)> = units
        .par_iter()
        .map(|&(b, e)| {
            let exp = &expanded[e];
            let unit = MatchUnit {
                box_index: b,
                redaction_box: &boxes[b],
                candidate: exp.candidate,
                variant: exp.variant,
                text: &exp.text,
            };
            (b, e, match_box(profile, metrics, &unit, config))
        })
        .collect();

    let mut best: BTreeMap<(usize, usize), MatchResult> = BTreeMap::new();
    let mut failures = Vec::new();
    let mut seen_failures: HashSet<(usize, usize, UnitFailureKind)> = HashSet::new();
    let mut warned: HashSet<usize> = HashSet::new();
    let mut within = 0usize;

    for (b, e, outcome) in outcomes {
        let exp = &expanded[e];
        match outcome {
            Ok(Some(result)) => {
                within += 1;
                tracing::debug!(
                    "box {}: '{}' predicted {:.1}px vs {}px ({:.2}%)",
                    b,
                    result.candidate_text,
                    result.predicted_width_px,
                    result.redaction_box.width,
                    result.width_error_pct
                );
                let key = (b, exp.candidate_index);
                match best.get(&key) {
                    Some(old) if !better(&result, old) => {}
                    _ => {
                        best.insert(key, result);
                    }
                }
            }
            Ok(None) => {}
            Err(kind) => {
                if !seen_failures.insert((b, exp.candidate_index, kind)) {
                    continue;
                }
                if warned.insert(exp.candidate_index) {
                    tracing::warn!("skipping candidate '{}': {}", exp.text, kind);
                }
                failures.push(UnitFailure {
                    box_index: b,
                    candidate_text: exp.text.clone(),
                    kind,
                });
            }
        }
    }

    let results: Vec<MatchResult> = best.into_values().collect();
    tracing::info!(
        "Width matching: {} boxes x {} strings = {} units, {} in tolerance, {} kept, {} failed",
        boxes.len(),
        expanded.len(),
        units.len(),
        within,
        results.len(),
        failures.len()
    );
    MatchBatch {
        results,
        failures,
        units_evaluated: units.len(),
        units_within_tolerance: within,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{FontDescriptor, KerningMode};
    use crate::matching::predict_width;
    use crate::test_utils::TableMetrics;

    fn profile() -> CalibrationProfile {
        CalibrationProfile {
            font: FontDescriptor::new("serif", 12.0),
            scale_factor: 4.0,
            tracking_offset_px: 0.0,
            kerning_mode: KerningMode::Metric,
            confidence: 0.98,
            reference_text: "Company".into(),
            working_ppi: 300.0,
            coefficient_of_variation: 0.02,
            sample_count: 10,
        }
    }

    fn box_for(metrics: &TableMetrics, text: &str, y: u32) -> RedactionBox {
        let w = predict_width(&profile(), metrics, text).round() as u32;
        RedactionBox::new(100, y, w, 40)
    }

    #[test]
    fn matches_each_box_with_its_fitting_candidate() {
        let metrics = TableMetrics::default();
        let boxes = vec![
            box_for(&metrics, "Nadia Marcinkova", 100),
            box_for(&metrics, "Jo", 300),
        ];
        let candidates = vec![
            Candidate::new("Nadia Marcinkova", 8.0),
            Candidate::new("Jo", 2.0),
            Candidate::new("Someone With A Much Longer Name", 9.0),
        ];
        let batch = find_matches(
            &profile(),
            &metrics,
            &boxes,
            &candidates,
            &WidthMatchConfig::default(),
        );

        assert_eq!(batch.units_evaluated, 2 * (4 + 2 + 4));
        assert!(batch.failures.is_empty());
        let first: Vec<_> = batch
            .results
            .iter()
            .filter(|r| r.box_index == 0)
            .collect();
        assert_eq!(
            first.len(),
            1,
            "only the fitting candidate survives: {first:?}"
        );
        assert_eq!(first[0].base_text, "Nadia Marcinkova");
        assert_eq!(first[0].variant, TextVariant::Original);
        assert!(first[0].width_error_pct < 0.5);
        assert!(batch
            .results
            .iter()
            .any(|r| r.box_index == 1 && r.base_text == "Jo"));
        for pair in batch.results.windows(2) {
            assert!(pair[0].box_index <= pair[1].box_index);
        }
    }

    #[test]
    fn best_variant_is_kept_per_candidate() {
        let metrics = TableMetrics::default();
        let boxes = vec![box_for(&metrics, "MARCINKOVA, NADIA", 100)];
        let cfg = WidthMatchConfig {
            tolerance_fraction: 0.5,
            ..WidthMatchConfig::default()
        };
        let batch = find_matches(
            &profile(),
            &metrics,
            &boxes,
            &[Candidate::new("Nadia Marcinkova", 5.0)],
            &cfg,
        );
        assert!(batch.units_within_tolerance >= 2);
        assert_eq!(batch.results.len(), 1);
        let r = &batch.results[0];
        assert_eq!(r.base_text, "Nadia Marcinkova");
        // No variant renders "MARCINKOVA, NADIA" exactly; the closest wins.
        let widths: Vec<f64> = text_variants("Nadia Marcinkova", &cfg.variants)
            .iter()
            .map(|(_, t)| (predict_width(&profile(), &metrics, t) - boxes[0].width as f64).abs())
            .collect();
        let min = widths.iter().cloned().fold(f64::INFINITY, f64::min);
        assert!((r.width_diff_px.abs() - min).abs() < 1e-9);
    }

    #[test]
    fn degenerate_candidate_fails_alone() {
        let metrics = TableMetrics::default();
        let boxes = vec![
            box_for(&metrics, "Jane Doe", 100),
            box_for(&metrics, "Jane Doe", 300),
        ];
        let candidates = vec![Candidate::new("   ", 5.0), Candidate::new("Jane Doe", 5.0)];
        let batch = find_matches(
            &profile(),
            &metrics,
            &boxes,
            &candidates,
            &WidthMatchConfig::default(),
        );
        assert_eq!(batch.failures.len(), 2, "one failure per box");
        assert!(batch
            .failures
            .iter()
            .all(|f| f.kind == UnitFailureKind::EmptyText));
        assert_eq!(
            batch
                .results
                .iter()
                .filter(|r| r.base_text == "Jane Doe")
                .count(),
            2
        );
    }

    #[test]
    fn out_of_range_confidence_is_clamped_in_results() {
        let metrics = TableMetrics::default();
        let boxes = vec![box_for(&metrics, "Jane Doe", 100)];
        let candidates = vec![Candidate::new("Jane Doe", 14.0)];
        assert_eq!(candidates[0].declared_confidence, 14.0);
        let batch = find_matches(
            &profile(),
            &metrics,
            &boxes,
            &candidates,
            &WidthMatchConfig::default(),
        );
        assert_eq!(batch.results.len(), 1);
        assert_eq!(batch.results[0].declared_confidence, 10.0);
    }

    #[test]
    fn no_boxes_or_candidates_is_empty() {
        let metrics = TableMetrics::default();
        let batch = find_matches(&profile(), &metrics, &[], &[], &WidthMatchConfig::default());
        assert_eq!(batch, MatchBatch::default());
    }
}
