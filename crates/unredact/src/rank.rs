//! Fusion of width error, artifact evidence and declared confidence into a
//! single total order.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::matching::MatchResult;

/// Configuration for match ranking.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RankConfig {
    /// Points of width error (percent) one full artifact score is worth.
    pub artifact_weight: f64,
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            artifact_weight: 2.0,
        }
    }
}

/// Artifact scores keyed by (box index, candidate variant text).
#[derive(Debug, Clone, Default)]
pub struct ArtifactScores {
    scores: HashMap<(usize, String), f64>,
}

impl ArtifactScores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, box_index: usize, candidate_text: impl Into<String>, score: f64) {
        let score = if score.is_finite() {
            score.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let key = (box_index, candidate_text.into());
        self.scores.insert(key, score);
    }

    /// Score for a result, 0 when absent.
    pub fn get(&self, box_index: usize, candidate_text: &str) -> f64 {
        self.scores
            .get(&(box_index, candidate_text.to_string()))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// Ranking key: lower is better.
///
/// `width_error_pct - declared_confidence / 10 - artifact_score * artifact_weight`
pub fn combined_score(
    width_error_pct: f64,
    declared_confidence: f64,
    artifact_score: f64,
    artifact_weight: f64,
) -> f64 {
    width_error_pct - declared_confidence / 10.0 - artifact_score * artifact_weight
}

/// Total order over ranked results, best first.
///
/// Combined score, then higher declared confidence, then candidate text,
/// then box reading order, then variant order.
pub fn compare_ranked(a: &MatchResult, b: &MatchResult) -> Ordering {
    a.combined_score
        .total_cmp(&b.combined_score)
        .then_with(|| b.declared_confidence.total_cmp(&a.declared_confidence))
        .then_with(|| a.candidate_text.cmp(&b.candidate_text))
        .then_with(|| a.redaction_box.reading_order(&b.redaction_box))
        .then_with(|| a.box_index.cmp(&b.box_index))
        .then_with(|| a.variant.cmp(&b.variant))
        .then_with(|| a.base_text.cmp(&b.base_text))
        .then_with(|| a.width_error_pct.total_cmp(&b.width_error_pct))
}

/// Re-score `results` with artifact evidence and sort them best first.
///
/// Returns new values; no result is dropped.
pub fn rank(
    results: &[MatchResult],
    artifacts: &ArtifactScores,
    config: &RankConfig,
) -> Vec<MatchResult> {
    let mut ranked: Vec<MatchResult> = results
        .iter()
        .map(|r| {
            let artifact_score = artifacts.get(r.box_index, &r.candidate_text);
            MatchResult {
                artifact_score,
                combined_score: combined_score(
                    r.width_error_pct,
                    r.declared_confidence,
                    artifact_score,
                    config.artifact_weight,
                ),
                ..r.clone()
            }
        })
        .collect();
    ranked.sort_by(compare_ranked);
    ranked
}

/// Rank on width and declared confidence only.
pub fn rank_matches(results: &[MatchResult], config: &RankConfig) -> Vec<MatchResult> {
    rank(results, &ArtifactScores::default(), config)
}

/// First result per box, in box order. Expects ranked input.
pub fn best_per_box(ranked: &[MatchResult]) -> Vec<&MatchResult> {
    let mut best: Vec<&MatchResult> = Vec::new();
    for r in ranked {
        if !best.iter().any(|b| b.box_index == r.box_index) {
            best.push(r);
        }
    }
    best.sort_by_key(|r| r.box_index);
    best
}

/// Coarse quality label derived from the width error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRating {
    Excellent,
    Strong,
    Fair,
    Weak,
}

impl MatchRating {
    pub fn from_error_pct(pct: f64) -> Self {
        if pct <= 1.0 {
            MatchRating::Excellent
        } else if pct <= 5.0 {
            MatchRating::Strong
        } else if pct <= 10.0 {
            MatchRating::Fair
        } else {
            MatchRating::Weak
        }
    }

    pub fn stars(self) -> &'static str {
        match self {
            MatchRating::Excellent => "***",
            MatchRating::Strong => "**",
            MatchRating::Fair => "*",
            MatchRating::Weak => "",
        }
    }
}
