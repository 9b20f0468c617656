//! Artifact scoring: does the halo around a box look like the halo a given
//! candidate would leave?
//!
//! Observed per-side edge counts from the page are compared with the counts
//! the candidate's template predicts. Each side scores
//! `max(0, 1 - |observed - expected| / expected)`; sides are combined with
//! fixed weights (top and bottom carry ascender/descender evidence and weigh
//! more). Sides where the template expects no edges carry no information and
//! are left out, with the remaining weights renormalized.

mod template;

pub use template::{build_template, render_template_canvas, TemplateEdges};

use crate::halo::{EdgeConfig, HaloData, RegionEdges, Side};

/// Per-side weights of the artifact score.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RegionWeights {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

impl Default for RegionWeights {
    fn default() -> Self {
        Self {
            top: 0.3,
            bottom: 0.3,
            left: 0.2,
            right: 0.2,
        }
    }
}

impl RegionWeights {
    pub fn get(&self, side: Side) -> f64 {
        match side {
            Side::Top => self.top,
            Side::Bottom => self.bottom,
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }
}

/// Configuration for artifact scoring.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    pub weights: RegionWeights,
    pub edges: EdgeConfig,
}

/// Score contribution of one side.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RegionScore {
    pub side: Side,
    pub observed: usize,
    pub expected: usize,
    /// `None` when the side was excluded (no expected edges).
    pub quality: Option<f64>,
    pub weight: f64,
}

/// Artifact evidence for one (box, candidate) pair.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ArtifactScore {
    /// Weighted quality in [0, 1].
    pub score: f64,
    /// Sides that contributed.
    pub regions_used: usize,
    pub regions: Vec<RegionScore>,
}

fn region_quality(observed: usize, expected: usize) -> f64 {
    let e = expected as f64;
    (1.0 - (observed as f64 - e).abs() / e).max(0.0)
}

/// Compare observed and expected edge counts.
pub fn score_counts(
    observed: &RegionEdges,
    expected: &TemplateEdges,
    weights: &RegionWeights,
) -> ArtifactScore {
    let mut regions = Vec::with_capacity(4);
    let mut weighted = 0.0;
    let mut total_weight = 0.0;
    let mut used = 0;
    for side in Side::ALL {
        let (obs, exp) = (observed.get(side), expected.get(side));
        let weight = weights.get(side).max(0.0);
        let quality = (exp > 0).then(|| region_quality(obs, exp));
        if let Some(q) = quality {
            weighted += q * weight;
            total_weight += weight;
            used += 1;
        }
        regions.push(RegionScore {
            side,
            observed: obs,
            expected: exp,
            quality,
            weight,
        });
    }
    let score = if total_weight > 0.0 {
        (weighted / total_weight).clamp(0.0, 1.0)
    } else {
        0.0
    };
    ArtifactScore {
        score,
        regions_used: if total_weight > 0.0 { used } else { 0 },
        regions,
    }
}

/// Score a box's halo against a candidate template.
pub fn score(halo: &HaloData, template: &TemplateEdges, config: &ArtifactConfig) -> ArtifactScore {
    score_counts(&halo.edge_counts(&config.edges), template, &config.weights)
}
