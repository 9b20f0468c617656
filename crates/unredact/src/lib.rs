//! unredact: forensic matching of candidate texts against black-box redactions.
//!
//! Given a rasterized page, the engine answers "which of these candidate
//! names could plausibly sit under each redaction box?". The stages are:
//!
//! 1. **Detect** – find solid dark rectangles on the working raster.
//! 2. **Calibrate** – sweep font × size × tracking × kerning against visible
//!    OCR words and keep the most self-consistent pixel scale.
//! 3. **Width match** – predict each candidate's rendered width (with case
//!    and name-order variants) and keep those within tolerance of the box.
//! 4. **Halo** – on a high-resolution raster, cut the thin band around each
//!    box where ascenders, descenders and anti-aliasing leak out.
//! 5. **Artifacts** – compare observed halo edges with a rendered template
//!    of each candidate.
//! 6. **Rank** – order matches by width error, declared confidence and
//!    artifact evidence.
//!
//! # Public API
//! [`Analyzer`] runs the whole pipeline over an [`AnalysisInput`]. Font
//! metrics, rendering, rasterization, OCR and candidate rosters are supplied
//! by the caller through the traits in [`collab`]. Each stage is also usable
//! on its own through its module.

pub mod analyzer;
pub mod artifact;
pub mod calibrate;
pub mod collab;
mod config;
pub mod detect;
mod error;
pub mod halo;
pub mod matching;
pub mod rank;
mod raster;

#[cfg(test)]
pub(crate) mod test_utils;

pub use analyzer::{
    AnalysisInput, AnalysisReport, AnalysisStatus, Analyzer, ArtifactRecord, CalibrationSummary,
    Collaborators, MatchSummary,
};
pub use artifact::{ArtifactConfig, ArtifactScore, RegionWeights};
pub use calibrate::{
    calibrate, calibrate_detailed, CalibrationConfig, CalibrationProfile, CalibrationReport,
    ReferenceObservation,
};
pub use collab::{
    CandidateSource, FontDescriptor, FontLibrary, GlyphMetrics, GlyphRenderer, KerningMode,
    OcrEngine, Rasterizer,
};
pub use config::EngineConfig;
pub use detect::{detect, detect_boxes, BoxDetectConfig, RedactionBox};
pub use error::{CalibrationError, EngineError, EngineResult};
pub use halo::{extract_halo, EdgeConfig, EnhanceConfig, HaloConfig, HaloData, Side};
pub use matching::{
    find_matches, predict_width, Candidate, MatchBatch, MatchResult, TextVariant,
    WidthMatchConfig,
};
pub use rank::{best_per_box, rank, rank_matches, MatchRating, RankConfig};
pub use raster::PageRaster;
