//! Reference observations and the filter that decides which of them are
//! trustworthy enough to calibrate against.

use crate::raster::PageRaster;

/// A visible word with its OCR bounding box on the working raster.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ReferenceObservation {
    pub text: String,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// OCR confidence on a 0..=100 scale.
    #[serde(alias = "conf", alias = "confidence")]
    pub ocr_confidence: f32,
}

impl ReferenceObservation {
    pub fn new(
        text: impl Into<String>,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        ocr_confidence: f32,
    ) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            width,
            height,
            ocr_confidence,
        }
    }

    /// Trimmed text used for measurement.
    pub fn measured_text(&self) -> &str {
        self.text.trim()
    }
}

/// Why a reference observation was not used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Rejection {
    LowConfidence,
    Length,
    Narrow,
    NotAlphabetic,
    OffPage,
}

/// Filter thresholds for reference words.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ReferenceFilterConfig {
    /// Minimum OCR confidence (0..=100).
    pub min_ocr_confidence: f32,
    /// Minimum trimmed length in characters.
    pub min_text_len: usize,
    /// Maximum trimmed length in characters.
    pub max_text_len: usize,
    /// Minimum box width in working pixels.
    pub min_width_px: u32,
    /// Require every character to be alphabetic.
    pub alphabetic_only: bool,
}

impl Default for ReferenceFilterConfig {
    fn default() -> Self {
        Self {
            min_ocr_confidence: 85.0,
            min_text_len: 4,
            max_text_len: 20,
            min_width_px: 30,
            alphabetic_only: false,
        }
    }
}

pub(crate) fn check(
    obs: &ReferenceObservation,
    page: &PageRaster,
    config: &ReferenceFilterConfig,
) -> Result<(), Rejection> {
    if !(obs.ocr_confidence >= config.min_ocr_confidence) {
        return Err(Rejection::LowConfidence);
    }
    let text = obs.measured_text();
    let len = text.chars().count();
    if len < config.min_text_len || len > config.max_text_len {
        return Err(Rejection::Length);
    }
    if obs.width < config.min_width_px {
        return Err(Rejection::Narrow);
    }
    if config.alphabetic_only && !text.chars().all(char::is_alphabetic) {
        return Err(Rejection::NotAlphabetic);
    }
    if !page.contains_rect(obs.x, obs.y, obs.width, obs.height) {
        return Err(Rejection::OffPage);
    }
    Ok(())
}

/// Keep the observations that pass every filter, in input order.
pub fn usable_references<'a>(
    page: &PageRaster,
    observations: &'a [ReferenceObservation],
    config: &ReferenceFilterConfig,
) -> Vec<&'a ReferenceObservation> {
    let mut kept = Vec::with_capacity(observations.len());
    let mut rejected = [0usize; 5];
    for obs in observations {
        match check(obs, page, config) {
            Ok(()) => kept.push(obs),
            Err(reason) => rejected[reason as usize] += 1,
        }
    }
    tracing::debug!(
        "reference filter: kept {}/{} (conf {}, length {}, width {}, alpha {}, off-page {})",
        kept.len(),
        observations.len(),
        rejected[Rejection::LowConfidence as usize],
        rejected[Rejection::Length as usize],
        rejected[Rejection::Narrow as usize],
        rejected[Rejection::NotAlphabetic as usize],
        rejected[Rejection::OffPage as usize]
    );
    kept
}
