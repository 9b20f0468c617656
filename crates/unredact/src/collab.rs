//! Collaborator interfaces consumed by the engine, and the font vocabulary
//! shared between them.
//!
//! The engine never touches files, fonts or OCR directly. Rasterization,
//! word detection, glyph measurement and candidate loading are supplied by
//! the caller through these traits. The measurement and rendering traits are
//! `Sync` because the calibration sweep and per-unit matching fan out over
//! the `rayon` pool.

use std::path::Path;

use image::GrayImage;

use crate::calibrate::ReferenceObservation;
use crate::error::EngineError;
use crate::matching::Candidate;
use crate::raster::PageRaster;

/// Point sizes swept when no explicit list is given.
pub const DEFAULT_SIZES_PT: [f32; 7] = [10.0, 11.0, 12.0, 12.4, 12.5, 13.0, 14.0];

/// A font family at a point size. Opaque beyond what [`GlyphMetrics`] does
/// with it.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FontDescriptor {
    pub family_id: String,
    pub point_size: f32,
}

impl FontDescriptor {
    pub fn new(family_id: impl Into<String>, point_size: f32) -> Self {
        Self {
            family_id: family_id.into(),
            point_size,
        }
    }

    /// Short human-readable label, e.g. `times@12.5pt`.
    pub fn label(&self) -> String {
        format!("{}@{}pt", self.family_id, self.point_size)
    }
}

/// How inter-glyph spacing is derived when measuring a string.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum KerningMode {
    /// Apply the font's pair-kerning table.
    Metric,
    /// Advance widths only.
    Standard,
}

impl KerningMode {
    pub const ALL: [KerningMode; 2] = [KerningMode::Metric, KerningMode::Standard];
}

/// Ordered set of font descriptors swept during calibration.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FontLibrary {
    descriptors: Vec<FontDescriptor>,
}

impl FontLibrary {
    pub fn new(descriptors: Vec<FontDescriptor>) -> Self {
        Self { descriptors }
    }

    /// Cross product of `families` and `sizes`, family-major.
    ///
    /// Non-finite or non-positive sizes are skipped.
    pub fn from_families<I, S>(families: I, sizes: &[f32]) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut descriptors = Vec::new();
        for family in families {
            let family = family.into();
            for &size in sizes {
                if size.is_finite() && size > 0.0 {
                    descriptors.push(FontDescriptor::new(family.clone(), size));
                }
            }
        }
        Self { descriptors }
    }

    pub fn descriptors(&self) -> &[FontDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Renders one page of a document to a raster.
pub trait Rasterizer {
    fn render(&self, document: &Path, dpi: f32, page_index: usize)
        -> Result<PageRaster, EngineError>;
}

/// Locates words (and their bounding boxes) on a rendered page.
pub trait OcrEngine {
    fn detect_words(&self, page: &PageRaster) -> Result<Vec<ReferenceObservation>, EngineError>;
}

/// Measures rendered string widths.
///
/// Widths are in "unit scale" pixels: the calibration profile's scale factor
/// maps them onto the working raster. An empty string measures 0; a string
/// the font cannot shape should also measure 0 rather than fail.
pub trait GlyphMetrics: Sync {
    fn measure_width(&self, text: &str, font: &FontDescriptor, kerning: KerningMode) -> f64;
}

/// Renders a string as dark ink on a white background at unit scale.
///
/// Used to build the expected-edge template for artifact scoring. Returning
/// `None` means no template can be produced for this string.
pub trait GlyphRenderer: Sync {
    fn render_text(&self, text: &str, font: &FontDescriptor, kerning: KerningMode)
        -> Option<GrayImage>;
}

/// Supplies the candidate roster.
pub trait CandidateSource {
    fn candidates(&self) -> Result<Vec<Candidate>, EngineError>;
}

impl CandidateSource for [Candidate] {
    fn candidates(&self) -> Result<Vec<Candidate>, EngineError> {
        Ok(self.to_vec())
    }
}

impl CandidateSource for Vec<Candidate> {
    fn candidates(&self) -> Result<Vec<Candidate>, EngineError> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_is_family_major_cross_product() {
        let lib = FontLibrary::from_families(["serif", "sans"], &[10.0, 12.5]);
        let labels: Vec<String> = lib.descriptors().iter().map(|d| d.label()).collect();
        assert_eq!(
            labels,
            vec!["serif@10pt", "serif@12.5pt", "sans@10pt", "sans@12.5pt"]
        );
    }

    #[test]
    fn library_skips_invalid_sizes() {
        let lib = FontLibrary::from_families(["serif"], &[0.0, -1.0, f32::NAN, 11.0]);
        assert_eq!(lib.len(), 1);
        assert_eq!(lib.descriptors()[0].point_size, 11.0);
    }

    #[test]
    fn candidate_vec_is_a_source() {
        let roster = vec![Candidate::new("Jane Doe", 7.0)];
        let got = roster.candidates().expect("in-memory roster");
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].text, "Jane Doe");
    }
}
