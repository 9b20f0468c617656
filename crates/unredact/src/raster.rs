//! Page rasters at a known resolution.

use image::{DynamicImage, GrayImage};

const FALLBACK_PPI: f32 = 72.0;

/// Immutable grayscale page raster at a known resolution.
///
/// The working raster (box detection, width matching) and the high-resolution
/// raster (halo extraction) are two `PageRaster`s of the same physical page;
/// [`PageRaster::scale_to`] maps pixel coordinates between them.
#[derive(Debug, Clone)]
pub struct PageRaster {
    image: GrayImage,
    ppi: f32,
}

impl PageRaster {
    /// Wrap a grayscale image rendered at `ppi` pixels per inch.
    ///
    /// A non-finite or non-positive `ppi` is replaced by 72 with a warning.
    pub fn new(image: GrayImage, ppi: f32) -> Self {
        let ppi = if ppi.is_finite() && ppi > 0.0 {
            ppi
        } else {
            tracing::warn!(
                "invalid raster resolution {}, assuming {} ppi",
                ppi,
                FALLBACK_PPI
            );
            FALLBACK_PPI
        };
        Self { image, ppi }
    }

    /// Build from a colour (or any) raster by converting to luma.
    pub fn from_dynamic(image: &DynamicImage, ppi: f32) -> Self {
        Self::new(image.to_luma8(), ppi)
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    /// Resolution in pixels per inch.
    pub fn ppi(&self) -> f32 {
        self.ppi
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Factor mapping this raster's pixel coordinates onto a raster of the
    /// same page rendered at `ppi`.
    pub fn scale_to(&self, ppi: f32) -> f64 {
        ppi as f64 / self.ppi as f64
    }

    /// `true` when the rectangle lies entirely inside the raster.
    pub fn contains_rect(&self, x: u32, y: u32, width: u32, height: u32) -> bool {
        let (w, h) = self.dimensions();
        x.checked_add(width).is_some_and(|r| r <= w)
            && y.checked_add(height).is_some_and(|b| b <= h)
    }
}
