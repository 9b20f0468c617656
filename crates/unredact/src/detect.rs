//! Redaction box detection.
//!
//! Redaction fill is near-black; paper, scan noise and most text antialiasing
//! are not. The page is binarized at a fixed intensity threshold, foreground
//! pixels are grouped into 8-connected components, and each component's
//! bounding rectangle is gated by size and aspect ratio. The detector knows
//! nothing about text: a long black rule that passes the gates is reported.

use std::cmp::Ordering;

use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};

use crate::raster::PageRaster;

/// Configuration for redaction box detection.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BoxDetectConfig {
    /// Pixels at or below this intensity are redaction fill.
    pub dark_threshold: u8,
    /// Boxes must be strictly wider than this (pixels).
    pub min_width_px: u32,
    /// Boxes must be strictly taller than this (pixels).
    pub min_height_px: u32,
    /// Boxes must have `width / height` strictly above this.
    pub min_aspect_ratio: f64,
    /// Optional upper width bound (inclusive), e.g. to reject page borders.
    #[serde(default)]
    pub max_width_px: Option<u32>,
    /// Optional upper height bound (inclusive).
    #[serde(default)]
    pub max_height_px: Option<u32>,
    /// Drop boxes lying entirely inside another accepted box.
    pub drop_nested: bool,
}

impl Default for BoxDetectConfig {
    fn default() -> Self {
        Self {
            dark_threshold: 15,
            min_width_px: 30,
            min_height_px: 10,
            min_aspect_ratio: 1.5,
            max_width_px: None,
            max_height_px: None,
            drop_nested: true,
        }
    }
}

/// Axis-aligned redaction rectangle in pixel coordinates of one raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct RedactionBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl RedactionBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return f64::INFINITY;
        }
        self.width as f64 / self.height as f64
    }

    /// `true` when `other` lies entirely inside `self` (shared edges allowed).
    pub fn contains(&self, other: &RedactionBox) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Map the box onto a raster of the same page at another resolution.
    ///
    /// Origin is rounded, extent is rounded but kept at least one pixel.
    pub fn rescale(&self, from_ppi: f32, to_ppi: f32) -> RedactionBox {
        let k = to_ppi as f64 / from_ppi as f64;
        if !k.is_finite() || k <= 0.0 {
            return *self;
        }
        let scale = |v: u32| (v as f64 * k).round().min(u32::MAX as f64) as u32;
        RedactionBox {
            x: scale(self.x),
            y: scale(self.y),
            width: scale(self.width).max(1),
            height: scale(self.height).max(1),
        }
    }

    /// Top-to-bottom, then left-to-right. Extent breaks remaining ties so the
    /// order is total.
    pub fn reading_order(&self, other: &RedactionBox) -> Ordering {
        (self.y, self.x, self.width, self.height).cmp(&(
            other.y,
            other.x,
            other.width,
            other.height,
        ))
    }

    fn passes(&self, config: &BoxDetectConfig) -> bool {
        self.width > config.min_width_px
            && self.height > config.min_height_px
            && self.aspect_ratio() > config.min_aspect_ratio
            && config.max_width_px.map_or(true, |m| self.width <= m)
            && config.max_height_px.map_or(true, |m| self.height <= m)
    }
}

/// Foreground mask: 255 where the pixel is redaction-dark, 0 elsewhere.
fn binarize(gray: &GrayImage, threshold: u8) -> GrayImage {
    let mut mask = GrayImage::new(gray.width(), gray.height());
    for (dst, src) in mask.pixels_mut().zip(gray.pixels()) {
        if src[0] <= threshold {
            *dst = Luma([255]);
        }
    }
    mask
}

/// Bounding rectangles of all 8-connected foreground components.
fn component_bounds(mask: &GrayImage) -> Vec<RedactionBox> {
    let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));
    // [min_x, min_y, max_x, max_y] per label; label 0 is background.
    let mut bounds: Vec<[u32; 4]> = Vec::new();
    for (x, y, px) in labels.enumerate_pixels() {
        let label = px[0] as usize;
        if label == 0 {
            continue;
        }
        if bounds.len() < label {
            bounds.resize(label, [u32::MAX, u32::MAX, 0, 0]);
        }
        let b = &mut bounds[label - 1];
        b[0] = b[0].min(x);
        b[1] = b[1].min(y);
        b[2] = b[2].max(x);
        b[3] = b[3].max(y);
    }
    bounds
        .into_iter()
        .filter(|b| b[0] <= b[2] && b[1] <= b[3])
        .map(|b| RedactionBox::new(b[0], b[1], b[2] - b[0] + 1, b[3] - b[1] + 1))
        .collect()
}

fn drop_nested(boxes: Vec<RedactionBox>) -> Vec<RedactionBox> {
    let keep: Vec<bool> = boxes
        .iter()
        .enumerate()
        .map(|(i, inner)| {
            !boxes
                .iter()
                .enumerate()
                .any(|(j, outer)| i != j && outer != inner && outer.contains(inner))
        })
        .collect();
    boxes
        .into_iter()
        .zip(keep)
        .filter_map(|(b, k)| k.then_some(b))
        .collect()
}

/// Detect redaction boxes on a grayscale image.
///
/// Returns boxes sorted in reading order. An empty result is a valid outcome.
pub fn detect_boxes(gray: &GrayImage, config: &BoxDetectConfig) -> Vec<RedactionBox> {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return Vec::new();
    }

    let mask = binarize(gray, config.dark_threshold);
    let components = component_bounds(&mask);
    let n_components = components.len();

    let mut boxes: Vec<RedactionBox> = components
        .into_iter()
        .filter(|b| b.passes(config))
        .collect();
    if config.drop_nested {
        boxes = drop_nested(boxes);
    }
    boxes.sort_by(|a, b| a.reading_order(b));
    // Identical rectangles can only come from distinct components sharing
    // a bounding box; report each rectangle once.
    boxes.dedup();

    if boxes.is_empty() {
        tracing::info!(
            "No redaction boxes found ({} dark components, none passed the size gates)",
            n_components
        );
    } else {
        tracing::info!(
            "Detected {} redaction boxes from {} dark components",
            boxes.len(),
            n_components
        );
    }
    boxes
}

/// Detect redaction boxes on a page raster.
pub fn detect(page: &PageRaster, config: &BoxDetectConfig) -> Vec<RedactionBox> {
    detect_boxes(page.image(), config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{draw_page, fill_rect};
    use proptest::prelude::*;

    #[test]
    fn finds_boxes_in_reading_order() {
        let img = draw_page(
            600,
            400,
            &[
                RedactionBox::new(300, 200, 120, 30),
                RedactionBox::new(40, 50, 200, 40),
                RedactionBox::new(350, 50, 100, 25),
                RedactionBox::new(40, 200, 90, 30),
            ],
        );
        let boxes = detect_boxes(&img, &BoxDetectConfig::default());
        assert_eq!(
            boxes,
            vec![
                RedactionBox::new(40, 50, 200, 40),
                RedactionBox::new(350, 50, 100, 25),
                RedactionBox::new(40, 200, 90, 30),
                RedactionBox::new(300, 200, 120, 30),
            ]
        );
    }

    #[test]
    fn narrow_box_is_never_reported() {
        let img = draw_page(200, 100, &[RedactionBox::new(20, 20, 25, 12)]);
        assert!(detect_boxes(&img, &BoxDetectConfig::default()).is_empty());
    }

    #[test]
    fn gray_text_and_noise_are_ignored() {
        let mut img = draw_page(300, 120, &[RedactionBox::new(10, 10, 150, 30)]);
        // Mid-gray "text" stroke and isolated dark specks.
        fill_rect(&mut img, 10, 70, 200, 12, 90);
        fill_rect(&mut img, 250, 100, 2, 2, 0);
        let boxes = detect_boxes(&img, &BoxDetectConfig::default());
        assert_eq!(boxes, vec![RedactionBox::new(10, 10, 150, 30)]);
    }

    #[test]
    fn nested_components_collapse_to_outer_box() {
        // A hollow dark frame with a solid bar inside it.
        let mut img = GrayImage::from_pixel(400, 200, Luma([255]));
        fill_rect(&mut img, 20, 20, 300, 4, 0);
        fill_rect(&mut img, 20, 136, 300, 4, 0);
        fill_rect(&mut img, 20, 20, 4, 120, 0);
        fill_rect(&mut img, 316, 20, 4, 120, 0);
        fill_rect(&mut img, 60, 60, 120, 30, 0);

        let boxes = detect_boxes(&img, &BoxDetectConfig::default());
        assert_eq!(boxes, vec![RedactionBox::new(20, 20, 300, 120)]);

        let keep_all = BoxDetectConfig {
            drop_nested: false,
            ..BoxDetectConfig::default()
        };
        assert_eq!(detect_boxes(&img, &keep_all).len(), 2);
    }

    #[test]
    fn diagonal_touching_pixels_join_one_component() {
        let mut img = GrayImage::from_pixel(200, 100, Luma([255]));
        fill_rect(&mut img, 10, 10, 40, 15, 0);
        fill_rect(&mut img, 50, 25, 40, 15, 0);
        let boxes = detect_boxes(&img, &BoxDetectConfig::default());
        assert_eq!(boxes, vec![RedactionBox::new(10, 10, 80, 30)]);
    }

    #[test]
    fn max_caps_reject_page_sized_regions() {
        let img = draw_page(500, 300, &[RedactionBox::new(0, 0, 480, 200)]);
        let config = BoxDetectConfig {
            max_width_px: Some(400),
            ..BoxDetectConfig::default()
        };
        assert!(detect_boxes(&img, &config).is_empty());
    }

    #[test]
    fn rescale_maps_between_resolutions() {
        let b = RedactionBox::new(281, 2519, 369, 106);
        let hi = b.rescale(300.0, 600.0);
        assert_eq!(hi, RedactionBox::new(562, 5038, 738, 212));
        assert_eq!(hi.rescale(600.0, 300.0), b);
        assert_eq!(
            b.rescale(300.0, 0.0),
            b,
            "degenerate factor leaves box unchanged"
        );
    }

    #[test]
    fn empty_image_yields_no_boxes() {
        assert!(detect_boxes(&GrayImage::new(0, 0), &BoxDetectConfig::default()).is_empty());
    }

    proptest! {
        #[test]
        fn single_rectangle_reported_iff_it_passes_gates(w in 5u32..90, h in 5u32..45) {
            let img = draw_page(140, 80, &[RedactionBox::new(20, 15, w, h)]);
            let boxes = detect_boxes(&img, &BoxDetectConfig::default());
            let expected = w > 30 && h > 10 && (w as f64 / h as f64) > 1.5;
            prop_assert_eq!(!boxes.is_empty(), expected);
            for b in &boxes {
                prop_assert!(b.width > 30 && b.height > 10 && b.aspect_ratio() > 1.5);
            }
        }

        #[test]
        fn output_is_in_reading_order(
            cells in proptest::collection::vec((0u32..4, 0u32..4, 32u32..70, 11u32..20), 1..10)
        ) {
            // One rectangle per grid cell (80 x 40), later duplicates overwrite.
            let rects: Vec<RedactionBox> = cells
                .iter()
                .map(|&(cx, cy, w, h)| RedactionBox::new(5 + cx * 80, 5 + cy * 40, w, h))
                .collect();
            let img = draw_page(340, 170, &rects);
            let boxes = detect_boxes(&img, &BoxDetectConfig::default());
            prop_assert!(!boxes.is_empty());
            for pair in boxes.windows(2) {
                prop_assert_eq!(pair[0].reading_order(&pair[1]), Ordering::Less);
            }
        }
    }
}
