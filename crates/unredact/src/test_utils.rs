//! Shared test utilities: synthetic pages and table-driven font stand-ins.

use image::{GrayImage, Luma};

use crate::calibrate::ReferenceObservation;
use crate::collab::{FontDescriptor, GlyphMetrics, GlyphRenderer, KerningMode};
use crate::detect::RedactionBox;

/// Fill a rectangle (clipped to the image) with `value`.
pub(crate) fn fill_rect(img: &mut GrayImage, x: u32, y: u32, w: u32, h: u32, value: u8) {
    let x1 = (x + w).min(img.width());
    let y1 = (y + h).min(img.height());
    for yy in y..y1 {
        for xx in x..x1 {
            img.put_pixel(xx, yy, Luma([value]));
        }
    }
}

/// White page with solid black redaction boxes.
pub(crate) fn draw_page(w: u32, h: u32, boxes: &[RedactionBox]) -> GrayImage {
    let mut img = GrayImage::from_pixel(w, h, Luma([255]));
    for b in boxes {
        fill_rect(&mut img, b.x, b.y, b.width, b.height, 0);
    }
    img
}

fn serif_advance(c: char) -> f64 {
    match c {
        'i' | 'j' | 'l' | 'I' | '.' | ',' | '\'' | ' ' => 3.0,
        'f' | 'r' | 't' => 4.0,
        'a' | 'c' | 'e' | 's' | 'z' => 6.0,
        'm' | 'w' | 'M' | 'W' => 11.0,
        c if c.is_uppercase() => 9.0,
        _ => 7.0,
    }
}

fn sans_advance(c: char) -> f64 {
    match c {
        'i' | 'l' | '.' | ',' | '\'' => 2.0,
        ' ' | 'f' | 'j' | 't' | 'I' => 3.0,
        'r' => 5.0,
        'm' => 10.0,
        'w' | 'W' => 9.0,
        'M' => 12.0,
        c if c.is_uppercase() => 8.0,
        _ => 7.0,
    }
}

/// Pair adjustments applied under [`KerningMode::Metric`].
const KERN_PAIRS: [(char, char, f64); 5] = [
    ('C', 'o', -1.0),
    ('A', 'c', -1.0),
    ('a', 'y', -1.0),
    ('w', 'i', -1.0),
    ('e', 'y', -1.0),
];

/// Glyph metrics from fixed advance tables.
///
/// Two families, `serif` and `sans`, with integer advances at 12 pt that
/// scale linearly with point size. Any other family measures 0.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TableMetrics;

impl TableMetrics {
    fn advance(family: &str, c: char) -> Option<f64> {
        match family {
            "serif" => Some(serif_advance(c)),
            "sans" => Some(sans_advance(c)),
            _ => None,
        }
    }

    fn kern(left: char, right: char) -> f64 {
        KERN_PAIRS
            .iter()
            .find(|(l, r, _)| *l == left && *r == right)
            .map_or(0.0, |(_, _, k)| *k)
    }

    /// Per-glyph pen advances at unit scale, kerning folded into the left
    /// glyph of each pair.
    fn advances(text: &str, font: &FontDescriptor, kerning: KerningMode) -> Option<Vec<f64>> {
        let scale = font.point_size as f64 / 12.0;
        let chars: Vec<char> = text.chars().collect();
        let mut out = Vec::with_capacity(chars.len());
        for (i, &c) in chars.iter().enumerate() {
            let mut adv = Self::advance(&font.family_id, c)?;
            if kerning == KerningMode::Metric {
                if let Some(&next) = chars.get(i + 1) {
                    adv += Self::kern(c, next);
                }
            }
            out.push(adv * scale);
        }
        Some(out)
    }
}

impl GlyphMetrics for TableMetrics {
    fn measure_width(&self, text: &str, font: &FontDescriptor, kerning: KerningMode) -> f64 {
        Self::advances(text, font, kerning).map_or(0.0, |a| a.iter().sum())
    }
}

/// Renders each glyph as a solid block in one of three vertical zones.
///
/// The line is `3u` tall with `u = point_size / 2`: uppercase letters and
/// `bdfhklt` occupy the top two zones, `gjpqy` the bottom two, everything
/// else the middle zone. Spaces are blank. Blocks leave a one-pixel gap.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct BlockRenderer;

impl GlyphRenderer for BlockRenderer {
    fn render_text(
        &self,
        text: &str,
        font: &FontDescriptor,
        kerning: KerningMode,
    ) -> Option<GrayImage> {
        if text.trim().is_empty() {
            return None;
        }
        let advances = TableMetrics::advances(text, font, kerning)?;
        let width = advances.iter().sum::<f64>().round() as u32;
        let u = (font.point_size / 2.0).round().max(1.0) as u32;
        let mut img = GrayImage::from_pixel(width.max(1), 3 * u, Luma([255]));
        let mut pen = 0.0f64;
        for (c, adv) in text.chars().zip(advances) {
            let (y0, y1) = if c.is_uppercase() || "bdfhklt".contains(c) {
                (0, 2 * u)
            } else if "gjpqy".contains(c) {
                (u, 3 * u)
            } else {
                (u, 2 * u)
            };
            let x0 = pen.round() as u32;
            let x1 = (pen + adv).round() as u32;
            if c != ' ' && x1 > x0 + 1 {
                fill_rect(&mut img, x0, y0, x1 - x0 - 1, y1 - y0, 0);
            }
            pen += adv;
        }
        Some(img)
    }
}

/// Reference observations laid out one per line, with widths produced by
/// `metrics` under the given hidden profile.
pub(crate) fn reference_words(
    metrics: &dyn GlyphMetrics,
    font: &FontDescriptor,
    kerning: KerningMode,
    scale: f64,
    tracking_px: f64,
    words: &[&str],
) -> Vec<ReferenceObservation> {
    words
        .iter()
        .enumerate()
        .map(|(i, w)| {
            let gaps = w.chars().count().saturating_sub(1) as f64;
            let width = metrics.measure_width(w, font, kerning) * scale + tracking_px * gaps;
            ReferenceObservation::new(*w, 100, 100 + 60 * i as u32, width.round() as u32, 40, 95.0)
        })
        .collect()
}
