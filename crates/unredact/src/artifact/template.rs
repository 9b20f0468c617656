//! Expected halo edges for a candidate string.
//!
//! The candidate is rendered through the same profile that predicted its
//! width, placed where the hidden text would have been, and then redacted
//! exactly like the page: the box is painted black. Whatever glyph structure
//! is left outside the box is what the halo of a true match should show.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};

use crate::calibrate::CalibrationProfile;
use crate::collab::{GlyphMetrics, GlyphRenderer};
use crate::detect::RedactionBox;
use crate::halo::{extract_from_image, EdgeConfig, HaloData, RegionEdges};
use crate::matching::predict_width;

/// Expected per-side edge counts for one candidate.
pub type TemplateEdges = RegionEdges;

/// Render the redacted-candidate canvas for `halo`'s padded region.
///
/// `hires_scale` converts working pixels (the profile's) to the halo's
/// raster. Returns `None` when the renderer has no image for `text` or the
/// scaled rendering would be empty.
pub fn render_template_canvas(
    renderer: &dyn GlyphRenderer,
    metrics: &dyn GlyphMetrics,
    profile: &CalibrationProfile,
    halo: &HaloData,
    text: &str,
    hires_scale: f64,
) -> Option<GrayImage> {
    let glyphs = renderer.render_text(text, &profile.font, profile.kerning_mode)?;
    if glyphs.width() == 0 || glyphs.height() == 0 {
        return None;
    }
    let target_w = (predict_width(profile, metrics, text) * hires_scale).round();
    let target_h = (glyphs.height() as f64 * profile.scale_factor * hires_scale).round();
    if !(target_w >= 1.0 && target_h >= 1.0) || target_w > 1e5 || target_h > 1e5 {
        return None;
    }
    let glyphs = imageops::resize(
        &glyphs,
        target_w as u32,
        target_h as u32,
        FilterType::Triangle,
    );

    let region = halo.region;
    let bx = halo.redaction_box;
    let local = RedactionBox::new(bx.x - region.x, bx.y - region.y, bx.width, bx.height);

    let mut canvas = GrayImage::from_pixel(region.width, region.height, Luma([255]));
    let top = local.y as i64 + (local.height as i64 - glyphs.height() as i64) / 2;
    imageops::overlay(&mut canvas, &glyphs, local.x as i64, top);
    for y in local.y..local.bottom() {
        for x in local.x..local.right() {
            canvas.put_pixel(x, y, Luma([0]));
        }
    }
    Some(canvas)
}

/// Expected edge counts of `text` around the box of `halo`.
pub fn build_template(
    renderer: &dyn GlyphRenderer,
    metrics: &dyn GlyphMetrics,
    profile: &CalibrationProfile,
    halo: &HaloData,
    text: &str,
    hires_scale: f64,
    edges: &EdgeConfig,
) -> Option<TemplateEdges> {
    let canvas = render_template_canvas(renderer, metrics, profile, halo, text, hires_scale)?;
    let bx = halo.redaction_box;
    let local = RedactionBox::new(
        bx.x - halo.region.x,
        bx.y - halo.region.y,
        bx.width,
        bx.height,
    );
    let template = extract_from_image(&canvas, &local, halo.thickness_px, halo.corner_radius_px);
    Some(template.edge_counts(edges))
}
