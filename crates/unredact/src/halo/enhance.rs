//! Enhancement lenses for halo strips.
//!
//! Each lens is an independent view meant for inspection: an extreme
//! contrast stretch that lifts faint antialiasing, a Canny edge map, the two
//! least significant bit planes, and a JPEG re-encode difference that shows
//! where the strip was compressed differently from its surroundings.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{GrayImage, ImageFormat, Luma};

use super::{HaloStrip, Side};

/// Canny thresholds shared by edge counting and the edge lens.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    pub canny_low: f32,
    pub canny_high: f32,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            canny_low: 30.0,
            canny_high: 100.0,
        }
    }
}

/// Which lenses to produce and their parameters.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EnhanceConfig {
    /// Gain applied after min-max normalization.
    pub contrast_gain: f32,
    /// Offset applied after the gain.
    pub contrast_offset: f32,
    pub lsb_plane: bool,
    pub compression_map: bool,
    pub jpeg_quality: u8,
    /// Gain applied to the re-encode difference.
    pub compression_gain: f32,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            contrast_gain: 3.0,
            contrast_offset: -200.0,
            lsb_plane: true,
            compression_map: true,
            jpeg_quality: 90,
            compression_gain: 10.0,
        }
    }
}

/// All lenses of one strip.
#[derive(Debug, Clone)]
pub struct EnhancedStrip {
    pub side: Side,
    pub contrast: GrayImage,
    pub edges: GrayImage,
    pub lsb: Option<GrayImage>,
    pub compression: Option<GrayImage>,
}

impl EnhancedStrip {
    /// Named lens images, for writing to disk.
    pub fn lenses(&self) -> Vec<(&'static str, &GrayImage)> {
        let mut out = vec![("contrast", &self.contrast), ("edges", &self.edges)];
        if let Some(lsb) = &self.lsb {
            out.push(("lsb", lsb));
        }
        if let Some(c) = &self.compression {
            out.push(("compression", c));
        }
        out
    }
}

fn saturate(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Min-max normalize the valid pixels to 0..=255, then `gain * v + offset`.
///
/// Excluded pixels stay 0.
pub fn contrast_stretch(strip: &HaloStrip, gain: f32, offset: f32) -> GrayImage {
    let img = strip.image();
    let (w, h) = img.dimensions();
    let mut lo = u8::MAX;
    let mut hi = u8::MIN;
    for (x, y, p) in img.enumerate_pixels() {
        if !strip.is_excluded(x, y) {
            lo = lo.min(p[0]);
            hi = hi.max(p[0]);
        }
    }
    let mut out = GrayImage::new(w, h);
    if lo > hi {
        return out;
    }
    let range = (hi - lo) as f32;
    for (x, y, p) in img.enumerate_pixels() {
        if strip.is_excluded(x, y) {
            continue;
        }
        let norm = if range > 0.0 {
            (p[0] - lo) as f32 * 255.0 / range
        } else {
            0.0
        };
        out.put_pixel(x, y, Luma([saturate(gain * norm + offset)]));
    }
    out
}

/// The two least significant bits of each pixel, spread to 0..=255.
pub fn lsb_plane(img: &GrayImage) -> GrayImage {
    let mut out = img.clone();
    for p in out.pixels_mut() {
        p[0] = (p[0] & 0b11) * 85;
    }
    out
}

/// `|v - jpeg(v)| * gain` after a re-encode at `quality`.
pub fn compression_inconsistency(
    img: &GrayImage,
    quality: u8,
    gain: f32,
) -> Result<GrayImage, image::ImageError> {
    let mut buf = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)).encode_image(img)?;
    let decoded = image::load_from_memory_with_format(buf.get_ref(), ImageFormat::Jpeg)?;
    let decoded = decoded.to_luma8();
    let mut out = GrayImage::new(img.width(), img.height());
    for ((o, a), b) in out.pixels_mut().zip(img.pixels()).zip(decoded.pixels()) {
        let diff = (a[0] as f32 - b[0] as f32).abs();
        *o = Luma([saturate(diff * gain)]);
    }
    Ok(out)
}

/// Produce every enabled lens for `strip`.
///
/// A failed re-encode drops that lens with a warning instead of failing.
pub fn enhance(strip: &HaloStrip, config: &EnhanceConfig, edges: &EdgeConfig) -> EnhancedStrip {
    let compression = if config.compression_map && !strip.is_empty() {
        match compression_inconsistency(
            strip.image(),
            config.jpeg_quality,
            config.compression_gain,
        ) {
            Ok(map) => Some(map),
            Err(e) => {
                tracing::warn!(
                    "{} strip: compression lens unavailable: {}",
                    strip.side().name(),
                    e
                );
                None
            }
        }
    } else {
        None
    };
    EnhancedStrip {
        side: strip.side(),
        contrast: contrast_stretch(strip, config.contrast_gain, config.contrast_offset),
        edges: strip.edge_map(edges),
        lsb: config.lsb_plane.then(|| lsb_plane(strip.image())),
        compression,
    }
}
