//! Font collaborators backed by TrueType/OpenType files on disk.
//!
//! Widths are reported at one pixel per point: `advance / units_per_em *
//! point_size`. The calibration scale factor absorbs the page resolution.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use ttf_parser::{Face, GlyphId, OutlineBuilder};
use unredact::{FontDescriptor, FontLibrary, GlyphMetrics, GlyphRenderer, KerningMode};

/// Supersampling factor of the glyph rasterizer.
const SUPERSAMPLE: u32 = 4;

/// Segments per quadratic or cubic curve.
const CURVE_STEPS: usize = 8;

#[derive(Clone)]
struct LoadedFont {
    data: Arc<Vec<u8>>,
    units_per_em: f64,
}

impl LoadedFont {
    fn face(&self) -> Option<Face<'_>> {
        Face::parse(&self.data, 0).ok()
    }
}

/// All fonts of one directory, keyed by file stem.
#[derive(Clone, Default)]
pub struct TtfFontSet {
    fonts: BTreeMap<String, LoadedFont>,
}

fn is_font_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "ttf" | "otf"))
}

impl TtfFontSet {
    /// Load every `.ttf` / `.otf` file in `dir`.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("failed to read font directory {}", dir.display()))?;
        let mut fonts = BTreeMap::new();
        for entry in entries {
            let path = entry?.path();
            if !is_font_file(&path) {
                continue;
            }
            let Some(family_id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let data = std::fs::read(&path)
                .with_context(|| format!("failed to read font: {}", path.display()))?;
            let face = Face::parse(&data, 0)
                .map_err(|err| anyhow!("failed to parse font: {} ({})", path.display(), err))?;
            let units_per_em = face.units_per_em() as f64;
            tracing::debug!("Loaded font {} ({} units/em)", family_id, units_per_em);
            fonts.insert(
                family_id.to_string(),
                LoadedFont {
                    data: Arc::new(data),
                    units_per_em,
                },
            );
        }
        if fonts.is_empty() {
            bail!("no .ttf/.otf files in {}", dir.display());
        }
        tracing::info!("Loaded {} fonts from {}", fonts.len(), dir.display());
        Ok(Self { fonts })
    }

    pub fn family_ids(&self) -> impl Iterator<Item = &str> {
        self.fonts.keys().map(String::as_str)
    }

    /// Every loaded family at every size in `sizes_pt`.
    pub fn library(&self, sizes_pt: &[f32]) -> FontLibrary {
        FontLibrary::from_families(self.family_ids(), sizes_pt)
    }

    /// Pen advances in pixels at unit scale, kerning folded into the left
    /// glyph. `None` when the family is unknown or a glyph is missing.
    fn advances(
        &self,
        text: &str,
        font: &FontDescriptor,
        kerning: KerningMode,
    ) -> Option<(Vec<(GlyphId, f64)>, f64)> {
        let loaded = self.fonts.get(&font.family_id)?;
        let face = loaded.face()?;
        let px_per_unit = font.point_size as f64 / loaded.units_per_em;
        let glyphs = text
            .chars()
            .map(|c| face.glyph_index(c))
            .collect::<Option<Vec<_>>>()?;
        let mut out = Vec::with_capacity(glyphs.len());
        for (i, &gid) in glyphs.iter().enumerate() {
            let mut adv = face.glyph_hor_advance(gid).unwrap_or(0) as f64;
            if kerning == KerningMode::Metric {
                if let Some(&next) = glyphs.get(i + 1) {
                    adv += kern_units(&face, gid, next);
                }
            }
            out.push((gid, adv * px_per_unit));
        }
        Some((out, px_per_unit))
    }
}

/// Horizontal kern-table adjustment between two glyphs, in font units.
fn kern_units(face: &Face<'_>, left: GlyphId, right: GlyphId) -> f64 {
    let Some(table) = face.tables().kern else {
        return 0.0;
    };
    table
        .subtables
        .into_iter()
        .filter(|st| st.horizontal && !st.variable)
        .find_map(|st| st.glyphs_kerning(left, right))
        .map_or(0.0, f64::from)
}

impl GlyphMetrics for TtfFontSet {
    fn measure_width(&self, text: &str, font: &FontDescriptor, kerning: KerningMode) -> f64 {
        self.advances(text, font, kerning)
            .map_or(0.0, |(a, _)| a.iter().map(|(_, w)| w).sum())
    }
}

/// Flattens glyph outlines into line segments in supersampled pixel space.
struct Flattener {
    segments: Vec<[f32; 4]>,
    origin: (f32, f32),
    scale: f32,
    start: (f32, f32),
    current: (f32, f32),
}

impl Flattener {
    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (self.origin.0 + x * self.scale, self.origin.1 - y * self.scale)
    }

    fn push_to(&mut self, p: (f32, f32)) {
        let c = self.current;
        if c != p {
            self.segments.push([c.0, c.1, p.0, p.1]);
        }
        self.current = p;
    }
}

impl OutlineBuilder for Flattener {
    fn move_to(&mut self, x: f32, y: f32) {
        let p = self.map(x, y);
        self.start = p;
        self.current = p;
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let p = self.map(x, y);
        self.push_to(p);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let p0 = self.current;
        let p1 = self.map(x1, y1);
        let p2 = self.map(x, y);
        for i in 1..=CURVE_STEPS {
            let t = i as f32 / CURVE_STEPS as f32;
            let u = 1.0 - t;
            let px = u * u * p0.0 + 2.0 * u * t * p1.0 + t * t * p2.0;
            let py = u * u * p0.1 + 2.0 * u * t * p1.1 + t * t * p2.1;
            self.push_to((px, py));
        }
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let p0 = self.current;
        let p1 = self.map(x1, y1);
        let p2 = self.map(x2, y2);
        let p3 = self.map(x, y);
        for i in 1..=CURVE_STEPS {
            let t = i as f32 / CURVE_STEPS as f32;
            let u = 1.0 - t;
            let (a, b, c, d) = (u * u * u, 3.0 * u * u * t, 3.0 * u * t * t, t * t * t);
            let px = a * p0.0 + b * p1.0 + c * p2.0 + d * p3.0;
            let py = a * p0.1 + b * p1.1 + c * p2.1 + d * p3.1;
            self.push_to((px, py));
        }
    }

    fn close(&mut self) {
        let start = self.start;
        self.push_to(start);
    }
}

/// Non-zero winding scanline fill, sampling at pixel centres.
fn fill_segments(img: &mut GrayImage, segments: &[[f32; 4]]) {
    let mut crossings: Vec<(f32, i32)> = Vec::new();
    for row in 0..img.height() {
        let yc = row as f32 + 0.5;
        crossings.clear();
        for &[x0, y0, x1, y1] in segments {
            if (y0 <= yc && y1 > yc) || (y1 <= yc && y0 > yc) {
                let x = x0 + (yc - y0) / (y1 - y0) * (x1 - x0);
                crossings.push((x, if y1 > y0 { 1 } else { -1 }));
            }
        }
        crossings.sort_by(|a, b| a.0.total_cmp(&b.0));
        let mut winding = 0;
        for pair in crossings.windows(2) {
            winding += pair[0].1;
            if winding == 0 {
                continue;
            }
            let from = (pair[0].0 - 0.5).ceil().max(0.0) as u32;
            let to = ((pair[1].0 - 0.5).ceil().max(0.0) as u32).min(img.width());
            for col in from..to {
                img.put_pixel(col, row, Luma([0]));
            }
        }
    }
}

impl GlyphRenderer for TtfFontSet {
    fn render_text(
        &self,
        text: &str,
        font: &FontDescriptor,
        kerning: KerningMode,
    ) -> Option<GrayImage> {
        if text.trim().is_empty() {
            return None;
        }
        let (advances, px_per_unit) = self.advances(text, font, kerning)?;
        let face = self.fonts.get(&font.family_id)?.face()?;

        let ss = SUPERSAMPLE as f64;
        let width_px: f64 = advances.iter().map(|(_, w)| w).sum();
        let ascender = face.ascender() as f64 * px_per_unit;
        let descender = face.descender() as f64 * px_per_unit;
        let height_px = (ascender - descender).ceil().max(1.0);
        let out_w = width_px.ceil().max(1.0) as u32;
        let out_h = height_px as u32;

        let mut flat = Flattener {
            segments: Vec::new(),
            origin: (0.0, 0.0),
            scale: (px_per_unit * ss) as f32,
            start: (0.0, 0.0),
            current: (0.0, 0.0),
        };
        let baseline = (ascender * ss) as f32;
        let mut pen = 0.0f64;
        for (gid, adv) in &advances {
            flat.origin = ((pen * ss) as f32, baseline);
            face.outline_glyph(*gid, &mut flat);
            pen += adv;
        }

        let mut big = GrayImage::from_pixel(out_w * SUPERSAMPLE, out_h * SUPERSAMPLE, Luma([255]));
        fill_segments(&mut big, &flat.segments);
        Some(imageops::resize(&big, out_w, out_h, FilterType::Triangle))
    }
}
