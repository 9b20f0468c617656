//! Halo extraction around a redaction box.
//!
//! Glyph parts that rose above or hung below the original text line, and
//! the antialiasing fringe of glyphs the box did not fully cover, survive as
//! faint structure just outside the box. The halo is the ring of pixels
//! `thickness_px` wide around the box on the high-resolution raster, cut into
//! four strips. The corners of the ring mix two box edges and are masked out
//! with a diamond of configurable radius.

mod enhance;

pub use enhance::{
    compression_inconsistency, contrast_stretch, enhance, lsb_plane, EdgeConfig, EnhanceConfig,
    EnhancedStrip,
};

use image::{GrayImage, Luma};

use crate::detect::RedactionBox;
use crate::raster::PageRaster;

/// Configuration for halo extraction.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct HaloConfig {
    /// Ring thickness around the box (high-res pixels).
    pub thickness_px: u32,
    /// Corner diamond radius: pixels with `dx + dy < radius` from a corner
    /// of the padded region are excluded.
    pub corner_radius_px: u32,
    /// Enhancement lenses for inspection output.
    pub enhance: EnhanceConfig,
}

impl Default for HaloConfig {
    fn default() -> Self {
        Self {
            thickness_px: 6,
            corner_radius_px: 15,
            enhance: EnhanceConfig::default(),
        }
    }
}

/// Which edge of the box a strip borders.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Top,
    Bottom,
    Left,
    Right,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::Top, Side::Bottom, Side::Left, Side::Right];

    pub fn name(self) -> &'static str {
        match self {
            Side::Top => "top",
            Side::Bottom => "bottom",
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

/// Per-side edge pixel counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RegionEdges {
    pub top: usize,
    pub bottom: usize,
    pub left: usize,
    pub right: usize,
}

impl RegionEdges {
    pub fn get(&self, side: Side) -> usize {
        match side {
            Side::Top => self.top,
            Side::Bottom => self.bottom,
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    pub fn total(&self) -> usize {
        self.top + self.bottom + self.left + self.right
    }
}

/// One strip of the halo. Excluded (corner) pixels are stored as 0.
#[derive(Debug, Clone)]
pub struct HaloStrip {
    side: Side,
    origin: [u32; 2],
    image: GrayImage,
    excluded: Vec<bool>,
}

impl HaloStrip {
    pub fn side(&self) -> Side {
        self.side
    }

    /// Top-left corner in the source raster.
    pub fn origin(&self) -> [u32; 2] {
        self.origin
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }

    pub fn is_excluded(&self, x: u32, y: u32) -> bool {
        self.excluded[(y * self.image.width() + x) as usize]
    }

    pub fn valid_pixels(&self) -> usize {
        self.excluded.iter().filter(|e| !**e).count()
    }

    /// Copy with excluded pixels replaced by the mean of the valid ones, so
    /// the mask boundary does not read as an edge.
    pub(crate) fn filled(&self) -> Option<GrayImage> {
        let (sum, n) = self
            .image
            .pixels()
            .zip(&self.excluded)
            .filter(|(_, e)| !**e)
            .fold((0u64, 0u64), |(s, n), (p, _)| (s + p[0] as u64, n + 1));
        if n == 0 {
            return None;
        }
        let mean = Luma([(sum / n) as u8]);
        let mut out = self.image.clone();
        for (p, e) in out.pixels_mut().zip(&self.excluded) {
            if *e {
                *p = mean;
            }
        }
        Some(out)
    }

    fn touches_excluded(&self, x: u32, y: u32) -> bool {
        let (w, h) = self.image.dimensions();
        let x0 = x.saturating_sub(1);
        let y0 = y.saturating_sub(1);
        let x1 = (x + 1).min(w - 1);
        let y1 = (y + 1).min(h - 1);
        (y0..=y1).any(|yy| (x0..=x1).any(|xx| self.is_excluded(xx, yy)))
    }

    /// Canny edge map of the strip; excluded pixels never carry edges.
    pub fn edge_map(&self, edges: &EdgeConfig) -> GrayImage {
        let (w, h) = self.image.dimensions();
        if w < 3 || h < 3 {
            return GrayImage::new(w, h);
        }
        let Some(filled) = self.filled() else {
            return GrayImage::new(w, h);
        };
        let mut map = imageproc::edges::canny(&filled, edges.canny_low, edges.canny_high);
        for (p, e) in map.pixels_mut().zip(&self.excluded) {
            if *e {
                *p = Luma([0]);
            }
        }
        map
    }

    /// Edge pixels whose 3×3 neighbourhood holds no excluded pixel.
    pub fn observed_edges(&self, edges: &EdgeConfig) -> usize {
        let map = self.edge_map(edges);
        map.enumerate_pixels()
            .filter(|(x, y, p)| p[0] > 0 && !self.touches_excluded(*x, *y))
            .count()
    }
}

/// The four strips around one box.
#[derive(Debug, Clone)]
pub struct HaloData {
    /// The box, clipped to the raster.
    pub redaction_box: RedactionBox,
    /// Box grown by the thickness on every side, clipped to the raster.
    pub region: RedactionBox,
    pub thickness_px: u32,
    pub corner_radius_px: u32,
    pub top: HaloStrip,
    pub bottom: HaloStrip,
    pub left: HaloStrip,
    pub right: HaloStrip,
}

impl HaloData {
    pub fn strip(&self, side: Side) -> &HaloStrip {
        match side {
            Side::Top => &self.top,
            Side::Bottom => &self.bottom,
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    pub fn strips(&self) -> [&HaloStrip; 4] {
        [&self.top, &self.bottom, &self.left, &self.right]
    }

    pub fn edge_counts(&self, edges: &EdgeConfig) -> RegionEdges {
        RegionEdges {
            top: self.top.observed_edges(edges),
            bottom: self.bottom.observed_edges(edges),
            left: self.left.observed_edges(edges),
            right: self.right.observed_edges(edges),
        }
    }
}

/// `true` when local pixel `(x, y)` of a `rw × rh` region lies in a corner
/// diamond of radius `r`.
fn in_corner(x: u32, y: u32, rw: u32, rh: u32, r: u32) -> bool {
    let dl = x;
    let dr = rw - 1 - x;
    let dt = y;
    let db = rh - 1 - y;
    dt + dl < r || dt + dr < r || db + dl < r || db + dr < r
}

struct Region<'a> {
    image: &'a GrayImage,
    origin: [u32; 2],
    size: [u32; 2],
    corner_radius: u32,
}

impl Region<'_> {
    /// Cut the local rectangle `[x, x+w) × [y, y+h)` into a strip.
    fn cut(&self, side: Side, x: u32, y: u32, w: u32, h: u32) -> HaloStrip {
        let mut image = GrayImage::new(w, h);
        let mut excluded = vec![false; (w * h) as usize];
        for sy in 0..h {
            for sx in 0..w {
                let lx = x + sx;
                let ly = y + sy;
                if in_corner(lx, ly, self.size[0], self.size[1], self.corner_radius) {
                    excluded[(sy * w + sx) as usize] = true;
                } else {
                    let p = *self
                        .image
                        .get_pixel(self.origin[0] + lx, self.origin[1] + ly);
                    image.put_pixel(sx, sy, p);
                }
            }
        }
        HaloStrip {
            side,
            origin: [self.origin[0] + x, self.origin[1] + y],
            image,
            excluded,
        }
    }
}

/// Extract the halo of `bx` from any grayscale image.
pub(crate) fn extract_from_image(
    image: &GrayImage,
    bx: &RedactionBox,
    thickness_px: u32,
    corner_radius_px: u32,
) -> HaloData {
    let (w, h) = image.dimensions();
    let bx0 = bx.x.min(w);
    let by0 = bx.y.min(h);
    let bx1 = bx.right().min(w);
    let by1 = bx.bottom().min(h);

    let x2 = bx.right().saturating_add(thickness_px).min(w);
    let y2 = bx.bottom().saturating_add(thickness_px).min(h);
    let x1 = bx.x.saturating_sub(thickness_px).min(x2);
    let y1 = bx.y.saturating_sub(thickness_px).min(y2);
    let (rw, rh) = (x2 - x1, y2 - y1);

    let region = Region {
        image,
        origin: [x1, y1],
        size: [rw, rh],
        corner_radius: corner_radius_px,
    };
    let (lx0, ly0) = (bx0 - x1, by0 - y1);
    let (lx1, ly1) = (bx1 - x1, by1 - y1);

    HaloData {
        redaction_box: RedactionBox::new(bx0, by0, bx1 - bx0, by1 - by0),
        region: RedactionBox::new(x1, y1, rw, rh),
        thickness_px,
        corner_radius_px,
        top: region.cut(Side::Top, 0, 0, rw, ly0),
        bottom: region.cut(Side::Bottom, 0, ly1, rw, rh - ly1),
        left: region.cut(Side::Left, 0, ly0, lx0, ly1 - ly0),
        right: region.cut(Side::Right, lx1, ly0, rw - lx1, ly1 - ly0),
    }
}

/// Extract the four halo strips around `bx` on a (high-resolution) page.
///
/// `bx` must be in the page's pixel coordinates; rescale boxes detected on
/// the working raster with [`RedactionBox::rescale`] first.
pub fn extract_halo(
    page: &PageRaster,
    bx: &RedactionBox,
    thickness_px: u32,
    corner_radius_px: u32,
) -> HaloData {
    extract_from_image(page.image(), bx, thickness_px, corner_radius_px)
}
