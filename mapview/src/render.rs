//! Render planning: fog mask operations, grid lines, brush highlight.
//!
//! Nothing here draws. Each function turns read-only engine state into a
//! list of primitive operations that any surface (a browser canvas, a
//! terminal, the software [`FogMask`] below) can execute.
//!
//! Grid-cell areas always clear as hard-edged squares and freehand areas
//! always clear as soft radial gradients. The two paths stay separate.

#[cfg(test)]
#[path = "render_test.rs"]
mod render_test;

use crate::camera::{Point, Size};
use crate::fog::RevealedArea;
use crate::grid::{Cell, GridConfig, GridIndex};

/// Inner fraction of a freehand radius that is fully cleared.
const RADIAL_INNER_RATIO: f64 = 0.5;

/// 8-bit colour with a float alpha, as used by CSS `rgba()`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Rgba {
    #[must_use]
    pub fn css(&self) -> String {
        format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
    }
}

/// Parse `#rrggbb` (or `#rgb`) into a colour with the given alpha.
#[must_use]
pub fn hex_to_rgba(hex: &str, alpha: f64) -> Option<Rgba> {
    let digits = hex.strip_prefix('#')?;
    let expanded: String = match digits.len() {
        3 => digits.chars().flat_map(|c| [c, c]).collect(),
        6 => digits.to_string(),
        _ => return None,
    };
    let channel = |i: usize| match expanded.get(i..i + 2).map(|s| u8::from_str_radix(s, 16)) {
        Some(Ok(v)) => Some(v),
        _ => None,
    };
    Some(Rgba { r: channel(0)?, g: channel(2)?, b: channel(4)?, a: alpha.clamp(0.0, 1.0) })
}

// ── Fog mask ────────────────────────────────────────────────────

/// One clear operation against a fully fogged layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaskOp {
    /// Hard-edged square, no anti-aliasing.
    ClearSquare { x: f64, y: f64, size: f64 },
    /// Radial gradient: clear inside `inner`, fading to fog at `outer`.
    ClearRadial { cx: f64, cy: f64, inner: f64, outer: f64 },
}

impl MaskOp {
    #[must_use]
    pub fn for_area(area: &RevealedArea) -> Self {
        if area.is_grid_cell {
            Self::ClearSquare {
                x: area.x - area.radius,
                y: area.y - area.radius,
                size: area.radius * 2.0,
            }
        } else {
            Self::ClearRadial {
                cx: area.x,
                cy: area.y,
                inner: area.radius * RADIAL_INNER_RATIO,
                outer: area.radius,
            }
        }
    }

    /// Remaining fog fraction this op leaves at `p` (1.0 = untouched).
    fn coverage_at(&self, p: Point) -> f64 {
        match *self {
            Self::ClearSquare { x, y, size } => {
                let inside = p.x >= x && p.x < x + size && p.y >= y && p.y < y + size;
                if inside { 0.0 } else { 1.0 }
            }
            Self::ClearRadial { cx, cy, inner, outer } => {
                let d = p.distance(Point::new(cx, cy));
                if d <= inner {
                    0.0
                } else if d >= outer || outer <= inner {
                    1.0
                } else {
                    (d - inner) / (outer - inner)
                }
            }
        }
    }
}

/// Full fog layer: fill colour plus the clears to punch through it.
#[derive(Debug, Clone, PartialEq)]
pub struct FogLayerPlan {
    pub fill: Rgba,
    pub ops: Vec<MaskOp>,
}

/// Plan the fog layer for `areas` with the given appearance.
#[must_use]
pub fn plan_fog_layer(areas: &[RevealedArea], fill: Rgba) -> FogLayerPlan {
    FogLayerPlan { fill, ops: areas.iter().map(MaskOp::for_area).collect() }
}

/// Software fog mask: one alpha value per pixel, 1.0 fully fogged.
#[derive(Debug, Clone, PartialEq)]
pub struct FogMask {
    width: usize,
    height: usize,
    alpha: Vec<f32>,
}

impl FogMask {
    /// Fully fogged mask of `width x height` pixels.
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height, alpha: vec![1.0; width * height] }
    }

    /// Rasterise `areas` onto a fresh mask.
    #[must_use]
    pub fn render(width: usize, height: usize, areas: &[RevealedArea]) -> Self {
        let mut mask = Self::new(width, height);
        for area in areas {
            mask.apply(&MaskOp::for_area(area));
        }
        mask
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Alpha at pixel `(x, y)`; `None` outside the mask.
    #[must_use]
    pub fn alpha(&self, x: usize, y: usize) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.alpha.get(y * self.width + x).copied()
    }

    /// Fraction of pixels with any fog removed.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn revealed_fraction(&self) -> f64 {
        if self.alpha.is_empty() {
            return 0.0;
        }
        let revealed = self.alpha.iter().filter(|a| **a < 1.0).count();
        revealed as f64 / self.alpha.len() as f64
    }

    /// Apply one clear; pixels are sampled at their centres.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn apply(&mut self, op: &MaskOp) {
        let (min_x, min_y, max_x, max_y) = match *op {
            MaskOp::ClearSquare { x, y, size } => (x, y, x + size, y + size),
            MaskOp::ClearRadial { cx, cy, outer, .. } => (cx - outer, cy - outer, cx + outer, cy + outer),
        };
        let (x0, x1) = pixel_span(min_x, max_x, self.width);
        let (y0, y1) = pixel_span(min_y, max_y, self.height);
        for py in y0..y1 {
            for px in x0..x1 {
                let centre = Point::new(px as f64 + 0.5, py as f64 + 0.5);
                let keep = op.coverage_at(centre) as f32;
                if let Some(a) = self.alpha.get_mut(py * self.width + px) {
                    *a = a.min(keep);
                }
            }
        }
    }
}

/// Pixel index range `[start, end)` overlapping `[lo, hi]`, clipped to `len`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn pixel_span(lo: f64, hi: f64, len: usize) -> (usize, usize) {
    let max = len as f64;
    let start = lo.floor().clamp(0.0, max) as usize;
    let end = hi.ceil().clamp(0.0, max) as usize;
    (start, end.max(start))
}

// ── Grid overlay ────────────────────────────────────────────────

/// Line positions for the grid overlay, in image pixels.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GridLines {
    pub vertical: Vec<f64>,
    pub horizontal: Vec<f64>,
    pub line_width: f64,
}

/// Lines start exactly at the offset and step by the cell size up to the
/// image edge inclusive.
#[must_use]
pub fn grid_lines(config: &GridConfig, map: Size) -> GridLines {
    GridLines {
        vertical: steps(config.offset_x(), config.cell_size(), map.width),
        horizontal: steps(config.offset_y(), config.cell_size(), map.height),
        line_width: config.line_width(),
    }
}

fn steps(start: f64, step: f64, limit: f64) -> Vec<f64> {
    let mut out = Vec::new();
    if step <= 0.0 || !limit.is_finite() {
        return out;
    }
    let mut i: u32 = 0;
    loop {
        let v = start + f64::from(i) * step;
        if v > limit {
            break;
        }
        out.push(v);
        i += 1;
    }
    out
}

/// Which tool the hover highlight reflects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrushTool {
    Paint,
    Erase,
    /// Inspect mode (modifier held, no edit).
    Inspect,
}

impl BrushTool {
    /// Fill and stroke colours for the highlight.
    #[must_use]
    pub fn colors(self) -> (Rgba, Rgba) {
        let (r, g, b) = match self {
            Self::Paint => (255, 0, 0),
            Self::Erase => (0, 100, 255),
            Self::Inspect => (0, 255, 0),
        };
        (Rgba { r, g, b, a: 0.25 }, Rgba { r, g, b, a: 0.7 })
    }
}

/// Hover highlight: the brush block under the pointer.
#[derive(Debug, Clone, PartialEq)]
pub struct BrushHighlight {
    pub tool: BrushTool,
    pub center: Cell,
    pub cells: Vec<Cell>,
}

/// Highlight for `brush` at `p`, or `None` when the pointer is off the map.
#[must_use]
pub fn brush_highlight(grid: &GridIndex, p: Point, brush: u32, tool: BrushTool) -> Option<BrushHighlight> {
    let center = grid.get_cell(p)?;
    Some(BrushHighlight { tool, center, cells: grid.brush_cells(p, brush) })
}
