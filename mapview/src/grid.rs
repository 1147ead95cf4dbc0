//! Grid calibration, cell lookup, and brush expansion.
//!
//! DESIGN
//! ======
//! A [`GridConfig`] is a validated value: the cell size is always finite and
//! positive and both offsets are normalised into `[0, cell_size)`. Every
//! constructor and calibration routine goes through [`GridConfig::new`], so a
//! rejected input never replaces a config the caller already holds.
//!
//! [`GridIndex`] pairs a config with the map size. Cell lookup absorbs a small
//! tolerance band around the image so pointer events that land on the border
//! still resolve; brush expansion drops any cell that would stick out of the
//! image.

#[cfg(test)]
#[path = "grid_test.rs"]
mod grid_test;

use std::ops::RangeInclusive;

use crate::camera::{Point, Size};
use crate::consts::{DEFAULT_GRID_LINE_WIDTH, EDGE_CLAMP_INSET_PX, EDGE_TOLERANCE_PX};

/// Slack for float comparisons against the image edge.
const EDGE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GridError {
    #[error("cell size must be positive, got {0}")]
    InvalidCellSize(f64),
    #[error("cell count must be at least 1")]
    ZeroCellCount,
    #[error("calibration points must be distinct")]
    ZeroSpan,
    #[error("image size must be positive, got {width}x{height}")]
    InvalidImage { width: f64, height: f64 },
}

/// Uniform square grid aligned to the map image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridConfig {
    cell_size: f64,
    offset_x: f64,
    offset_y: f64,
    line_width: f64,
    calibrated: bool,
}

impl GridConfig {
    /// Build a config, normalising offsets into `[0, cell_size)`.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::InvalidCellSize`] when `cell_size` is not a finite
    /// positive number.
    pub fn new(cell_size: f64, offset_x: f64, offset_y: f64) -> Result<Self, GridError> {
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(GridError::InvalidCellSize(cell_size));
        }
        Ok(Self {
            cell_size,
            offset_x: normalize_offset(offset_x, cell_size),
            offset_y: normalize_offset(offset_y, cell_size),
            line_width: DEFAULT_GRID_LINE_WIDTH,
            calibrated: true,
        })
    }

    /// Replace the line width. Non-positive or non-finite widths fall back to
    /// the default.
    #[must_use]
    pub fn with_line_width(mut self, line_width: f64) -> Self {
        self.line_width = if line_width.is_finite() && line_width > 0.0 {
            line_width
        } else {
            DEFAULT_GRID_LINE_WIDTH
        };
        self
    }

    #[must_use]
    pub fn with_calibrated(mut self, calibrated: bool) -> Self {
        self.calibrated = calibrated;
        self
    }

    #[must_use]
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    #[must_use]
    pub fn offset_x(&self) -> f64 {
        self.offset_x
    }

    #[must_use]
    pub fn offset_y(&self) -> f64 {
        self.offset_y
    }

    #[must_use]
    pub fn line_width(&self) -> f64 {
        self.line_width
    }

    #[must_use]
    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    /// Shift the grid by `(dx, dy)` image pixels, wrapping offsets back into
    /// `[0, cell_size)`.
    pub fn nudge(&mut self, dx: f64, dy: f64) {
        self.offset_x = normalize_offset(self.offset_x + dx, self.cell_size);
        self.offset_y = normalize_offset(self.offset_y + dy, self.cell_size);
    }

    /// Two-point calibration: `cells` cells span the distance between `a` and
    /// `b`. Offsets from `previous` are kept, re-normalised to the new size.
    ///
    /// # Errors
    ///
    /// Rejects a zero cell count or coincident points.
    pub fn calibrate_two_point(
        a: Point,
        b: Point,
        cells: u32,
        previous: Option<&GridConfig>,
    ) -> Result<Self, GridError> {
        if cells == 0 {
            return Err(GridError::ZeroCellCount);
        }
        let distance = a.distance(b);
        if distance.is_nan() || distance <= 0.0 {
            return Err(GridError::ZeroSpan);
        }
        let (ox, oy) = previous.map_or((0.0, 0.0), |p| (p.offset_x, p.offset_y));
        let line_width = previous.map_or(DEFAULT_GRID_LINE_WIDTH, |p| p.line_width);
        Ok(Self::new(distance / f64::from(cells), ox, oy)?.with_line_width(line_width))
    }

    /// Count-based calibration: square cells sized so `cols x rows` fit the
    /// image on both axes, with the unused remainder split evenly on each side.
    ///
    /// # Errors
    ///
    /// Rejects zero counts and an empty image.
    pub fn calibrate_count(cols: u32, rows: u32, image: Size) -> Result<Self, GridError> {
        if cols == 0 || rows == 0 {
            return Err(GridError::ZeroCellCount);
        }
        if image.is_empty() || !image.width.is_finite() || !image.height.is_finite() {
            return Err(GridError::InvalidImage { width: image.width, height: image.height });
        }
        let (cols, rows) = (f64::from(cols), f64::from(rows));
        let cell_size = (image.width / cols).min(image.height / rows);
        let offset_x = (image.width - cell_size * cols) / 2.0;
        let offset_y = (image.height - cell_size * rows) / 2.0;
        Self::new(cell_size, offset_x, offset_y)
    }
}

fn normalize_offset(offset: f64, cell_size: f64) -> f64 {
    if !offset.is_finite() {
        return 0.0;
    }
    let r = offset.rem_euclid(cell_size);
    if r >= cell_size { 0.0 } else { r }
}

/// One grid cell in image space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub col: i64,
    pub row: i64,
    /// Top-left corner.
    pub x: f64,
    pub y: f64,
    pub size: f64,
}

impl Cell {
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.x + self.size / 2.0, self.y + self.size / 2.0)
    }
}

/// Offsets covered by an `n`-wide brush along one axis.
///
/// Odd sizes are symmetric. Even sizes put one more cell on the negative side,
/// so there is no centre cell. A zero size behaves like 1.
#[must_use]
pub fn brush_offsets(n: u32) -> RangeInclusive<i64> {
    let n = i64::from(n.max(1));
    let half = n / 2;
    if n % 2 == 1 { -half..=half } else { -half..=half - 1 }
}

/// Cell addressing for one calibrated map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridIndex {
    pub config: GridConfig,
    pub map: Size,
}

impl GridIndex {
    #[must_use]
    pub fn new(config: GridConfig, map: Size) -> Self {
        Self { config, map }
    }

    /// Resolve an image-space point to its cell.
    ///
    /// Points further than the edge tolerance outside the image return `None`.
    /// Points inside the band are clamped onto the image first.
    #[must_use]
    pub fn get_cell(&self, p: Point) -> Option<Cell> {
        if self.map.is_empty() || !p.x.is_finite() || !p.y.is_finite() {
            return None;
        }
        if p.x < -EDGE_TOLERANCE_PX
            || p.y < -EDGE_TOLERANCE_PX
            || p.x > self.map.width + EDGE_TOLERANCE_PX
            || p.y > self.map.height + EDGE_TOLERANCE_PX
        {
            return None;
        }
        let x = p.x.clamp(0.0, (self.map.width - EDGE_CLAMP_INSET_PX).max(0.0));
        let y = p.y.clamp(0.0, (self.map.height - EDGE_CLAMP_INSET_PX).max(0.0));
        let col = self.index_along(x, self.config.offset_x);
        let row = self.index_along(y, self.config.offset_y);
        Some(self.cell_at(col, row))
    }

    /// Every in-bounds cell of the `brush x brush` block around `p`'s cell.
    #[must_use]
    pub fn brush_cells(&self, p: Point, brush: u32) -> Vec<Cell> {
        let Some(target) = self.get_cell(p) else {
            return Vec::new();
        };
        let offsets = brush_offsets(brush);
        let mut cells = Vec::new();
        for dy in offsets.clone() {
            for dx in offsets.clone() {
                let cell = self.cell_at(target.col + dx, target.row + dy);
                if self.fits(&cell) {
                    cells.push(cell);
                }
            }
        }
        cells
    }

    /// Cell at `(col, row)`; the address may lie outside the image.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn cell_at(&self, col: i64, row: i64) -> Cell {
        let size = self.config.cell_size;
        Cell {
            col,
            row,
            x: col as f64 * size + self.config.offset_x,
            y: row as f64 * size + self.config.offset_y,
            size,
        }
    }

    fn fits(&self, cell: &Cell) -> bool {
        cell.x >= -EDGE_EPSILON
            && cell.y >= -EDGE_EPSILON
            && cell.x + cell.size <= self.map.width + EDGE_EPSILON
            && cell.y + cell.size <= self.map.height + EDGE_EPSILON
    }

    #[allow(clippy::cast_possible_truncation)]
    fn index_along(&self, coord: f64, offset: f64) -> i64 {
        let shifted = coord - offset;
        if shifted < 0.0 {
            0
        } else {
            (shifted / self.config.cell_size).floor() as i64
        }
    }
}
