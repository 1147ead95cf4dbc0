//! Revealed-area set and the paint/erase engine.
//!
//! DESIGN
//! ======
//! The map starts fully fogged. Erasing fog appends a [`RevealedArea`];
//! painting fog removes every stored area the paint region covers. Storage is
//! identical for both region shapes, only the `is_grid_cell` flag decides how
//! a renderer clears the mask and how a hide region matches.
//!
//! Reveal is set-like, so applying the same area twice leaves the state (and
//! its hash) unchanged. That is what makes at-least-once delivery of edit
//! batches safe.
//!
//! The hash is the SHA-256 of a canonical string built from the areas sorted
//! by `(x, y, radius, is_grid_cell)`. It is recomputed after every mutation
//! and only ever used as a change token.

#[cfg(test)]
#[path = "fog_test.rs"]
mod fog_test;

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::camera::Point;
use crate::consts::{COMPACT_PROXIMITY_PX, HIDE_TOLERANCE_PX};
use crate::grid::Cell;

/// One revealed region in image space, centred on `(x, y)`.
///
/// Grid cells are squares of side `2 * radius`; freehand areas are circles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealedArea {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    #[serde(default)]
    pub is_grid_cell: bool,
}

impl RevealedArea {
    /// Square region covering exactly `cell`.
    #[must_use]
    pub fn grid(cell: &Cell) -> Self {
        let center = cell.center();
        Self { x: center.x, y: center.y, radius: cell.size / 2.0, is_grid_cell: true }
    }

    /// Circular region used when no grid is calibrated.
    #[must_use]
    pub fn freehand(center: Point, radius: f64) -> Self {
        Self { x: center.x, y: center.y, radius, is_grid_cell: false }
    }

    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Whether hiding `self` removes `other`.
    ///
    /// A square removes areas whose centre is strictly inside it. A circle
    /// reaches a little further than its radius.
    #[must_use]
    pub fn hide_covers(&self, other: &RevealedArea) -> bool {
        if self.is_grid_cell {
            (other.x - self.x).abs() < self.radius && (other.y - self.y).abs() < self.radius
        } else {
            self.center().distance(other.center()) <= self.radius + HIDE_TOLERANCE_PX
        }
    }

    fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.x
            .total_cmp(&other.x)
            .then(self.y.total_cmp(&other.y))
            .then(self.radius.total_cmp(&other.radius))
            .then(self.is_grid_cell.cmp(&other.is_grid_cell))
    }

    fn is_near(&self, other: &Self) -> bool {
        (self.x - other.x).abs() < COMPACT_PROXIMITY_PX
            && (self.y - other.y).abs() < COMPACT_PROXIMITY_PX
            && (self.radius - other.radius).abs() < COMPACT_PROXIMITY_PX
    }
}

/// Direction of a fog edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FogAction {
    /// Erase fog, revealing terrain.
    Reveal,
    /// Paint fog, hiding terrain.
    Hide,
}

impl FogAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reveal => "erase",
            Self::Hide => "paint",
        }
    }
}

/// A single queued mutation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FogEdit {
    pub area: RevealedArea,
    pub action: FogAction,
}

/// Dedup key for queued edits: rounded centre plus action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EditKey {
    pub x: i64,
    pub y: i64,
    pub action: FogAction,
}

impl FogEdit {
    #[must_use]
    pub fn new(area: RevealedArea, action: FogAction) -> Self {
        Self { area, action }
    }

    /// One grid edit per cell, in brush order.
    #[must_use]
    pub fn for_cells(cells: &[Cell], action: FogAction) -> Vec<Self> {
        cells.iter().map(|c| Self::new(RevealedArea::grid(c), action)).collect()
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn key(&self) -> EditKey {
        EditKey {
            x: self.area.x.round() as i64,
            y: self.area.y.round() as i64,
            action: self.action,
        }
    }
}

/// Authoritative set of revealed regions for one loaded map.
#[derive(Debug, Clone, PartialEq)]
pub struct FogState {
    areas: Vec<RevealedArea>,
    hash: String,
}

impl Default for FogState {
    fn default() -> Self {
        Self::from_areas(Vec::new())
    }
}

impl FogState {
    /// Fully fogged state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt a snapshot as-is (e.g. fetched from the store).
    #[must_use]
    pub fn from_areas(areas: Vec<RevealedArea>) -> Self {
        let mut state = Self { areas, hash: String::new() };
        state.rehash();
        state
    }

    #[must_use]
    pub fn areas(&self) -> &[RevealedArea] {
        &self.areas
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.areas.len()
    }

    /// True when nothing is revealed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    /// Change token for the current contents.
    #[must_use]
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Add `area` unless an identical one is already stored.
    pub fn reveal(&mut self, area: RevealedArea) -> bool {
        if self.areas.contains(&area) {
            return false;
        }
        self.areas.push(area);
        self.rehash();
        true
    }

    /// Remove every stored area `region` covers. Returns the count removed.
    pub fn hide(&mut self, region: &RevealedArea) -> usize {
        let before = self.areas.len();
        self.areas.retain(|a| !region.hide_covers(a));
        let removed = before - self.areas.len();
        if removed > 0 {
            self.rehash();
        }
        removed
    }

    pub fn apply(&mut self, edit: &FogEdit) -> bool {
        match edit.action {
            FogAction::Reveal => self.reveal(edit.area),
            FogAction::Hide => self.hide(&edit.area) > 0,
        }
    }

    /// Apply a batch in order. Returns true if anything changed.
    pub fn apply_all<'a>(&mut self, edits: impl IntoIterator<Item = &'a FogEdit>) -> bool {
        let mut changed = false;
        for edit in edits {
            changed |= self.apply(edit);
        }
        changed
    }

    pub fn reveal_all(&mut self, areas: &[RevealedArea]) -> usize {
        areas.iter().filter(|a| self.reveal(**a)).count()
    }

    pub fn hide_all(&mut self, regions: &[RevealedArea]) -> usize {
        regions.iter().map(|r| self.hide(r)).sum()
    }

    /// Clear every revealed area, returning the map to fully fogged.
    pub fn reset(&mut self) {
        self.areas.clear();
        self.rehash();
    }

    /// Replace the whole snapshot.
    pub fn replace(&mut self, areas: Vec<RevealedArea>) {
        self.areas = areas;
        self.rehash();
    }

    /// Drop near-duplicate areas once the set grows past `threshold`.
    /// Returns the count dropped.
    pub fn compact(&mut self, threshold: usize) -> usize {
        if self.areas.len() <= threshold {
            return 0;
        }
        let mut kept: Vec<RevealedArea> = Vec::with_capacity(self.areas.len());
        for area in &self.areas {
            if !kept.iter().any(|k| k.is_near(area)) {
                kept.push(*area);
            }
        }
        let dropped = self.areas.len() - kept.len();
        if dropped > 0 {
            self.areas = kept;
            self.rehash();
        }
        dropped
    }

    /// Order-independent string form of the contents.
    #[must_use]
    pub fn canonical(&self) -> String {
        canonical_string(&self.areas)
    }

    fn rehash(&mut self) {
        self.hash = hash_areas(&self.areas);
    }
}

/// Canonical string for `areas`: sorted, one `x,y,radius,flag` record per
/// area, joined with `;`.
#[must_use]
pub fn canonical_string(areas: &[RevealedArea]) -> String {
    let mut sorted: Vec<&RevealedArea> = areas.iter().collect();
    sorted.sort_by(|a, b| a.canonical_cmp(b));
    sorted
        .iter()
        .map(|a| format!("{},{},{},{}", a.x, a.y, a.radius, u8::from(a.is_grid_cell)))
        .collect::<Vec<_>>()
        .join(";")
}

/// Lowercase hex SHA-256 of [`canonical_string`].
#[must_use]
pub fn hash_areas(areas: &[RevealedArea]) -> String {
    format!("{:x}", Sha256::digest(canonical_string(areas).as_bytes()))
}
