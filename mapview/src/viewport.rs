//! Visible-window telemetry.
//!
//! The GM reports which part of the image its container currently shows. The
//! rectangle is computed with rotation ignored; rotation travels as its own
//! scalar so a consumer can apply it independently.

#[cfg(test)]
#[path = "viewport_test.rs"]
mod viewport_test;

use serde::{Deserialize, Serialize};

use crate::camera::{Camera, Point, Stage};

/// Axis-aligned rectangle in image space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    /// Bounding box of `points`, clamped to `[0, max_w] x [0, max_h]`.
    fn bounding_clamped(points: &[Point], max_w: f64, max_h: f64) -> Self {
        let clamp = |p: &Point| Point::new(p.x.clamp(0.0, max_w), p.y.clamp(0.0, max_h));
        let clamped: Vec<Point> = points.iter().map(clamp).collect();
        let min_x = clamped.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
        let min_y = clamped.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        let max_x = clamped.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
        let max_y = clamped.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
        Self { x: min_x, y: min_y, width: max_x - min_x, height: max_y - min_y }
    }
}

/// Image-space rectangle visible through the container, rotation ignored.
#[must_use]
pub fn visible_rect(camera: &Camera, stage: &Stage) -> Option<Rect> {
    let unrotated = Camera { rotation_deg: 0.0, ..*camera };
    let (w, h) = (stage.container.width, stage.container.height);
    let corners = [Point::new(0.0, 0.0), Point::new(w, 0.0), Point::new(w, h), Point::new(0.0, h)];
    let mut model = Vec::with_capacity(corners.len());
    for corner in corners {
        model.push(unrotated.screen_to_model(stage, corner)?);
    }
    Some(Rect::bounding_clamped(&model, stage.image.width, stage.image.height))
}

/// Snapshot of the GM's view, pushed while the viewport frame is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportDescriptor {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub zoom: f64,
    pub rotation: f64,
    pub map_width: f64,
    pub map_height: f64,
    #[serde(default)]
    pub pan_x: f64,
    #[serde(default)]
    pub pan_y: f64,
    #[serde(default)]
    pub container_width: f64,
    #[serde(default)]
    pub container_height: f64,
}

impl ViewportDescriptor {
    /// Capture the current view. `None` when the stage is degenerate.
    #[must_use]
    pub fn capture(camera: &Camera, stage: &Stage) -> Option<Self> {
        let rect = visible_rect(camera, stage)?;
        Some(Self {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            zoom: camera.zoom,
            rotation: camera.rotation_deg,
            map_width: stage.image.width,
            map_height: stage.image.height,
            pan_x: camera.pan_x,
            pan_y: camera.pan_y,
            container_width: stage.container.width,
            container_height: stage.container.height,
        })
    }

    #[must_use]
    pub fn rect(&self) -> Rect {
        Rect { x: self.x, y: self.y, width: self.width, height: self.height }
    }

    /// Usable for drawing: finite, non-negative size, inside a real map.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        [self.x, self.y, self.width, self.height, self.map_width, self.map_height]
            .iter()
            .all(|v| v.is_finite())
            && self.width >= 0.0
            && self.height >= 0.0
            && self.map_width > 0.0
            && self.map_height > 0.0
    }
}
