#[cfg(test)]
#[path = "camera_test.rs"]
mod camera_test;

use serde::{Deserialize, Serialize};

use crate::consts::{ZOOM_MAX, ZOOM_MIN};

/// A point in either screen or image space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    #[must_use]
    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// True unless both sides are strictly positive (NaN counts as empty).
    #[must_use]
    pub fn is_empty(self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// Layout of the image wrapper inside the viewing container.
///
/// The wrapper has the image's size and is centred in the container, so its
/// top-left sits at `(container - image) / 2`. It may be negative when the
/// image is larger than the container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stage {
    pub container: Size,
    pub image: Size,
}

impl Stage {
    #[must_use]
    pub fn new(container: Size, image: Size) -> Self {
        Self { container, image }
    }

    /// Zero-size container or no image loaded.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.container.is_empty() || self.image.is_empty()
    }

    /// Top-left of the image wrapper in container coordinates.
    #[must_use]
    pub fn wrapper_offset(&self) -> Point {
        Point {
            x: (self.container.width - self.image.width) / 2.0,
            y: (self.container.height - self.image.height) / 2.0,
        }
    }

    /// Transform origin: the container centre re-expressed in wrapper-local space.
    #[must_use]
    pub fn origin(&self) -> Point {
        let offset = self.wrapper_offset();
        Point {
            x: self.container.width / 2.0 - offset.x,
            y: self.container.height / 2.0 - offset.y,
        }
    }
}

/// Camera state for pan/zoom/rotation of the map image.
///
/// `pan_x` / `pan_y` are in CSS pixels and applied before scaling.
/// `zoom` is a scale factor (1.0 = no zoom).
/// `rotation_deg` is clockwise and kept in `[0, 360)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub pan_x: f64,
    pub pan_y: f64,
    pub zoom: f64,
    pub rotation_deg: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self { pan_x: 0.0, pan_y: 0.0, zoom: 1.0, rotation_deg: 0.0 }
    }
}

/// CSS rendering of a camera: `transform-origin` plus the `transform` list.
#[derive(Debug, Clone, PartialEq)]
pub struct CssTransform {
    pub origin: Point,
    pub transform: String,
}

impl Camera {
    /// Build a camera, normalising rotation and rejecting a non-positive zoom.
    #[must_use]
    pub fn new(pan_x: f64, pan_y: f64, zoom: f64, rotation_deg: f64) -> Self {
        let mut camera = Self { pan_x, pan_y, ..Self::default() };
        camera.set_zoom(zoom);
        camera.set_rotation(rotation_deg);
        camera
    }

    /// Set an absolute rotation, normalised into `[0, 360)`.
    pub fn set_rotation(&mut self, deg: f64) {
        self.rotation_deg = normalize_degrees(deg);
    }

    /// Rotate relative to the current angle.
    pub fn rotate_by(&mut self, delta_deg: f64) {
        self.set_rotation(self.rotation_deg + delta_deg);
    }

    /// Set zoom, clamped to the supported range. Non-finite or non-positive
    /// values leave the zoom unchanged.
    pub fn set_zoom(&mut self, zoom: f64) {
        if zoom.is_finite() && zoom > 0.0 {
            self.zoom = zoom.clamp(ZOOM_MIN, ZOOM_MAX);
        }
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.pan_x += dx;
        self.pan_y += dy;
    }

    /// Reset pan so the image is centred in the container again.
    pub fn center(&mut self) {
        self.pan_x = 0.0;
        self.pan_y = 0.0;
    }

    fn is_usable(&self) -> bool {
        self.zoom.is_finite() && self.zoom > 0.0
    }

    /// Convert an image-space point to container (screen) coordinates.
    ///
    /// Returns `None` for a degenerate stage or an unusable zoom.
    #[must_use]
    pub fn model_to_screen(&self, stage: &Stage, model: Point) -> Option<Point> {
        if stage.is_degenerate() || !self.is_usable() {
            return None;
        }
        let origin = stage.origin();
        let offset = stage.wrapper_offset();
        let local = Point::new(model.x - origin.x, model.y - origin.y);
        let scaled = Point::new(local.x * self.zoom, local.y * self.zoom);
        let rotated = rotate(scaled, self.rotation_deg);
        Some(Point {
            x: rotated.x + origin.x + self.pan_x + offset.x,
            y: rotated.y + origin.y + self.pan_y + offset.y,
        })
    }

    /// Convert a container (screen) point to image-space coordinates.
    ///
    /// Exact inverse of [`Camera::model_to_screen`]: subtract pan, shift by
    /// `-origin`, rotate by `-rotation`, divide by zoom, shift by `+origin`.
    #[must_use]
    pub fn screen_to_model(&self, stage: &Stage, screen: Point) -> Option<Point> {
        if stage.is_degenerate() || !self.is_usable() {
            return None;
        }
        let origin = stage.origin();
        let offset = stage.wrapper_offset();
        let x = screen.x - offset.x - self.pan_x - origin.x;
        let y = screen.y - offset.y - self.pan_y - origin.y;
        let unrotated = rotate(Point::new(x, y), -self.rotation_deg);
        Some(Point {
            x: unrotated.x / self.zoom + origin.x,
            y: unrotated.y / self.zoom + origin.y,
        })
    }

    /// Convert a screen-space distance (pixels) to image-space distance.
    #[must_use]
    pub fn screen_dist_to_model(&self, screen_dist: f64) -> f64 {
        screen_dist / self.zoom
    }

    /// CSS `transform-origin` and `transform` reproducing this camera on the
    /// centred image wrapper. Order is fixed: translate, scale, rotate.
    #[must_use]
    pub fn css_transform(&self, stage: &Stage) -> Option<CssTransform> {
        if stage.is_degenerate() || !self.is_usable() {
            return None;
        }
        let mut transform = format!(
            "translate({}px, {}px) scale({})",
            self.pan_x, self.pan_y, self.zoom
        );
        if self.rotation_deg != 0.0 {
            transform.push_str(&format!(" rotate({}deg)", self.rotation_deg));
        }
        Some(CssTransform { origin: stage.origin(), transform })
    }
}

/// Normalise an angle in degrees into `[0, 360)`. NaN maps to 0.
#[must_use]
pub fn normalize_degrees(deg: f64) -> f64 {
    if !deg.is_finite() {
        return 0.0;
    }
    let r = deg.rem_euclid(360.0);
    // rem_euclid rounds tiny negatives up to exactly 360.0.
    if r >= 360.0 { 0.0 } else { r }
}

/// Rotate `p` clockwise (screen axes, y down) by `deg` about the origin.
fn rotate(p: Point, deg: f64) -> Point {
    if deg == 0.0 {
        return p;
    }
    let (sin, cos) = deg.to_radians().sin_cos();
    Point {
        x: p.x * cos - p.y * sin,
        y: p.x * sin + p.y * cos,
    }
}
