//! Navigation commands and rotation-aware direction remapping.
//!
//! The GM issues screen-relative commands ("pan up"). The preview applies
//! them to its own camera, whose rotation may differ from the GM's, so a pan
//! direction is first re-expressed in the preview's frame: one clockwise
//! quarter turn of the direction per quarter turn of rotation.

#[cfg(test)]
#[path = "nav_test.rs"]
mod nav_test;

use crate::camera::{Camera, normalize_degrees};
use crate::consts::{ZOOM_MAX, ZOOM_MIN};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Self::Up, Self::Down, Self::Left, Self::Right];

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
        }
    }

    /// Next direction clockwise.
    #[must_use]
    pub fn clockwise(self) -> Self {
        match self {
            Self::Up => Self::Right,
            Self::Right => Self::Down,
            Self::Down => Self::Left,
            Self::Left => Self::Up,
        }
    }
}

/// Number of clockwise quarter turns nearest to `rotation_deg`, in `0..4`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn quarter_turns(rotation_deg: f64) -> u8 {
    ((normalize_degrees(rotation_deg) / 90.0).round() as u32 % 4) as u8
}

/// Re-express `direction` in the frame of a view rotated by `rotation_deg`.
///
/// Angles that are not a right angle use the nearest quarter turn.
#[must_use]
pub fn remap_direction(direction: Direction, rotation_deg: f64) -> Direction {
    (0..quarter_turns(rotation_deg)).fold(direction, |d, _| d.clockwise())
}

/// Pan delta for `direction` on a view with the given rotation and zoom.
///
/// The step is in screen pixels and divided by zoom, so one command moves the
/// view by the same on-screen distance at any zoom level.
#[must_use]
pub fn pan_delta(direction: Direction, rotation_deg: f64, step: f64, zoom: f64) -> (f64, f64) {
    let s = if zoom.is_finite() && zoom > 0.0 { step / zoom } else { step };
    match remap_direction(direction, rotation_deg) {
        Direction::Up => (0.0, s),
        Direction::Down => (0.0, -s),
        Direction::Left => (s, 0.0),
        Direction::Right => (-s, 0.0),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoomCommand {
    /// Increase by `step_percent` points of percentage.
    In { step_percent: u32 },
    Out { step_percent: u32 },
    /// Absolute zoom factor.
    Set { zoom: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NavigationCommand {
    Pan { direction: Direction },
    Zoom(ZoomCommand),
    /// Absolute rotation, mirroring the GM's.
    Rotate { degrees: f64 },
    /// Rotation relative to the preview's current angle.
    RotatePreview { degrees: f64 },
    Center,
    Reload,
}

/// Outcome of applying a command to a camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavEffect {
    CameraChanged,
    /// The consumer should reload its map and state from the store.
    Reload,
    Ignored,
}

impl NavigationCommand {
    /// Apply to `camera`. `pan_step` is the screen-pixel step for pans.
    pub fn apply(&self, camera: &mut Camera, pan_step: f64) -> NavEffect {
        match *self {
            Self::Pan { direction } => {
                let (dx, dy) = pan_delta(direction, camera.rotation_deg, pan_step, camera.zoom);
                camera.pan_by(dx, dy);
            }
            Self::Zoom(zoom) => return apply_zoom(camera, zoom),
            Self::Rotate { degrees } => {
                if !degrees.is_finite() {
                    return NavEffect::Ignored;
                }
                camera.set_rotation(degrees);
            }
            Self::RotatePreview { degrees } => {
                if !degrees.is_finite() {
                    return NavEffect::Ignored;
                }
                camera.rotate_by(degrees);
            }
            Self::Center => camera.center(),
            Self::Reload => return NavEffect::Reload,
        }
        NavEffect::CameraChanged
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn apply_zoom(camera: &mut Camera, command: ZoomCommand) -> NavEffect {
    let min_percent = (ZOOM_MIN * 100.0).round() as i64;
    let max_percent = (ZOOM_MAX * 100.0).round() as i64;
    let current = (camera.zoom * 100.0).round() as i64;
    let percent = match command {
        ZoomCommand::In { step_percent } => (current + i64::from(step_percent)).min(max_percent),
        ZoomCommand::Out { step_percent } => (current - i64::from(step_percent)).max(min_percent),
        ZoomCommand::Set { zoom } => {
            if !zoom.is_finite() || zoom <= 0.0 {
                return NavEffect::Ignored;
            }
            camera.set_zoom(zoom);
            return NavEffect::CameraChanged;
        }
    };
    camera.set_zoom(percent as f64 / 100.0);
    NavEffect::CameraChanged
}
