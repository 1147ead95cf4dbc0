#[cfg(test)]
#[path = "map_test.rs"]
mod map_test;

use serde::{Deserialize, Serialize};

use crate::camera::Size;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MapError {
    #[error("map name must not be empty")]
    EmptyName,
    #[error("map size must be positive, got {width}x{height}")]
    InvalidSize { width: f64, height: f64 },
}

/// A loaded battle map: its name in the backing store and its pixel size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapDescriptor {
    pub name: String,
    pub width: f64,
    pub height: f64,
}

impl MapDescriptor {
    /// # Errors
    ///
    /// Returns [`MapError`] for an empty name or a non-positive dimension.
    pub fn new(name: impl Into<String>, width: f64, height: f64) -> Result<Self, MapError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(MapError::EmptyName);
        }
        if Size::new(width, height).is_empty() || !width.is_finite() || !height.is_finite() {
            return Err(MapError::InvalidSize { width, height });
        }
        Ok(Self { name, width, height })
    }

    #[must_use]
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// True when `(x, y)` lies inside `[0, W) x [0, H)`.
    #[must_use]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        (0.0..self.width).contains(&x) && (0.0..self.height).contains(&y)
    }
}
