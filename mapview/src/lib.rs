//! Map view engine for the fog-of-war tabletop tool.
//!
//! This crate holds every piece of the GM console and the player preview that
//! is pure computation: converting pointer coordinates into map-image
//! coordinates under pan/zoom/rotation, calibrating a grid and resolving cells,
//! expanding a brush into a block of cells, mutating the revealed-area set, and
//! remapping navigation commands into a rotated preview's frame. Nothing here
//! performs I/O; the `session` crate drives these types from its runtime loops
//! and persists the results.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`camera`] | Pan/zoom/rotation transform and the screen ↔ image conversions |
//! | [`map`] | Map descriptor (name and pixel size) |
//! | [`grid`] | Grid calibration, cell lookup, and brush expansion |
//! | [`fog`] | Revealed-area set, paint/erase semantics, and the change hash |
//! | [`nav`] | Navigation commands and rotation-aware direction remapping |
//! | [`viewport`] | Visible-rectangle telemetry computed from the transform |
//! | [`render`] | Fog mask planning (hard squares vs. soft circles) and grid lines |
//! | [`consts`] | Shared numeric constants |

pub mod camera;
pub mod consts;
pub mod fog;
pub mod grid;
pub mod map;
pub mod nav;
pub mod render;
pub mod viewport;
