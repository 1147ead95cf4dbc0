//! Shared numeric constants for the map view crate.

// ── Transform ───────────────────────────────────────────────────

/// Smallest zoom factor a navigation command may set (10 %).
pub const ZOOM_MIN: f64 = 0.1;

/// Largest zoom factor a navigation command may set (500 %).
pub const ZOOM_MAX: f64 = 5.0;

/// Default zoom step for `zoom in` / `zoom out`, in percent.
pub const DEFAULT_ZOOM_STEP_PERCENT: u32 = 5;

/// Default preview pan step in screen pixels, before the `1/zoom` scaling.
pub const DEFAULT_PAN_STEP_PX: f64 = 100.0;

/// Default quarter turn applied by `rotatePreview` when no angle is given.
pub const DEFAULT_PREVIEW_ROTATE_DEG: f64 = 90.0;

// ── Grid ────────────────────────────────────────────────────────

/// Distance outside the map, in image pixels, still accepted by cell lookup.
pub const EDGE_TOLERANCE_PX: f64 = 5.0;

/// Inset applied to the right/bottom edge when clamping into `[0, W)`.
pub const EDGE_CLAMP_INSET_PX: f64 = 0.01;

/// Default brush size (N×N cells).
pub const DEFAULT_BRUSH_SIZE: u32 = 3;

/// Default grid line width in image pixels.
pub const DEFAULT_GRID_LINE_WIDTH: f64 = 1.0;

// ── Fog ─────────────────────────────────────────────────────────

/// Radius used by freehand reveal/hide when the caller gives none.
pub const DEFAULT_FREEHAND_RADIUS: f64 = 20.0;

/// Extra reach of a freehand hide region beyond its radius.
pub const HIDE_TOLERANCE_PX: f64 = 10.0;

/// Snapshot size above which the store compacts near-duplicate areas.
pub const COMPACT_THRESHOLD: usize = 1000;

/// Centre/radius distance under which two areas count as near-duplicates.
pub const COMPACT_PROXIMITY_PX: f64 = 3.0;

/// GM fog opacity when no appearance settings are stored.
pub const DEFAULT_GM_FOG_OPACITY: f64 = 0.7;

/// Default fog colour (`#000000`).
pub const DEFAULT_FOG_COLOR: &str = "#000000";
