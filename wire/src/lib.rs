//! Shared JSON wire model for the map store.
//!
//! This crate owns the request and response bodies used by both `server` and
//! `session`. Engine types that already carry serde derives
//! ([`RevealedArea`], [`ViewportDescriptor`]) are reused directly; everything
//! else gets a DTO here so the engine stays free of wire concerns.
//!
//! Navigation commands travel as a loose envelope (`{action, direction?,
//! step?, value?, rotation?, degrees?}`) and are decoded into the typed
//! [`NavigationCommand`] with [`decode_command`].

pub mod routes;

use mapview::camera::Camera;
use mapview::consts::{DEFAULT_PREVIEW_ROTATE_DEG, DEFAULT_ZOOM_STEP_PERCENT};
use mapview::grid::{GridConfig, GridError};
use mapview::nav::{Direction, NavigationCommand, ZoomCommand};
use serde::{Deserialize, Serialize};

pub use mapview::fog::RevealedArea;
pub use mapview::viewport::ViewportDescriptor;

/// Error returned by [`decode_command`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("unknown navigation action: {0}")]
    UnknownAction(String),
    #[error("unknown direction {direction:?} for {action}")]
    UnknownDirection { action: &'static str, direction: String },
    #[error("{action} command is missing `{field}`")]
    MissingField { action: &'static str, field: &'static str },
    #[error("invalid number in `{field}`: {raw}")]
    InvalidNumber { field: &'static str, raw: String },
    #[error("malformed command envelope: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// FOG
// =============================================================================

/// Full fog snapshot for one map.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FogSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_name: Option<String>,
    #[serde(default)]
    pub revealed_areas: Vec<RevealedArea>,
}

impl FogSnapshot {
    #[must_use]
    pub fn new(map_name: impl Into<String>, revealed_areas: Vec<RevealedArea>) -> Self {
        Self { map_name: Some(map_name.into()), revealed_areas }
    }
}

/// Change token returned by the hash endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FogHash {
    pub hash: String,
}

// =============================================================================
// GRID
// =============================================================================

/// Persisted grid calibration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridConfigDto {
    pub grid_size: f64,
    #[serde(default)]
    pub offset_x: f64,
    #[serde(default)]
    pub offset_y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_width: Option<f64>,
    #[serde(default = "default_true")]
    pub calibrated: bool,
}

fn default_true() -> bool {
    true
}

impl GridConfigDto {
    /// Validate into an engine config.
    ///
    /// # Errors
    ///
    /// Returns [`GridError`] when the stored cell size is unusable.
    pub fn to_config(&self) -> Result<GridConfig, GridError> {
        Ok(GridConfig::new(self.grid_size, self.offset_x, self.offset_y)?
            .with_line_width(self.line_width.unwrap_or_default())
            .with_calibrated(self.calibrated))
    }
}

impl From<&GridConfig> for GridConfigDto {
    fn from(config: &GridConfig) -> Self {
        Self {
            grid_size: config.cell_size(),
            offset_x: config.offset_x(),
            offset_y: config.offset_y(),
            line_width: Some(config.line_width()),
            calibrated: config.is_calibrated(),
        }
    }
}

// =============================================================================
// SETTINGS
// =============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PanOffset {
    pub x: f64,
    pub y: f64,
}

/// Per-map transform and appearance. Every field is optional.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoom: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pan_offset: Option<PanOffset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fog_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fog_opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_viewport_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_viewport_visible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_visible: Option<bool>,
}

impl MapSettings {
    /// Camera described by these settings; missing fields use defaults.
    #[must_use]
    pub fn camera(&self) -> Camera {
        let pan = self.pan_offset.unwrap_or_default();
        Camera::new(pan.x, pan.y, self.zoom.unwrap_or(1.0), self.rotation.unwrap_or(0.0))
    }

    /// Overwrite the transform fields from `camera`, keeping appearance.
    pub fn set_camera(&mut self, camera: &Camera) {
        self.rotation = Some(camera.rotation_deg);
        self.zoom = Some(camera.zoom);
        self.pan_offset = Some(PanOffset { x: camera.pan_x, y: camera.pan_y });
    }
}

// =============================================================================
// CHARACTERS
// =============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerToken {
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EnemyToken {
    pub x: f64,
    pub y: f64,
    pub letter: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Characters {
    #[serde(default)]
    pub players: Vec<PlayerToken>,
    #[serde(default)]
    pub enemies: Vec<EnemyToken>,
}

/// Token positions and colours for one map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterData {
    #[serde(default)]
    pub characters: Characters,
    #[serde(default)]
    pub enemy_letter_counter: u32,
    #[serde(default = "default_player_color")]
    pub player_color: String,
    #[serde(default = "default_enemy_color")]
    pub enemy_color: String,
}

fn default_player_color() -> String {
    "#00ff00".to_owned()
}

fn default_enemy_color() -> String {
    "#ff0000".to_owned()
}

impl Default for CharacterData {
    fn default() -> Self {
        Self {
            characters: Characters::default(),
            enemy_letter_counter: 0,
            player_color: default_player_color(),
            enemy_color: default_enemy_color(),
        }
    }
}

// =============================================================================
// PREVIEW
// =============================================================================

/// Body of `POST preview-map/viewport-frame`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportFrameToggle {
    pub enabled: bool,
}

/// Response of `GET preview-map/refresh`. Reading consumes the flag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshFlag {
    pub refresh: bool,
}

/// Snapshot of the preview session slots.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewStatus {
    pub map_name: Option<String>,
    pub viewport_frame_enabled: bool,
    pub refresh_requested: bool,
    pub pending_command: bool,
}

/// A rotation that may arrive as a number or a numeric string.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Degrees {
    Number(f64),
    Text(String),
}

impl Degrees {
    fn parse(&self, field: &'static str) -> Result<f64, CodecError> {
        let value = match self {
            Self::Number(v) => *v,
            Self::Text(raw) => raw
                .trim()
                .parse::<f64>()
                .map_err(|_| CodecError::InvalidNumber { field, raw: raw.clone() })?,
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(CodecError::InvalidNumber { field, raw: value.to_string() })
        }
    }
}

/// Loose JSON form of a navigation command. `{}` means "no command".
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NavEnvelope {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Degrees>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degrees: Option<f64>,
}

impl NavEnvelope {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.action.is_empty()
    }
}

/// Encode a typed command into its envelope.
#[must_use]
pub fn encode_command(command: &NavigationCommand) -> NavEnvelope {
    let mut env = NavEnvelope::default();
    match *command {
        NavigationCommand::Pan { direction } => {
            env.action = "pan".to_owned();
            env.direction = Some(direction.name().to_owned());
        }
        NavigationCommand::Zoom(zoom) => {
            env.action = "zoom".to_owned();
            match zoom {
                ZoomCommand::In { step_percent } => {
                    env.direction = Some("in".to_owned());
                    env.step = Some(step_percent);
                }
                ZoomCommand::Out { step_percent } => {
                    env.direction = Some("out".to_owned());
                    env.step = Some(step_percent);
                }
                ZoomCommand::Set { zoom } => {
                    env.direction = Some("set".to_owned());
                    env.value = Some(zoom);
                }
            }
        }
        NavigationCommand::Rotate { degrees } => {
            env.action = "rotate".to_owned();
            env.rotation = Some(Degrees::Number(degrees));
        }
        NavigationCommand::RotatePreview { degrees } => {
            env.action = "rotatePreview".to_owned();
            env.degrees = Some(degrees);
        }
        NavigationCommand::Center => env.action = "center".to_owned(),
        NavigationCommand::Reload => env.action = "reload-page".to_owned(),
    }
    env
}

/// Decode an envelope. An empty envelope decodes to `Ok(None)`.
///
/// # Errors
///
/// Returns [`CodecError`] for an unknown action or direction, or a command
/// missing a required field.
pub fn decode_command(env: &NavEnvelope) -> Result<Option<NavigationCommand>, CodecError> {
    if env.is_empty() {
        return Ok(None);
    }
    let direction = env.direction.as_deref().unwrap_or_default();
    let command = match env.action.as_str() {
        "pan" => {
            let direction = Direction::from_name(direction).ok_or_else(|| CodecError::UnknownDirection {
                action: "pan",
                direction: direction.to_owned(),
            })?;
            NavigationCommand::Pan { direction }
        }
        "zoom" => {
            let step_percent = env.step.filter(|s| *s > 0).unwrap_or(DEFAULT_ZOOM_STEP_PERCENT);
            let zoom = match direction {
                "in" => ZoomCommand::In { step_percent },
                "out" => ZoomCommand::Out { step_percent },
                "set" => ZoomCommand::Set {
                    zoom: env.value.ok_or(CodecError::MissingField { action: "zoom", field: "value" })?,
                },
                other => {
                    return Err(CodecError::UnknownDirection { action: "zoom", direction: other.to_owned() });
                }
            };
            NavigationCommand::Zoom(zoom)
        }
        "rotate" => {
            let degrees = env
                .rotation
                .as_ref()
                .ok_or(CodecError::MissingField { action: "rotate", field: "rotation" })?
                .parse("rotation")?;
            NavigationCommand::Rotate { degrees }
        }
        "rotatePreview" => NavigationCommand::RotatePreview {
            degrees: env.degrees.filter(|d| d.abs() > f64::EPSILON).unwrap_or(DEFAULT_PREVIEW_ROTATE_DEG),
        },
        "center" => NavigationCommand::Center,
        "reload-page" => NavigationCommand::Reload,
        other => return Err(CodecError::UnknownAction(other.to_owned())),
    };
    Ok(Some(command))
}

/// Parse and decode a raw JSON body.
///
/// # Errors
///
/// Returns [`CodecError::Json`] for malformed JSON, otherwise as
/// [`decode_command`].
pub fn decode_command_json(body: &str) -> Result<Option<NavigationCommand>, CodecError> {
    let env: NavEnvelope = serde_json::from_str(body)?;
    decode_command(&env)
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
