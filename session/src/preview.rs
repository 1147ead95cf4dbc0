//! Preview (player display) session context.
//!
//! The preview keeps its own camera. It never sees the GM's camera; it only
//! consumes relative navigation commands from the single-slot queue, so its
//! rotation, zoom and pan can drift freely from the GM's. Fog is read-only
//! here and follows the store through the hash poll.

#[cfg(test)]
#[path = "preview_test.rs"]
mod preview_test;

use mapview::camera::{Camera, Size, Stage};
use mapview::consts::DEFAULT_FOG_COLOR;
use mapview::fog::{FogState, RevealedArea};
use mapview::map::MapDescriptor;
use mapview::nav::{NavEffect, NavigationCommand};
use mapview::render::{FogLayerPlan, Rgba, hex_to_rgba, plan_fog_layer};
use mapview::viewport::ViewportDescriptor;

use crate::config::SessionConfig;

/// Players always see solid fog.
const PREVIEW_FOG_OPACITY: f64 = 1.0;

#[derive(Debug)]
pub struct PreviewSession {
    map: MapDescriptor,
    camera: Camera,
    stage: Stage,
    fog: FogState,
    known_hash: Option<String>,
    pan_step: f64,
    fog_color: String,
    telemetry: Option<ViewportDescriptor>,
}

impl PreviewSession {
    #[must_use]
    pub fn new(map: MapDescriptor, container: Size, config: &SessionConfig) -> Self {
        let stage = Stage::new(container, map.size());
        Self {
            map,
            camera: Camera::default(),
            stage,
            fog: FogState::new(),
            known_hash: None,
            pan_step: config.pan_step_px,
            fog_color: DEFAULT_FOG_COLOR.to_owned(),
            telemetry: None,
        }
    }

    #[must_use]
    pub fn map(&self) -> &MapDescriptor {
        &self.map
    }

    #[must_use]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    #[must_use]
    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    #[must_use]
    pub fn fog(&self) -> &FogState {
        &self.fog
    }

    pub fn set_fog_color(&mut self, color: impl Into<String>) {
        self.fog_color = color.into();
    }

    /// Apply one dequeued command to this display's own camera.
    pub fn apply_command(&mut self, command: &NavigationCommand) -> NavEffect {
        command.apply(&mut self.camera, self.pan_step)
    }

    /// Replace fog with a fetched snapshot and remember its hash.
    pub fn load_fog(&mut self, areas: Vec<RevealedArea>) {
        self.fog.replace(areas);
        self.known_hash = Some(self.fog.hash().to_owned());
    }

    /// Whether a polled remote hash means the snapshot must be fetched.
    /// Remembers hashes that already match local fog.
    pub fn needs_fetch(&mut self, remote_hash: &str) -> bool {
        if self.known_hash.as_deref() == Some(remote_hash) {
            return false;
        }
        if self.fog.hash() == remote_hash {
            self.known_hash = Some(remote_hash.to_owned());
            return false;
        }
        true
    }

    /// Latest GM viewport. Invalid descriptors are dropped.
    pub fn set_telemetry(&mut self, viewport: Option<ViewportDescriptor>) -> bool {
        let next = viewport.filter(ViewportDescriptor::is_valid);
        let changed = next != self.telemetry;
        self.telemetry = next;
        changed
    }

    #[must_use]
    pub fn telemetry(&self) -> Option<&ViewportDescriptor> {
        self.telemetry.as_ref()
    }

    /// Full-opacity fog layer in the configured colour.
    #[must_use]
    pub fn fog_layer(&self) -> FogLayerPlan {
        let fill = hex_to_rgba(&self.fog_color, PREVIEW_FOG_OPACITY)
            .unwrap_or(Rgba { r: 0, g: 0, b: 0, a: PREVIEW_FOG_OPACITY });
        plan_fog_layer(self.fog.areas(), fill)
    }
}
