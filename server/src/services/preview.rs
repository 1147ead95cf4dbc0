//! Preview session service: map selection, refresh flag, the single-slot
//! navigation queue and viewport telemetry.
//!
//! DESIGN
//! ======
//! There is exactly one preview display, so all of this lives in one
//! `PreviewSlot` behind its own lock. The navigation slot holds at most one
//! command: enqueue overwrites, dequeue takes. Commands are stored in their
//! envelope form after a decode check, so the slot never holds something the
//! preview cannot apply.

#[cfg(test)]
#[path = "preview_test.rs"]
mod preview_test;

use tracing::{debug, info};
use wire::{NavEnvelope, PreviewStatus, ViewportDescriptor};

use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    #[error("map name is empty")]
    EmptyMapName,
    #[error("invalid navigation command: {0}")]
    InvalidCommand(#[from] wire::CodecError),
    #[error("navigation envelope has no action")]
    EmptyCommand,
    #[error("viewport descriptor is not valid")]
    InvalidViewport,
}

pub async fn map_name(state: &AppState) -> Option<String> {
    state.preview.read().await.map_name.clone()
}

/// Select the map shown on the preview. Also raises the refresh flag.
///
/// # Errors
///
/// Rejects a blank name.
pub async fn set_map_name(state: &AppState, raw: &str) -> Result<(), PreviewError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(PreviewError::EmptyMapName);
    }
    let mut slot = state.preview.write().await;
    slot.map_name = Some(name.to_owned());
    slot.refresh = true;
    info!(map = %name, "preview map selected");
    Ok(())
}

pub async fn request_refresh(state: &AppState) {
    state.preview.write().await.refresh = true;
}

/// Raise the refresh flag when `map` is what the preview shows.
pub async fn request_refresh_if_previewed(state: &AppState, map: &str) {
    let mut slot = state.preview.write().await;
    if slot.map_name.as_deref() == Some(map) {
        slot.refresh = true;
    }
}

/// Read and clear the refresh flag.
pub async fn take_refresh(state: &AppState) -> bool {
    std::mem::take(&mut state.preview.write().await.refresh)
}

/// Put a command in the slot, replacing any unread one.
///
/// # Errors
///
/// Rejects an empty or undecodable envelope.
pub async fn enqueue(state: &AppState, envelope: NavEnvelope) -> Result<(), PreviewError> {
    let Some(command) = wire::decode_command(&envelope)? else {
        return Err(PreviewError::EmptyCommand);
    };
    let mut slot = state.preview.write().await;
    if slot.command.is_some() {
        debug!(?command, "unread navigation command overwritten");
    }
    slot.command = Some(wire::encode_command(&command));
    Ok(())
}

/// Take the queued command; `None` when the slot is empty.
pub async fn dequeue(state: &AppState) -> Option<NavEnvelope> {
    state.preview.write().await.command.take()
}

/// # Errors
///
/// Rejects a descriptor that [`ViewportDescriptor::is_valid`] refuses.
pub async fn report_viewport(state: &AppState, viewport: ViewportDescriptor) -> Result<(), PreviewError> {
    if !viewport.is_valid() {
        return Err(PreviewError::InvalidViewport);
    }
    state.preview.write().await.viewport = Some(viewport);
    Ok(())
}

pub async fn viewport(state: &AppState) -> Option<ViewportDescriptor> {
    state.preview.read().await.viewport
}

/// Toggle the viewport frame. Disabling also drops the last report.
pub async fn set_frame_enabled(state: &AppState, enabled: bool) {
    let mut slot = state.preview.write().await;
    slot.frame_enabled = enabled;
    if !enabled {
        slot.viewport = None;
    }
    info!(enabled, "viewport frame toggled");
}

pub async fn status(state: &AppState) -> PreviewStatus {
    state.preview.read().await.status()
}
