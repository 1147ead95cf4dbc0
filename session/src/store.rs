//! Capability traits the sessions depend on.
//!
//! DESIGN
//! ======
//! Each session component takes only the narrow capability it needs:
//! `SyncEngine` flushes through [`FogStore`], the preview consumes a
//! [`NavigationChannel`], the GM pushes [`ViewportTelemetry`], and map-load
//! reads [`MapConfigStore`]. `HttpBackend` implements all four against the
//! HTTP store; tests substitute in-memory mocks.
//!
//! Not-found is not an error: loaders return `Ok(None)` (or an empty fog)
//! so callers fall back to "no grid" and "fully fogged".

use mapview::fog::RevealedArea;
use mapview::nav::NavigationCommand;
use mapview::viewport::ViewportDescriptor;
use wire::{CharacterData, GridConfigDto, MapSettings, PreviewStatus};

use crate::error::SessionError;

#[async_trait::async_trait]
pub trait FogStore: Send + Sync {
    /// Full snapshot. A missing map yields an empty list.
    async fn load_fog(&self, map: &str) -> Result<Vec<RevealedArea>, SessionError>;
    /// Change token for the stored snapshot.
    async fn fog_hash(&self, map: &str) -> Result<String, SessionError>;
    async fn reveal_batch(&self, map: &str, areas: &[RevealedArea]) -> Result<(), SessionError>;
    async fn hide_batch(&self, map: &str, areas: &[RevealedArea]) -> Result<(), SessionError>;
    async fn reset_fog(&self, map: &str) -> Result<(), SessionError>;
}

#[async_trait::async_trait]
pub trait MapConfigStore: Send + Sync {
    async fn load_grid(&self, map: &str) -> Result<Option<GridConfigDto>, SessionError>;
    async fn save_grid(&self, map: &str, grid: &GridConfigDto) -> Result<(), SessionError>;
    async fn clear_grid(&self, map: &str) -> Result<(), SessionError>;
    async fn load_settings(&self, map: &str) -> Result<Option<MapSettings>, SessionError>;
    async fn save_settings(&self, map: &str, settings: &MapSettings) -> Result<(), SessionError>;
    async fn load_characters(&self, map: &str) -> Result<Option<CharacterData>, SessionError>;
    async fn save_characters(&self, map: &str, data: &CharacterData) -> Result<(), SessionError>;
}

/// Single-slot command queue plus the preview session selection.
#[async_trait::async_trait]
pub trait NavigationChannel: Send + Sync {
    /// Replace whatever command is pending.
    async fn enqueue(&self, command: &NavigationCommand) -> Result<(), SessionError>;
    /// Take the pending command, if any.
    async fn dequeue(&self) -> Result<Option<NavigationCommand>, SessionError>;
    async fn preview_map(&self) -> Result<Option<String>, SessionError>;
    async fn set_preview_map(&self, map: &str) -> Result<(), SessionError>;
    /// Consume the one-shot refresh flag.
    async fn take_refresh(&self) -> Result<bool, SessionError>;
    async fn status(&self) -> Result<PreviewStatus, SessionError>;
}

#[async_trait::async_trait]
pub trait ViewportTelemetry: Send + Sync {
    async fn report(&self, viewport: &ViewportDescriptor) -> Result<(), SessionError>;
    async fn latest(&self) -> Result<Option<ViewportDescriptor>, SessionError>;
    async fn set_frame_enabled(&self, enabled: bool) -> Result<(), SessionError>;
    async fn frame_enabled(&self) -> Result<bool, SessionError>;
}
