//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the data directory, a map of per-map records hydrated lazily
//! from disk, and the single preview session slot. Each record carries a
//! revision counter and a dirty set for debounced persistence.

#[cfg(test)]
#[path = "state_test.rs"]
mod state_test;

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use mapview::fog::FogState;
use tokio::sync::RwLock;
use wire::{CharacterData, GridConfigDto, MapSettings, NavEnvelope, PreviewStatus, ViewportDescriptor};

// =============================================================================
// MAP RECORD
// =============================================================================

/// Independently persisted part of a map record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Fog,
    Grid,
    Settings,
    Characters,
}

impl Section {
    pub const ALL: [Section; 4] = [Section::Fog, Section::Grid, Section::Settings, Section::Characters];

    /// File name suffix under the data directory.
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Fog => "fog",
            Self::Grid => "grid",
            Self::Settings => "settings",
            Self::Characters => "characters",
        }
    }
}

/// Live state for one map. Kept in memory once touched and flushed to JSON
/// files by the persistence task.
#[derive(Debug, Default)]
pub struct MapRecord {
    pub fog: FogState,
    pub grid: Option<GridConfigDto>,
    pub settings: Option<MapSettings>,
    pub characters: Option<CharacterData>,
    /// Sections modified since last flush.
    pub dirty: HashSet<Section>,
    /// Bumped on every mutation; a flush only clears dirty flags if the
    /// revision it wrote is still current.
    pub revision: u64,
}

impl MapRecord {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn touch(&mut self, section: Section) {
        self.dirty.insert(section);
        self.revision += 1;
    }
}

// =============================================================================
// PREVIEW SLOT
// =============================================================================

/// The one preview display's shared slots.
#[derive(Debug, Default)]
pub struct PreviewSlot {
    pub map_name: Option<String>,
    pub refresh: bool,
    /// Single-slot command queue; a new command overwrites an unread one.
    pub command: Option<NavEnvelope>,
    pub viewport: Option<ViewportDescriptor>,
    pub frame_enabled: bool,
}

impl PreviewSlot {
    #[must_use]
    pub fn status(&self) -> PreviewStatus {
        PreviewStatus {
            map_name: self.map_name.clone(),
            viewport_frame_enabled: self.frame_enabled,
            refresh_requested: self.refresh,
            pending_command: self.command.is_some(),
        }
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
#[derive(Clone)]
pub struct AppState {
    pub data_dir: Arc<PathBuf>,
    pub maps: Arc<RwLock<HashMap<String, MapRecord>>>,
    pub preview: Arc<RwLock<PreviewSlot>>,
}

impl AppState {
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: Arc::new(data_dir.into()),
            maps: Arc::new(RwLock::new(HashMap::new())),
            preview: Arc::new(RwLock::new(PreviewSlot::default())),
        }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    static NEXT_DIR: AtomicU32 = AtomicU32::new(0);

    /// Fresh, empty data directory under the system temp dir.
    #[must_use]
    pub fn temp_data_dir() -> PathBuf {
        let n = NEXT_DIR.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!("fogmap-test-{}-{n}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("create temp data dir");
        dir
    }

    /// `AppState` over a fresh temp directory.
    #[must_use]
    pub fn test_app_state() -> AppState {
        AppState::new(temp_data_dir())
    }

    /// Seed an already-hydrated record for `map`.
    pub async fn seed_map(state: &AppState, map: &str, record: MapRecord) {
        state.maps.write().await.insert(map.to_owned(), record);
    }
}
