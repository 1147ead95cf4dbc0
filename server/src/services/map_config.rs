//! Per-map configuration: grid calibration, settings and token positions.
//!
//! Each section is stored whole; a POST replaces it, a DELETE clears it.
//! Grid configs are validated with the same rules the client calibration
//! uses, so a stored grid always builds a `GridIndex`.

#[cfg(test)]
#[path = "map_config_test.rs"]
mod map_config_test;

use mapview::grid::GridError;
use tracing::info;
use wire::{CharacterData, GridConfigDto, MapSettings};

use crate::services::persistence;
use crate::state::{AppState, MapRecord, Section};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("map name is empty")]
    EmptyMapName,
    #[error("invalid grid config: {0}")]
    InvalidGrid(#[from] GridError),
    #[error("no {0} stored for map")]
    NotFound(&'static str),
}

async fn read<T>(state: &AppState, map: &str, get: impl FnOnce(&MapRecord) -> Option<T>) -> Option<T> {
    persistence::load_existing(state, map).await;
    state.maps.read().await.get(map).and_then(get)
}

async fn write(
    state: &AppState,
    map: &str,
    section: Section,
    set: impl FnOnce(&mut MapRecord) -> bool,
) -> Result<bool, ConfigError> {
    if map.trim().is_empty() {
        return Err(ConfigError::EmptyMapName);
    }
    persistence::ensure_loaded(state, map).await;
    let mut maps = state.maps.write().await;
    let record = maps.entry(map.to_owned()).or_default();
    let changed = set(record);
    if changed {
        record.touch(section);
    }
    Ok(changed)
}

// =============================================================================
// GRID
// =============================================================================

pub async fn grid(state: &AppState, map: &str) -> Option<GridConfigDto> {
    read(state, map, |r| r.grid.clone()).await
}

/// # Errors
///
/// Rejects an empty map name or a grid that fails calibration rules.
pub async fn save_grid(state: &AppState, map: &str, dto: GridConfigDto) -> Result<(), ConfigError> {
    let config = dto.to_config()?;
    let normalised = GridConfigDto::from(&config);
    write(state, map, Section::Grid, |r| {
        r.grid = Some(normalised);
        true
    })
    .await?;
    info!(%map, cell = config.cell_size(), "grid config saved");
    Ok(())
}

/// # Errors
///
/// `NotFound` when no grid was stored.
pub async fn clear_grid(state: &AppState, map: &str) -> Result<(), ConfigError> {
    let cleared = write(state, map, Section::Grid, |r| r.grid.take().is_some()).await?;
    if !cleared {
        return Err(ConfigError::NotFound("grid config"));
    }
    info!(%map, "grid config cleared");
    Ok(())
}

// =============================================================================
// SETTINGS
// =============================================================================

pub async fn settings(state: &AppState, map: &str) -> Option<MapSettings> {
    read(state, map, |r| r.settings.clone()).await
}

/// # Errors
///
/// Rejects an empty map name.
pub async fn save_settings(state: &AppState, map: &str, settings: MapSettings) -> Result<(), ConfigError> {
    write(state, map, Section::Settings, |r| {
        r.settings = Some(settings);
        true
    })
    .await
    .map(drop)
}

/// # Errors
///
/// `NotFound` when no settings were stored.
pub async fn clear_settings(state: &AppState, map: &str) -> Result<(), ConfigError> {
    let cleared = write(state, map, Section::Settings, |r| r.settings.take().is_some()).await?;
    if cleared { Ok(()) } else { Err(ConfigError::NotFound("settings")) }
}

// =============================================================================
// CHARACTERS
// =============================================================================

/// Stored tokens, or the empty defaults.
pub async fn characters(state: &AppState, map: &str) -> CharacterData {
    read(state, map, |r| r.characters.clone()).await.unwrap_or_default()
}

/// # Errors
///
/// Rejects an empty map name.
pub async fn save_characters(state: &AppState, map: &str, data: CharacterData) -> Result<(), ConfigError> {
    write(state, map, Section::Characters, |r| {
        r.characters = Some(data);
        true
    })
    .await
    .map(drop)
}
