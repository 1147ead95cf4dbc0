//! Persistence service: lazy hydration and background flush of map records.
//!
//! DESIGN
//! ======
//! Each map section lives in its own JSON file under the data directory
//! (`{stem}_fog.json`, `{stem}_grid.json`, ...), where the stem is the
//! sanitised map name plus a short digest of the raw name. Mutations read a
//! record from disk the first time they touch its map; reads cache it only
//! when something is stored, so polling unknown names allocates nothing. A background task flushes dirty
//! sections, then sleeps before the next cycle. Writes go to a temp file that
//! is renamed into place.
//!
//! ERROR HANDLING
//! ==============
//! Dirty flags are cleared only after successful writes. Repeated writes are
//! acceptable, silent data loss is not. A malformed file is logged and treated
//! as absent so one corrupt section never takes the map down.

use std::path::{Path, PathBuf};
use std::time::Duration;

use mapview::fog::FogState;
use sha2::{Digest, Sha256};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use wire::{CharacterData, FogSnapshot, GridConfigDto, MapSettings};

use crate::state::{AppState, MapRecord, Section};

const DEFAULT_FLUSH_INTERVAL_MS: u64 = 1000;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Spawn the background persistence task. Returns a handle for shutdown.
pub fn spawn_persistence_task(state: AppState) -> JoinHandle<()> {
    let flush_interval_ms = env_parse("FOGMAP_FLUSH_INTERVAL_MS", DEFAULT_FLUSH_INTERVAL_MS).max(1);
    info!(flush_interval_ms, data_dir = %state.data_dir.display(), "map persistence flush configured");
    tokio::spawn(async move {
        loop {
            flush_all_dirty(&state).await;
            tokio::time::sleep(Duration::from_millis(flush_interval_ms)).await;
        }
    })
}

// =============================================================================
// PATHS
// =============================================================================

/// File stem for a map name: the name with unsafe characters replaced by
/// `_`, then `-` and the first 8 bytes of the raw name's SHA-256 in hex.
/// Names that sanitise alike still get distinct files.
#[must_use]
pub fn file_stem(map: &str) -> String {
    let safe: String = map
        .chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ') { c } else { '_' })
        .collect();
    let digest = Sha256::digest(map.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    format!("{safe}-{:016x}", u64::from_be_bytes(prefix))
}

#[must_use]
pub fn section_path(dir: &Path, map: &str, section: Section) -> PathBuf {
    dir.join(format!("{}_{}.json", file_stem(map), section.suffix()))
}

// =============================================================================
// HYDRATION
// =============================================================================

/// Make sure `map` has a record in memory, reading it from disk on first use.
/// For mutations: a map with nothing stored gets an empty record.
pub async fn ensure_loaded(state: &AppState, map: &str) {
    if state.maps.read().await.contains_key(map) {
        return;
    }
    let record = load_record(&state.data_dir, map).await.unwrap_or_default();
    let mut maps = state.maps.write().await;
    // EDGE: another request may have hydrated the map while we were reading.
    maps.entry(map.to_owned()).or_insert(record);
}

/// Read-path hydration: cache the record only when at least one section is
/// stored on disk. Callers treat a missing record as empty.
pub async fn load_existing(state: &AppState, map: &str) {
    if state.maps.read().await.contains_key(map) {
        return;
    }
    let Some(record) = load_record(&state.data_dir, map).await else {
        debug!(%map, "nothing stored for map");
        return;
    };
    let mut maps = state.maps.write().await;
    maps.entry(map.to_owned()).or_insert(record);
}

/// `None` when no section could be read.
async fn load_record(dir: &Path, map: &str) -> Option<MapRecord> {
    let fog = read_section::<FogSnapshot>(dir, map, Section::Fog).await;
    let grid = read_section::<GridConfigDto>(dir, map, Section::Grid).await;
    let settings = read_section::<MapSettings>(dir, map, Section::Settings).await;
    let characters = read_section::<CharacterData>(dir, map, Section::Characters).await;
    if fog.is_none() && grid.is_none() && settings.is_none() && characters.is_none() {
        return None;
    }
    let record = MapRecord {
        fog: fog.map(|s| FogState::from_areas(s.revealed_areas)).unwrap_or_default(),
        grid,
        settings,
        characters,
        ..MapRecord::default()
    };
    info!(%map, areas = record.fog.len(), grid = record.grid.is_some(), "map hydrated");
    Some(record)
}

async fn read_section<T: DeserializeOwned>(dir: &Path, map: &str, section: Section) -> Option<T> {
    let path = section_path(dir, map, section);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "map section unreadable; treating as absent");
            return None;
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "malformed map section; treating as absent");
            None
        }
    }
}

// =============================================================================
// FLUSH
// =============================================================================

/// Serialised contents of one section; `None` removes the file.
#[derive(Debug)]
struct SectionWrite {
    section: Section,
    body: Option<Vec<u8>>,
}

#[derive(Debug)]
struct DirtyFlushBatch {
    map: String,
    revision: u64,
    writes: Vec<SectionWrite>,
}

pub(crate) async fn flush_all_dirty(state: &AppState) {
    // PHASE: SNAPSHOT DIRTY SECTIONS
    // WHY: serialise under lock, then perform file I/O lock-free.
    let batches = {
        let maps = state.maps.read().await;
        let mut collected = Vec::new();
        for (map, record) in maps.iter() {
            if record.dirty.is_empty() {
                continue;
            }
            match snapshot_dirty(record) {
                Ok(writes) => collected.push(DirtyFlushBatch { map: map.clone(), revision: record.revision, writes }),
                Err(e) => error!(%map, error = %e, "map serialisation failed"),
            }
        }
        collected
    };

    // PHASE: WRITE PER MAP + ACK DIRTY SECTIONS
    // WHY: if a write fails we keep the dirty flags for retry.
    for batch in batches {
        match write_sections(&state.data_dir, &batch.map, &batch.writes).await {
            Ok(()) => clear_flushed(state, &batch).await,
            Err(e) => {
                error!(map = %batch.map, error = %e, sections = batch.writes.len(), "persistence flush failed");
            }
        }
    }
}

fn snapshot_dirty(record: &MapRecord) -> Result<Vec<SectionWrite>, PersistenceError> {
    let mut writes = Vec::with_capacity(record.dirty.len());
    for section in Section::ALL {
        if !record.dirty.contains(&section) {
            continue;
        }
        let body = match section {
            Section::Fog => Some(to_json(&FogSnapshot { map_name: None, revealed_areas: record.fog.areas().to_vec() })?),
            Section::Grid => record.grid.as_ref().map(to_json).transpose()?,
            Section::Settings => record.settings.as_ref().map(to_json).transpose()?,
            Section::Characters => record.characters.as_ref().map(to_json).transpose()?,
        };
        writes.push(SectionWrite { section, body });
    }
    Ok(writes)
}

fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>, PersistenceError> {
    Ok(serde_json::to_vec_pretty(value)?)
}

async fn write_sections(dir: &Path, map: &str, writes: &[SectionWrite]) -> Result<(), PersistenceError> {
    tokio::fs::create_dir_all(dir).await?;
    for write in writes {
        let path = section_path(dir, map, write.section);
        match &write.body {
            Some(body) => {
                let tmp = path.with_extension("json.tmp");
                tokio::fs::write(&tmp, body).await?;
                tokio::fs::rename(&tmp, &path).await?;
            }
            None => match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            },
        }
    }
    Ok(())
}

async fn clear_flushed(state: &AppState, batch: &DirtyFlushBatch) {
    let mut maps = state.maps.write().await;
    let Some(record) = maps.get_mut(&batch.map) else {
        return;
    };
    // EDGE: keep dirty flags if the record changed again after the snapshot.
    if record.revision != batch.revision {
        return;
    }
    for write in &batch.writes {
        record.dirty.remove(&write.section);
    }
}

#[cfg(test)]
#[path = "persistence_test.rs"]
mod tests;
