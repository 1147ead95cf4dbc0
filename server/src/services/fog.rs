//! Fog service: snapshot, hash, batch reveal/hide and reset.
//!
//! DESIGN
//! ======
//! Mutations run the same `FogState` rules the GM client applies locally, so
//! once a batch lands the store's hash equals the client's. Every change
//! marks the fog section dirty for the persistence task and, when the map is
//! the one on the preview display, raises the preview refresh flag.

#[cfg(test)]
#[path = "fog_test.rs"]
mod fog_test;

use mapview::consts::COMPACT_THRESHOLD;
use mapview::fog::RevealedArea;
use tracing::{debug, info};
use wire::{FogHash, FogSnapshot};

use crate::services::{persistence, preview};
use crate::state::{AppState, Section};

#[derive(Debug, thiserror::Error)]
pub enum FogError {
    #[error("map name is empty")]
    EmptyMapName,
    #[error("area {index} is not a finite point with positive radius")]
    InvalidArea { index: usize },
}

fn validate(map: &str, areas: &[RevealedArea]) -> Result<(), FogError> {
    if map.trim().is_empty() {
        return Err(FogError::EmptyMapName);
    }
    let bad = areas
        .iter()
        .position(|a| !(a.x.is_finite() && a.y.is_finite() && a.radius.is_finite() && a.radius > 0.0));
    match bad {
        Some(index) => Err(FogError::InvalidArea { index }),
        None => Ok(()),
    }
}

/// Current snapshot; an unknown map is fully fogged.
pub async fn snapshot(state: &AppState, map: &str) -> FogSnapshot {
    persistence::load_existing(state, map).await;
    let maps = state.maps.read().await;
    let areas = maps.get(map).map(|r| r.fog.areas().to_vec()).unwrap_or_default();
    FogSnapshot::new(map, areas)
}

pub async fn hash(state: &AppState, map: &str) -> FogHash {
    persistence::load_existing(state, map).await;
    let maps = state.maps.read().await;
    let hash = maps
        .get(map)
        .map_or_else(|| mapview::fog::hash_areas(&[]), |r| r.fog.hash().to_owned());
    FogHash { hash }
}

/// Replace the whole snapshot.
///
/// # Errors
///
/// Rejects an empty map name or a malformed area.
pub async fn replace(state: &AppState, map: &str, areas: Vec<RevealedArea>) -> Result<usize, FogError> {
    validate(map, &areas)?;
    let count = mutate(state, map, |fog| {
        fog.replace(areas);
        true
    })
    .await;
    info!(%map, count, "fog replaced");
    Ok(count)
}

/// Add every area not already stored. Returns the count added.
///
/// # Errors
///
/// Rejects an empty map name or a malformed area.
pub async fn reveal_batch(state: &AppState, map: &str, areas: &[RevealedArea]) -> Result<usize, FogError> {
    validate(map, areas)?;
    let mut added = 0;
    mutate(state, map, |fog| {
        added = fog.reveal_all(areas);
        added > 0
    })
    .await;
    debug!(%map, requested = areas.len(), added, "reveal batch applied");
    Ok(added)
}

/// Remove every stored area the regions cover. Returns the count removed.
///
/// # Errors
///
/// Rejects an empty map name or a malformed region.
pub async fn hide_batch(state: &AppState, map: &str, regions: &[RevealedArea]) -> Result<usize, FogError> {
    validate(map, regions)?;
    let mut removed = 0;
    mutate(state, map, |fog| {
        removed = fog.hide_all(regions);
        removed > 0
    })
    .await;
    debug!(%map, requested = regions.len(), removed, "hide batch applied");
    Ok(removed)
}

/// # Errors
///
/// Rejects an empty map name.
pub async fn reset(state: &AppState, map: &str) -> Result<(), FogError> {
    validate(map, &[])?;
    mutate(state, map, |fog| {
        let had_any = !fog.is_empty();
        fog.reset();
        had_any
    })
    .await;
    info!(%map, "fog reset");
    Ok(())
}

/// Apply `edit` to the map's fog. When it reports a change, compact, mark
/// dirty and nudge the preview. Returns the resulting area count.
async fn mutate(state: &AppState, map: &str, edit: impl FnOnce(&mut mapview::fog::FogState) -> bool) -> usize {
    persistence::ensure_loaded(state, map).await;
    let (changed, count) = {
        let mut maps = state.maps.write().await;
        let record = maps.entry(map.to_owned()).or_default();
        let changed = edit(&mut record.fog);
        if changed {
            let dropped = record.fog.compact(COMPACT_THRESHOLD);
            if dropped > 0 {
                info!(%map, dropped, remaining = record.fog.len(), "fog compacted");
            }
            record.touch(Section::Fog);
        }
        (changed, record.fog.len())
    };
    if changed {
        preview::request_refresh_if_previewed(state, map).await;
    }
    count
}
