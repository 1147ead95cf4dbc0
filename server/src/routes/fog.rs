//! Fog snapshot, batch edit and hash routes.

#[cfg(test)]
#[path = "fog_test.rs"]
mod fog_test;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use mapview::fog::RevealedArea;
use wire::{FogHash, FogSnapshot};

use crate::services::fog::{self, FogError};
use crate::state::AppState;

/// `GET /api/fog/{map}`: current snapshot (empty for an unknown map).
pub async fn get_fog(State(state): State<AppState>, Path(map): Path<String>) -> Json<FogSnapshot> {
    Json(fog::snapshot(&state, &map).await)
}

/// `POST /api/fog/{map}`: replace the snapshot.
pub async fn replace_fog(
    State(state): State<AppState>,
    Path(map): Path<String>,
    Json(body): Json<FogSnapshot>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let count = fog::replace(&state, &map, body.revealed_areas)
        .await
        .map_err(fog_error_to_status)?;
    Ok(Json(serde_json::json!({ "ok": true, "count": count })))
}

/// `POST /api/fog/{map}/reveal-batch`: erase fog over each area.
pub async fn reveal_batch(
    State(state): State<AppState>,
    Path(map): Path<String>,
    Json(areas): Json<Vec<RevealedArea>>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let added = fog::reveal_batch(&state, &map, &areas)
        .await
        .map_err(fog_error_to_status)?;
    Ok(Json(serde_json::json!({ "ok": true, "added": added })))
}

/// `POST /api/fog/{map}/hide-batch`: paint fog back over each region.
pub async fn hide_batch(
    State(state): State<AppState>,
    Path(map): Path<String>,
    Json(regions): Json<Vec<RevealedArea>>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let removed = fog::hide_batch(&state, &map, &regions)
        .await
        .map_err(fog_error_to_status)?;
    Ok(Json(serde_json::json!({ "ok": true, "removed": removed })))
}

/// `POST /api/fog/{map}/reset`
pub async fn reset_fog(
    State(state): State<AppState>,
    Path(map): Path<String>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    fog::reset(&state, &map).await.map_err(fog_error_to_status)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// `GET /api/fog-states/{map}/hash`: change token for pollers.
pub async fn fog_hash(State(state): State<AppState>, Path(map): Path<String>) -> Json<FogHash> {
    Json(fog::hash(&state, &map).await)
}

pub(crate) fn fog_error_to_status(err: FogError) -> StatusCode {
    match err {
        FogError::EmptyMapName | FogError::InvalidArea { .. } => StatusCode::BAD_REQUEST,
    }
}
