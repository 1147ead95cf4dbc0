//! Grid config, settings and character routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use wire::{CharacterData, GridConfigDto, MapSettings};

use crate::services::map_config::{self, ConfigError};
use crate::state::AppState;

fn ok() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

/// `GET /api/grid-configs/{map}`: 404 when the map has no grid.
pub async fn get_grid(
    State(state): State<AppState>,
    Path(map): Path<String>,
) -> Result<Json<GridConfigDto>, StatusCode> {
    map_config::grid(&state, &map).await.map(Json).ok_or(StatusCode::NOT_FOUND)
}

/// `POST /api/grid-configs/{map}`
pub async fn save_grid(
    State(state): State<AppState>,
    Path(map): Path<String>,
    Json(body): Json<GridConfigDto>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    map_config::save_grid(&state, &map, body)
        .await
        .map_err(config_error_to_status)?;
    Ok(ok())
}

/// `DELETE /api/grid-configs/{map}`
pub async fn delete_grid(
    State(state): State<AppState>,
    Path(map): Path<String>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    map_config::clear_grid(&state, &map).await.map_err(config_error_to_status)?;
    Ok(ok())
}

/// `GET /api/settings/{map}`: 404 when nothing was saved.
pub async fn get_settings(
    State(state): State<AppState>,
    Path(map): Path<String>,
) -> Result<Json<MapSettings>, StatusCode> {
    map_config::settings(&state, &map).await.map(Json).ok_or(StatusCode::NOT_FOUND)
}

/// `POST /api/settings/{map}`
pub async fn save_settings(
    State(state): State<AppState>,
    Path(map): Path<String>,
    Json(body): Json<MapSettings>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    map_config::save_settings(&state, &map, body)
        .await
        .map_err(config_error_to_status)?;
    Ok(ok())
}

/// `DELETE /api/settings/{map}`
pub async fn delete_settings(
    State(state): State<AppState>,
    Path(map): Path<String>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    map_config::clear_settings(&state, &map)
        .await
        .map_err(config_error_to_status)?;
    Ok(ok())
}

/// `GET /api/characters/{map}`: always answers, with empty defaults.
pub async fn get_characters(State(state): State<AppState>, Path(map): Path<String>) -> Json<CharacterData> {
    Json(map_config::characters(&state, &map).await)
}

/// `POST /api/characters/{map}`
pub async fn save_characters(
    State(state): State<AppState>,
    Path(map): Path<String>,
    Json(body): Json<CharacterData>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    map_config::save_characters(&state, &map, body)
        .await
        .map_err(config_error_to_status)?;
    Ok(ok())
}

pub(crate) fn config_error_to_status(err: ConfigError) -> StatusCode {
    match err {
        ConfigError::EmptyMapName | ConfigError::InvalidGrid(_) => StatusCode::BAD_REQUEST,
        ConfigError::NotFound(_) => StatusCode::NOT_FOUND,
    }
}
