//! Preview session routes: selection, refresh flag, navigation slot and
//! viewport telemetry.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use wire::{NavEnvelope, PreviewStatus, RefreshFlag, ViewportDescriptor, ViewportFrameToggle};

use crate::services::preview::{self, PreviewError};
use crate::state::AppState;

fn ok() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

/// `GET /api/preview-map`: selected map name as plain text, 404 when unset.
pub async fn get_map(State(state): State<AppState>) -> Result<String, StatusCode> {
    preview::map_name(&state).await.ok_or(StatusCode::NOT_FOUND)
}

/// `POST /api/preview-map`: plain-text map name.
pub async fn set_map(State(state): State<AppState>, body: String) -> Result<Json<serde_json::Value>, StatusCode> {
    preview::set_map_name(&state, &body)
        .await
        .map_err(preview_error_to_status)?;
    Ok(ok())
}

/// `GET /api/preview-map/refresh`: reading clears the flag.
pub async fn take_refresh(State(state): State<AppState>) -> Json<RefreshFlag> {
    Json(RefreshFlag { refresh: preview::take_refresh(&state).await })
}

/// `POST /api/preview-map/refresh`
pub async fn request_refresh(State(state): State<AppState>) -> Json<serde_json::Value> {
    preview::request_refresh(&state).await;
    ok()
}

/// `GET /api/preview-map/navigation`: take the queued command, `{}` if none.
pub async fn dequeue(State(state): State<AppState>) -> Json<NavEnvelope> {
    Json(preview::dequeue(&state).await.unwrap_or_default())
}

/// `POST /api/preview-map/navigation`: overwrite the slot.
pub async fn enqueue(
    State(state): State<AppState>,
    Json(body): Json<NavEnvelope>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    preview::enqueue(&state, body).await.map_err(preview_error_to_status)?;
    Ok(ok())
}

/// `GET /api/preview-map/viewport`: 404 until a GM reports one.
pub async fn get_viewport(State(state): State<AppState>) -> Result<Json<ViewportDescriptor>, StatusCode> {
    preview::viewport(&state).await.map(Json).ok_or(StatusCode::NOT_FOUND)
}

/// `POST /api/preview-map/viewport`
pub async fn report_viewport(
    State(state): State<AppState>,
    Json(body): Json<ViewportDescriptor>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    preview::report_viewport(&state, body)
        .await
        .map_err(preview_error_to_status)?;
    Ok(ok())
}

/// `POST /api/preview-map/viewport-frame`
pub async fn set_viewport_frame(
    State(state): State<AppState>,
    Json(body): Json<ViewportFrameToggle>,
) -> Json<serde_json::Value> {
    preview::set_frame_enabled(&state, body.enabled).await;
    ok()
}

/// `GET /api/preview-map/status`
pub async fn status(State(state): State<AppState>) -> Json<PreviewStatus> {
    Json(preview::status(&state).await)
}

pub(crate) fn preview_error_to_status(err: PreviewError) -> StatusCode {
    match err {
        PreviewError::EmptyMapName
        | PreviewError::InvalidCommand(_)
        | PreviewError::EmptyCommand
        | PreviewError::InvalidViewport => StatusCode::BAD_REQUEST,
    }
}
