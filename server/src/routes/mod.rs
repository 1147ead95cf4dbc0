//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the backing-store endpoints the GM console and the
//! preview display poll. Everything lives under `/api` using the shared
//! `wire::routes` table, so the server and the `reqwest` client can never
//! disagree on a path. `/healthz` sits outside the prefix.

pub mod fog;
pub mod maps;
pub mod preview;


use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use wire::routes;

use crate::state::AppState;

fn api_routes() -> Router<AppState> {
    Router::new()
        .route(routes::FOG, get(fog::get_fog).post(fog::replace_fog))
        .route(routes::FOG_REVEAL_BATCH, post(fog::reveal_batch))
        .route(routes::FOG_HIDE_BATCH, post(fog::hide_batch))
        .route(routes::FOG_RESET, post(fog::reset_fog))
        .route(routes::FOG_HASH, get(fog::fog_hash))
        .route(
            routes::GRID_CONFIG,
            get(maps::get_grid).post(maps::save_grid).delete(maps::delete_grid),
        )
        .route(
            routes::SETTINGS,
            get(maps::get_settings)
                .post(maps::save_settings)
                .delete(maps::delete_settings),
        )
        .route(routes::CHARACTERS, get(maps::get_characters).post(maps::save_characters))
        .route(routes::PREVIEW_MAP, get(preview::get_map).post(preview::set_map))
        .route(
            routes::PREVIEW_REFRESH,
            get(preview::take_refresh).post(preview::request_refresh),
        )
        .route(
            routes::PREVIEW_NAVIGATION,
            get(preview::dequeue).post(preview::enqueue),
        )
        .route(
            routes::PREVIEW_VIEWPORT,
            get(preview::get_viewport).post(preview::report_viewport),
        )
        .route(routes::PREVIEW_VIEWPORT_FRAME, post(preview::set_viewport_frame))
        .route(routes::PREVIEW_STATUS, get(preview::status))
}

/// Full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest(routes::API_PREFIX, api_routes())
        .route(routes::HEALTHZ, get(healthz))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
