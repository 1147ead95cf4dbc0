mod routes;
mod services;
mod state;

use services::persistence::env_parse;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DATA_DIR: &str = "./data";

#[tokio::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let port: u16 = env_parse("PORT", DEFAULT_PORT);
    let data_dir = std::env::var("FOGMAP_DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.into());
    tokio::fs::create_dir_all(&data_dir).await?;

    let state = state::AppState::new(&data_dir);

    // Spawn background persistence task.
    let _persistence = services::persistence::spawn_persistence_task(state.clone());

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;

    tracing::info!(%port, %data_dir, "fogmap store listening");
    axum::serve(listener, app).await
}
