//! orderer-api — HTTP status surface for a running orderer.

pub mod handlers;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

pub use handlers::ApiState;

/// All API routes, nested under `/api`.
pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/status", get(handlers::handle_status))
        .route("/streams", get(handlers::handle_streams))
        .route("/config", get(handlers::handle_config))
        .route("/shutdown", post(handlers::handle_shutdown))
        .with_state(state);

    Router::new().nest("/api", api_routes).layer(cors)
}

pub async fn serve(state: ApiState, listen_addr: &str, port: u16) -> anyhow::Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind((listen_addr, port)).await?;
    tracing::info!(addr = %listen_addr, port, "API listening");
    axum::serve(listener, app).await?;
    Ok(())
}
