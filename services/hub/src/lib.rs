pub mod config;
pub mod event_bridge;
pub mod http;
pub mod hub;
pub mod presence;
pub mod profile;
pub mod rate_limit;
pub mod router;
pub mod state;
pub mod ws;

pub use config::HubConfig;
pub use state::AppState;

use axum::{
    Router,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/api/v1/stats", get(http::get_stats))
        .fallback(fallback_404)
        .with_state(state)
}

async fn fallback_404() -> impl IntoResponse {
    StatusCode::NOT_FOUND
}

mod health {
    use axum::response::IntoResponse;
    pub async fn healthz() -> impl IntoResponse {
        "ok"
    }
    pub async fn readyz() -> impl IntoResponse {
        "ok"
    }
}
