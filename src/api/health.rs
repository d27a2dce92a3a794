//! Health check endpoints

use axum::{Json, Router, routing::get};
use serde::Serialize;

/// Banner served at `/`
pub const BANNER: &str = "Cozmo AI Backend is running!";

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

async fn banner() -> &'static str {
    BANNER
}

/// Liveness probe
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `/` and `/health`
pub fn router() -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/health", get(health))
}
