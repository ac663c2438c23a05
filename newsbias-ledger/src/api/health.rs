//! Health check and monitoring endpoints

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::ledger::LedgerStats;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
}

/// GET /health
///
/// Does not require a caller identity.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "newsbias-ledger".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /api/stats
pub async fn get_stats(State(state): State<AppState>) -> Json<LedgerStats> {
    Json(state.ledger.stats().await)
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
