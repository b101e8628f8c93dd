//! Health check route.

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::db;
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    database: bool,
}

/// Liveness/readiness probe.
///
/// GET /health
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = db::check_health(state.db()).await;

    Json(HealthResponse {
        status: if database { "ok" } else { "degraded" },
        database,
    })
}

/// Create the health router.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
