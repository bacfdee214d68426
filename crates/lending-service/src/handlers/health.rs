//! Liveness and readiness endpoints.

use crate::routes::AppState;
use axum::{extract::State, http::StatusCode};
use std::sync::Arc;
use tracing::instrument;

/// GET /health
///
/// 200 while the process is serving, regardless of dependencies or
/// shutdown state.
pub async fn liveness() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

/// GET /ready
///
/// 200 once startup finished and the database answers; 503 otherwise, so
/// the instance is taken out of rotation without being restarted.
#[instrument(skip_all, name = "lending.health.ready")]
pub async fn readiness(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    if !state.health.is_ready() {
        return (StatusCode::SERVICE_UNAVAILABLE, "NOT READY");
    }

    match state.ledger.ping().await {
        Ok(()) => (StatusCode::OK, "READY"),
        Err(e) => {
            tracing::warn!(target: "lending.health", error = %e, "Database ping failed");
            (StatusCode::SERVICE_UNAVAILABLE, "DATABASE UNAVAILABLE")
        }
    }
}
