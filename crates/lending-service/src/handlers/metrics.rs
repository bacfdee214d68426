//! Prometheus scrape endpoint.
//!
//! Unauthenticated. Labels are bounded and carry no user data.

use crate::routes::AppState;
use axum::{extract::State, response::IntoResponse};
use std::sync::Arc;

/// GET /metrics
#[tracing::instrument(skip_all, name = "lending.metrics.scrape")]
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.metrics.render()
}
