use crate::models::Jwks;
use crate::routes::AppState;
use axum::{
    extract::State,
    http::header::{HeaderMap, HeaderValue, CACHE_CONTROL},
    Json,
};
use std::sync::Arc;
use tracing::instrument;

/// GET /.well-known/jwks.json
///
/// Public halves of the configured signing keys, derived once at startup.
/// Cacheable for one hour.
#[instrument(name = "lending.jwks.get", skip_all)]
pub async fn get_jwks(State(state): State<Arc<AppState>>) -> (HeaderMap, Json<Jwks>) {
    let mut headers = HeaderMap::new();
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=3600"),
    );

    (headers, Json(state.jwks.clone()))
}
