//! Bearer-token authentication for the JSON gateway.
//!
//! Requests without an `Authorization` header pass through anonymously and
//! the services decide whether that is acceptable. A header that is present
//! must carry a valid ACCESS token; the claims are then stored in the
//! request extensions.

use crate::auth::{TokenType, TokenVerifier};
use crate::errors::LendingError;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use common::jwt::{bearer_token, MAX_JWT_SIZE_BYTES};
use std::sync::Arc;
use tracing::instrument;

#[derive(Clone)]
pub struct AuthState {
    pub verifier: Arc<TokenVerifier>,
}

#[instrument(skip_all, name = "lending.middleware.auth")]
pub async fn optional_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, LendingError> {
    let Some(header) = req.headers().get(AUTHORIZATION) else {
        return Ok(next.run(req).await);
    };

    let token = header
        .to_str()
        .ok()
        .and_then(bearer_token)
        .ok_or_else(|| {
            tracing::debug!(target: "lending.middleware.auth", "Invalid Authorization header format");
            LendingError::InvalidToken("invalid authorization format".to_string())
        })?;

    if token.len() > MAX_JWT_SIZE_BYTES {
        return Err(LendingError::InvalidToken("token too large".to_string()));
    }

    let claims = state.verifier.verify(token, TokenType::Access).await?;
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}
