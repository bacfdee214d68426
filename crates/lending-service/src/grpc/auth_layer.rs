//! gRPC bearer-token authentication.
//!
//! A Tower layer in front of the tonic router. For every call it reads the
//! `authorization` metadata, verifies the token as an ACCESS token and
//! stores the claims in the request extensions as [`ValidatedClaims`].
//!
//! Methods listed as excluded (by bare method name, e.g. `Login`) may be
//! called without a token. When one is supplied anyway it must still be
//! valid, so `Register` can tell an administrator from an anonymous caller.
//!
//! # Security
//!
//! - Tokens larger than 8KB are rejected before parsing
//! - Every failure returns the same UNAUTHENTICATED status

use crate::auth::{Claims, TokenType, TokenVerifier};
use axum::http;
use common::jwt::{bearer_token, MAX_JWT_SIZE_BYTES};
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tonic::body::BoxBody;
use tonic::Status;
use tower::{Layer, Service};

/// Claims of the authenticated caller, set by [`GrpcAuthLayer`].
#[derive(Clone, Debug)]
pub struct ValidatedClaims(pub Claims);

#[derive(Clone)]
pub struct GrpcAuthLayer {
    verifier: Arc<TokenVerifier>,
    excluded_methods: Arc<HashSet<String>>,
}

impl GrpcAuthLayer {
    pub fn new(verifier: Arc<TokenVerifier>, excluded_methods: &[String]) -> Self {
        Self {
            verifier,
            excluded_methods: Arc::new(excluded_methods.iter().cloned().collect()),
        }
    }
}

impl<S> Layer<S> for GrpcAuthLayer {
    type Service = GrpcAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        GrpcAuthService {
            inner,
            verifier: self.verifier.clone(),
            excluded_methods: self.excluded_methods.clone(),
        }
    }
}

#[derive(Clone)]
pub struct GrpcAuthService<S> {
    inner: S,
    verifier: Arc<TokenVerifier>,
    excluded_methods: Arc<HashSet<String>>,
}

/// Method name from a gRPC path (`/lending.v1.AuthService/Login` -> `Login`).
fn method_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

impl<S, ReqBody> Service<http::Request<ReqBody>> for GrpcAuthService<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<BoxBody>>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<ReqBody>) -> Self::Future {
        // Take the service that was driven to readiness, leave a fresh clone.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let verifier = self.verifier.clone();
        let excluded = self
            .excluded_methods
            .contains(method_name(req.uri().path()));

        Box::pin(async move {
            let Some(auth_header) = req.headers().get(http::header::AUTHORIZATION) else {
                if excluded {
                    return inner.call(req).await;
                }
                tracing::debug!(target: "lending.grpc.auth", "Missing authorization header");
                return Ok(unauthenticated_response());
            };

            let Some(token) = auth_header.to_str().ok().and_then(bearer_token) else {
                tracing::debug!(target: "lending.grpc.auth", "Invalid authorization format");
                return Ok(unauthenticated_response());
            };

            if token.len() > MAX_JWT_SIZE_BYTES {
                tracing::debug!(
                    target: "lending.grpc.auth",
                    token_size = token.len(),
                    "Token exceeds size limit"
                );
                return Ok(unauthenticated_response());
            }

            let claims = match verifier.verify(token, TokenType::Access).await {
                Ok(c) => c,
                Err(e) => {
                    tracing::debug!(target: "lending.grpc.auth", error = %e, "Token validation failed");
                    return Ok(unauthenticated_response());
                }
            };

            let (mut parts, body) = req.into_parts();
            parts.extensions.insert(ValidatedClaims(claims));
            inner.call(http::Request::from_parts(parts, body)).await
        })
    }
}

fn unauthenticated_response() -> http::Response<BoxBody> {
    Status::unauthenticated("Invalid/expired token").into_http()
}
