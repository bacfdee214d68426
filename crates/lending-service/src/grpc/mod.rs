//! gRPC surface of the lending service.
//!
//! Each tonic service is a thin adapter: it converts the wire message into
//! the domain request, runs the shared service on its own task and maps the
//! result back. Authentication happens earlier, in [`auth_layer`].

pub mod auth_layer;
pub mod auth_service;
pub mod loan_service;
pub mod user_service;

pub use auth_layer::{GrpcAuthLayer, ValidatedClaims};
pub use auth_service::AuthGrpcService;
pub use loan_service::LoanGrpcService;
pub use user_service::UserGrpcService;

use crate::auth::Claims;
use crate::errors::LendingError;
use chrono::{DateTime, Utc};
use std::future::Future;
use tonic::{Request, Response, Status};
use tracing::Instrument;

/// Claims attached by the auth layer, if any.
pub(crate) fn caller_claims<T>(request: &Request<T>) -> Option<Claims> {
    request
        .extensions()
        .get::<ValidatedClaims>()
        .map(|validated| validated.0.clone())
}

/// Run a handler on its own task so a panic becomes an INTERNAL status
/// instead of tearing down the connection. The task stays inside the
/// caller's span so its events keep the request id.
pub(crate) async fn recover<T, F>(method: &'static str, handler: F) -> Result<Response<T>, Status>
where
    F: Future<Output = Result<T, LendingError>> + Send + 'static,
    T: Send + 'static,
{
    match tokio::spawn(handler.in_current_span()).await {
        Ok(result) => result.map(Response::new).map_err(Status::from),
        Err(e) => {
            tracing::error!(target: "lending.grpc", method, error = %e, "Handler panicked");
            Err(Status::internal("Internal error"))
        }
    }
}

pub(crate) fn id_from_wire(value: u64) -> Result<i64, LendingError> {
    i64::try_from(value).map_err(|_| LendingError::Validation("id is out of range.".to_string()))
}

pub(crate) fn id_to_wire(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

pub(crate) fn timestamp(value: DateTime<Utc>) -> prost_types::Timestamp {
    prost_types::Timestamp {
        seconds: value.timestamp(),
        nanos: i32::try_from(value.timestamp_subsec_nanos()).unwrap_or_default(),
    }
}
