//! Per-request correlation ids.
//!
//! Every inbound HTTP or gRPC request gets an `x-request-id` (a fresh UUID
//! unless the caller sent one). The id is recorded on the request span, so
//! every log line emitted while serving the request carries it, and it is
//! echoed back on the response.

use axum::http::Request;
use tower::layer::util::{Identity, Stack};
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::{GrpcMakeClassifier, HttpMakeClassifier, MakeSpan, TraceLayer};
use tracing::Span;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request id assignment, echo and tracing, outermost first.
pub type RequestLayers<C> = ServiceBuilder<
    Stack<
        TraceLayer<C, RequestSpan>,
        Stack<PropagateRequestIdLayer, Stack<SetRequestIdLayer<MakeRequestUuid>, Identity>>,
    >,
>;

/// Builds the `request` span with the correlation id already assigned.
#[derive(Debug, Clone, Copy)]
pub struct RequestSpan {
    protocol: &'static str,
}

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let request_id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        tracing::info_span!(
            "request",
            protocol = self.protocol,
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

pub fn http_request_layers() -> RequestLayers<HttpMakeClassifier> {
    ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http().make_span_with(RequestSpan { protocol: "http" }))
}

pub fn grpc_request_layers() -> RequestLayers<GrpcMakeClassifier> {
    ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_grpc().make_span_with(RequestSpan { protocol: "grpc" }))
}
