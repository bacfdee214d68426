//! HTTP routes and shared handler state.

use crate::auth::TokenVerifier;
use crate::handlers::{self, gateway};
use crate::middleware::{optional_auth, AuthState};
use crate::models::Jwks;
use crate::observability::health::HealthState;
use crate::observability::request::http_request_layers;
use crate::repositories::LedgerStore;
use crate::services::{AuthService, LoanService, UserService};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer};

/// State shared by every HTTP handler.
#[derive(Clone)]
pub struct AppState {
    pub jwks: Jwks,
    pub ledger: Arc<dyn LedgerStore>,
    pub health: Arc<HealthState>,
    pub metrics: PrometheusHandle,
    pub verifier: Arc<TokenVerifier>,
    pub auth: AuthService,
    pub users: UserService,
    pub loans: LoanService,
}

/// Build the HTTP router.
///
/// - `/.well-known/jwks.json`, `/health`, `/ready`, `/metrics` are public
/// - `/v1/...` is the JSON gateway; a bearer token is verified when present
pub fn build_routes(state: Arc<AppState>) -> Router {
    let auth_state = Arc::new(AuthState {
        verifier: state.verifier.clone(),
    });

    let gateway_routes = Router::new()
        .route("/v1/auth/register", post(gateway::register))
        .route("/v1/auth/login", post(gateway::login))
        .route("/v1/auth/refresh", post(gateway::refresh))
        .route("/v1/users/exists", post(gateway::user_exists))
        .route("/v1/users/close", post(gateway::close_account))
        .route("/v1/loans", post(gateway::create_loan))
        .route("/v1/loans/:id/approve", post(gateway::approve_loan))
        .route("/v1/loans/:id/invest", post(gateway::invest_in_loan))
        .route("/v1/loans/:id/disburse", post(gateway::disburse_loan))
        .layer(middleware::from_fn_with_state(auth_state, optional_auth));

    let public_routes = Router::new()
        .route("/.well-known/jwks.json", get(handlers::get_jwks))
        .route("/health", get(handlers::liveness))
        .route("/ready", get(handlers::readiness))
        .route("/metrics", get(handlers::metrics_handler));

    // Outermost first: panics become 500s, then request id and tracing,
    // then the timeout.
    public_routes
        .merge(gateway_routes)
        .with_state(state)
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(http_request_layers())
        .layer(CatchPanicLayer::new())
}
