//! HTTP handlers.

pub mod gateway;
pub mod health;
pub mod jwks_handler;
pub mod metrics;

pub use health::{liveness, readiness};
pub use jwks_handler::get_jwks;
pub use metrics::metrics_handler;
