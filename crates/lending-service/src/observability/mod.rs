//! Observability for the lending service.
//!
//! # Privacy by Default
//!
//! Instrumentation uses `#[instrument(skip_all)]` with explicit safe fields.
//! Ids, loan states and roles may be logged. Tokens, passwords, private
//! keys, emails and phone numbers never appear in logs or metric labels.

pub mod health;
pub mod metrics;
pub mod request;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "lending_service=debug,tower_http=debug";

/// Install the global tracing subscriber.
///
/// `json` selects the JSON formatter (`LOG_FORMAT=json`).
pub fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
