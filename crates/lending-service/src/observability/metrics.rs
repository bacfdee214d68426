//! Prometheus metrics for the lending service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `lending_` prefix
//! - `_total` suffix for counters
//!
//! # Cardinality
//!
//! Labels are bounded by code:
//! - `transition`: create, approve, invest, disburse
//! - `status`: success, error (plus `dropped` for notifications)
//! - `token_type`: access, refresh
//! - `code`: gRPC status code names

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder and return the handle used by
/// `GET /metrics`.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Amounts span 1k..100M, so buckets are logarithmic.
        .set_buckets_for_metric(
            Matcher::Full("lending_investment_amount".to_string()),
            &[
                1_000.0,
                5_000.0,
                10_000.0,
                50_000.0,
                100_000.0,
                1_000_000.0,
                10_000_000.0,
                100_000_000.0,
            ],
        )
        .map_err(|e| format!("Failed to set investment amount buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// Loan Metrics
// ============================================================================

/// Record a loan state transition attempt.
///
/// Metric: `lending_loan_transitions_total`
/// Labels: `transition`, `status`
pub fn record_loan_transition(transition: &'static str, status: &'static str) {
    counter!("lending_loan_transitions_total", "transition" => transition, "status" => status)
        .increment(1);
}

/// Record the size of a committed investment.
///
/// Metric: `lending_investment_amount`
pub fn record_investment_amount(amount: f64) {
    histogram!("lending_investment_amount").record(amount);
}

// ============================================================================
// Token Metrics
// ============================================================================

/// Record token issuance outcome.
///
/// Metric: `lending_token_issuance_total`
/// Labels: `token_type`, `status`
pub fn record_token_issuance(token_type: &'static str, status: &'static str) {
    counter!("lending_token_issuance_total", "token_type" => token_type, "status" => status)
        .increment(1);
}

/// Record token validation result.
///
/// Metric: `lending_token_validations_total`
/// Labels: `status`
pub fn record_token_validation(status: &'static str) {
    counter!("lending_token_validations_total", "status" => status).increment(1);
}

// ============================================================================
// Notification Metrics
// ============================================================================

/// Record a notification outcome.
///
/// Metric: `lending_notifications_total`
/// Labels: `status` (sent, error, dropped)
pub fn record_notification(status: &'static str) {
    counter!("lending_notifications_total", "status" => status).increment(1);
}

// ============================================================================
// Error Metrics
// ============================================================================

/// Record an error returned at the gRPC boundary.
///
/// Metric: `lending_grpc_errors_total`
/// Labels: `code`
pub fn record_rpc_error(code: tonic::Code) {
    counter!("lending_grpc_errors_total", "code" => code_label(code)).increment(1);
}

fn code_label(code: tonic::Code) -> &'static str {
    use tonic::Code;
    match code {
        Code::Ok => "ok",
        Code::Cancelled => "cancelled",
        Code::Unknown => "unknown",
        Code::InvalidArgument => "invalid_argument",
        Code::DeadlineExceeded => "deadline_exceeded",
        Code::NotFound => "not_found",
        Code::AlreadyExists => "already_exists",
        Code::PermissionDenied => "permission_denied",
        Code::ResourceExhausted => "resource_exhausted",
        Code::FailedPrecondition => "failed_precondition",
        Code::Aborted => "aborted",
        Code::OutOfRange => "out_of_range",
        Code::Unimplemented => "unimplemented",
        Code::Internal => "internal",
        Code::Unavailable => "unavailable",
        Code::DataLoss => "data_loss",
        Code::Unauthenticated => "unauthenticated",
    }
}
