//! Readiness state shared by the health endpoints and the shutdown path.
//!
//! `ready` is set by `main` after both the HTTP and gRPC listeners are
//! bound, and cleared when shutdown begins so load balancers stop routing
//! before in-flight requests drain. Liveness needs no state: a process that
//! can answer `/health` is live.

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub struct HealthState {
    ready: AtomicBool,
}

impl HealthState {
    /// Create a new health state (not ready).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    pub fn set_not_ready(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}
