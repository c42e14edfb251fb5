//! Built-in Kubernetes health checks.
//!
//! | Probe | Path | Question |
//! |---|---|---|
//! | **Liveness** | `/healthz` | Is the process alive? Failure → restart. |
//! | **Readiness** | `/readyz` | Can the pod serve traffic? Failure → pulled from load-balancer. |
//!
//! Scan [`Health`] like any other controller:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use spur::{App, health::Health};
//!
//! let app = App::new();
//! app.scan(Arc::new(Health::new()));
//! ```
//!
//! Flip readiness off while warming up or draining:
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use spur::health::Health;
//! let health = Arc::new(Health::new());
//! health.set_ready(false);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use http::StatusCode;

use crate::args::Args;
use crate::response::Response;
use crate::route::{Controller, Routes};

/// Answers `/healthz` and `/readyz`.
#[derive(Debug)]
pub struct Health {
    ready: AtomicBool,
}

impl Health {
    /// Starts out ready.
    pub fn new() -> Self {
        Self { ready: AtomicBool::new(true) }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Always `200 ok`. If the process can answer at all, it is alive.
    async fn liveness(self: Arc<Self>, _args: Args) -> &'static str {
        "ok"
    }

    /// `200 ready`, or `503` while not ready.
    async fn readiness(self: Arc<Self>, _args: Args) -> Response {
        if self.is_ready() {
            Response::text("ready")
        } else {
            Response::status(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

impl Default for Health {
    fn default() -> Self { Self::new() }
}

impl Controller for Health {
    fn routes(routes: &mut Routes<Self>) {
        routes.get("/healthz", Self::liveness).named("liveness");
        routes.get("/readyz", Self::readiness).named("readiness");
    }
}
