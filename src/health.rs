//! Liveness and readiness.
//!
//! | Probe | Path | Answer |
//! |---|---|---|
//! | **Liveness** | `/health` | `200 ok` while healthy, `503` otherwise |
//! | **Readiness** | `/ready` | always `200 ready` once the server accepts |
//!
//! The binary flips [`Health`] to healthy right before serving and back to
//! unhealthy when shutdown starts, so load balancers stop routing to a
//! draining instance.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use http::StatusCode;

use crate::handler::Handler;
use crate::recorder::Gauge;
use crate::request::Request;
use crate::response::Response;

/// Process health flag. Starts unhealthy.
#[derive(Default)]
pub struct Health {
    healthy: AtomicBool,
    gauge: Option<Arc<dyn Gauge>>,
}

impl Health {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirrors the flag into `gauge` as `1` / `0`.
    pub fn with_gauge(gauge: Arc<dyn Gauge>) -> Self {
        gauge.set(0.0);
        Self { healthy: AtomicBool::new(false), gauge: Some(gauge) }
    }

    pub fn set_healthy(&self) {
        self.store(true);
    }

    pub fn set_unhealthy(&self) {
        self.store(false);
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    fn store(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Release);
        if let Some(gauge) = &self.gauge {
            gauge.set(if healthy { 1.0 } else { 0.0 });
        }
    }
}

/// `GET /health`.
pub fn liveness(health: Arc<Health>) -> impl Handler {
    move |_req: Request| {
        let healthy = health.is_healthy();
        async move {
            if healthy { Response::text("ok") } else { Response::status(StatusCode::SERVICE_UNAVAILABLE) }
        }
    }
}

/// `GET /ready`.
pub async fn readiness(_req: Request) -> Response {
    Response::text("ready")
}
