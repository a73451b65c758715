//! Request count / latency / error count middleware.

use std::sync::Arc;
use std::time::Instant;

use super::Middleware;
use crate::context::Context;
use crate::endpoint::{Endpoint, EndpointFuture, ErasedEndpoint};
use crate::recorder::Metrics;

/// Records, for every call:
///
/// - one latency observation (seconds) in `request_latency`
/// - one increment of `request_count`
/// - one increment of `error_count` when the inner endpoint returned an error
///
/// The first two are written by a drop guard, so they land exactly once on
/// every exit path, including a panicking inner endpoint and a caller that
/// drops the future mid-flight.
#[derive(Clone)]
pub struct MetricsMiddleware {
    metrics: Arc<Metrics>,
}

impl MetricsMiddleware {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }
}

impl<Req, Resp> Middleware<Req, Resp> for MetricsMiddleware
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn wrap(&self, next: Endpoint<Req, Resp>) -> Endpoint<Req, Resp> {
        Endpoint::from_erased(MetricsEndpoint { metrics: Arc::clone(&self.metrics), next })
    }
}

struct MetricsEndpoint<Req, Resp> {
    metrics: Arc<Metrics>,
    next: Endpoint<Req, Resp>,
}

impl<Req, Resp> ErasedEndpoint<Req, Resp> for MetricsEndpoint<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn call(&self, ctx: Context, req: Req) -> EndpointFuture<Resp> {
        let metrics = Arc::clone(&self.metrics);
        let next = self.next.clone();
        Box::pin(async move {
            let _timer = RequestTimer::start(Arc::clone(&metrics));
            let result = next.call(ctx, req).await;
            if result.is_err() {
                metrics.error_count.add(1);
            }
            result
        })
    }
}

/// Records latency and one request on drop.
struct RequestTimer {
    metrics: Arc<Metrics>,
    begin: Instant,
}

impl RequestTimer {
    fn start(metrics: Arc<Metrics>) -> Self {
        Self { metrics, begin: Instant::now() }
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        self.metrics.request_latency.observe(self.begin.elapsed().as_secs_f64());
        self.metrics.request_count.add(1);
    }
}
