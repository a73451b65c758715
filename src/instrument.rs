//! Service-level instrumentation.
//!
//! Where [`MetricsMiddleware`](crate::middleware::MetricsMiddleware) measures
//! whole endpoint calls, [`Instrument`] measures individual service methods,
//! labelled by method name and outcome:
//!
//! ```text
//! method_request_count{method="uppercase", error="false"}  += 1
//! method_request_latency_seconds{method="uppercase", error="false"} <- 0.000042
//! ```
//!
//! The two families are separate from the middleware's, so summing either
//! one counts each request once.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::BoxError;
use crate::recorder::{metric_name, Counter, FacadeCounter, FacadeHistogram, Histogram};

/// Metric name suffixes of [`Instrument::facade`].
pub const METHOD_REQUEST_COUNT: &str = "method_request_count";
pub const METHOD_REQUEST_LATENCY: &str = "method_request_latency_seconds";
use crate::service::StringService;

/// Times and counts named method calls.
#[derive(Clone)]
pub struct Instrument {
    request_count: Arc<dyn Counter>,
    request_latency: Arc<dyn Histogram>,
}

impl Instrument {
    pub fn new(request_count: Arc<dyn Counter>, request_latency: Arc<dyn Histogram>) -> Self {
        Self { request_count, request_latency }
    }

    /// Facade-backed `<namespace>_<subsystem>_method_request_count` and
    /// `…_method_request_latency_seconds`.
    pub fn facade(namespace: &str, subsystem: &str) -> Self {
        Self::new(
            Arc::new(FacadeCounter::new(
                metric_name(namespace, subsystem, METHOD_REQUEST_COUNT),
                "Number of service method calls.",
            )),
            Arc::new(FacadeHistogram::new(
                metric_name(namespace, subsystem, METHOD_REQUEST_LATENCY),
                "Service method duration in seconds.",
            )),
        )
    }

    /// Runs `f`, then records one count and one latency observation under
    /// `["method", name, "error", "true"|"false"]`. The result is returned
    /// unchanged.
    pub async fn method<T, E, F, Fut>(&self, name: &str, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let begin = Instant::now();
        let result = f().await;

        let failed = if result.is_err() { "true" } else { "false" };
        let lvs = ["method", name, "error", failed];
        self.request_count.with(&lvs).add(1);
        self.request_latency.with(&lvs).observe(begin.elapsed().as_secs_f64());

        result
    }
}

/// [`StringService`] decorator that runs every operation through
/// [`Instrument::method`].
pub struct InstrumentedStringService<S> {
    instrument: Instrument,
    next: S,
}

impl<S> InstrumentedStringService<S> {
    pub fn new(instrument: Instrument, next: S) -> Self {
        Self { instrument, next }
    }
}

#[async_trait]
impl<S: StringService> StringService for InstrumentedStringService<S> {
    async fn uppercase(&self, s: &str) -> Result<String, BoxError> {
        self.instrument.method("uppercase", || self.next.uppercase(s)).await
    }

    async fn ask(&self, ctx: &Context, question: &str) -> Result<String, BoxError> {
        self.instrument.method("ask", || self.next.ask(ctx, question)).await
    }
}
