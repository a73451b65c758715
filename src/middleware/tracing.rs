//! Per-invocation span middleware.

use std::sync::Arc;

use super::Middleware;
use crate::context::Context;
use crate::endpoint::{Endpoint, EndpointFuture, ErasedEndpoint};
use crate::trace::{KeyValue, SpanGuard, TraceAttributes, Tracer};

/// Name of the span started around every call.
pub const SPAN_NAME: &str = "endpoint";

type AttributeFn<Req> = fn(&Req) -> Vec<KeyValue>;

/// Opens one [`SPAN_NAME`] span per call, as a child of the span carried by
/// the incoming context, and hands the inner endpoint a context carrying the
/// new span.
///
/// A returned error is recorded on the span. The span is ended exactly once,
/// on success, error, panic, or when the call's future is dropped.
///
/// Request attributes are opt-in: build with [`TracingMiddleware::traced`]
/// when the request type implements [`TraceAttributes`].
pub struct TracingMiddleware<Req> {
    tracer: Arc<dyn Tracer>,
    attributes: Option<AttributeFn<Req>>,
}

impl<Req> TracingMiddleware<Req> {
    /// Spans without request attributes, even when `Req` implements
    /// [`TraceAttributes`]. Use [`TracingMiddleware::traced`] to attach them.
    pub fn new(tracer: Arc<dyn Tracer>) -> Self {
        Self { tracer, attributes: None }
    }
}

impl<Req: TraceAttributes> TracingMiddleware<Req> {
    /// Spans carrying `req.trace_attributes()`.
    pub fn traced(tracer: Arc<dyn Tracer>) -> Self {
        Self { tracer, attributes: Some(<Req as TraceAttributes>::trace_attributes) }
    }
}

impl<Req> Clone for TracingMiddleware<Req> {
    fn clone(&self) -> Self {
        Self { tracer: Arc::clone(&self.tracer), attributes: self.attributes }
    }
}

impl<Req, Resp> Middleware<Req, Resp> for TracingMiddleware<Req>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn wrap(&self, next: Endpoint<Req, Resp>) -> Endpoint<Req, Resp> {
        Endpoint::from_erased(TracingEndpoint {
            tracer: Arc::clone(&self.tracer),
            attributes: self.attributes,
            next,
        })
    }
}

struct TracingEndpoint<Req, Resp> {
    tracer: Arc<dyn Tracer>,
    attributes: Option<AttributeFn<Req>>,
    next: Endpoint<Req, Resp>,
}

impl<Req, Resp> ErasedEndpoint<Req, Resp> for TracingEndpoint<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn call(&self, ctx: Context, req: Req) -> EndpointFuture<Resp> {
        let (span_ctx, span) = self.tracer.start(&ctx, SPAN_NAME);
        let mut guard = SpanGuard::new(span);

        if let (Some(attributes), Some(span)) = (self.attributes, guard.span()) {
            span.set_attributes(attributes(&req));
        }

        let inner = self.next.call(span_ctx, req);
        Box::pin(async move {
            let mut guard = guard;
            let result = inner.await;
            if let (Err(err), Some(span)) = (&result, guard.span()) {
                span.record_error(&**err);
            }
            result
        })
    }
}
