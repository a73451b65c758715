//! Tracer capability.
//!
//! The tracing middleware talks to a [`Tracer`] and the [`Span`]s it starts.
//! [`OtelTracer`] adapts any OpenTelemetry tracer; the span it starts becomes
//! the parent of whatever the inner endpoint starts with the derived context.

use std::error::Error as StdError;

use opentelemetry::trace::{Status, TraceContextExt};
use opentelemetry::Context as OtelContext;

pub use opentelemetry::KeyValue;

use crate::context::Context;

/// Starts spans scoped to one endpoint invocation.
pub trait Tracer: Send + Sync {
    /// Starts `name` as a child of the span active in `ctx`, if any. Returns
    /// a context carrying the new span together with the span itself.
    fn start(&self, ctx: &Context, name: &'static str) -> (Context, Box<dyn Span>);
}

/// One started span.
pub trait Span: Send {
    fn set_attributes(&mut self, attributes: Vec<KeyValue>);
    fn record_error(&mut self, err: &(dyn StdError + 'static));
    fn end(&mut self);
}

/// Optional request capability: requests that can describe themselves as
/// span attributes.
///
/// Only consulted by [`TracingMiddleware::traced`](crate::middleware::TracingMiddleware::traced).
pub trait TraceAttributes {
    fn trace_attributes(&self) -> Vec<KeyValue>;
}

/// Closes a span exactly once: explicitly via [`SpanGuard::end`] or on drop.
pub(crate) struct SpanGuard(Option<Box<dyn Span>>);

impl SpanGuard {
    pub(crate) fn new(span: Box<dyn Span>) -> Self {
        Self(Some(span))
    }

    pub(crate) fn span(&mut self) -> Option<&mut (dyn Span + 'static)> {
        self.0.as_deref_mut()
    }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        if let Some(mut span) = self.0.take() {
            span.end();
        }
    }
}

/// [`Tracer`] over an OpenTelemetry tracer.
///
/// The parent is the OpenTelemetry context stored in the incoming
/// [`Context`]; without one, the task's current OpenTelemetry context is used.
pub struct OtelTracer<T> {
    tracer: T,
}

impl<T> OtelTracer<T> {
    pub fn new(tracer: T) -> Self {
        Self { tracer }
    }
}

impl<T> Tracer for OtelTracer<T>
where
    T: opentelemetry::trace::Tracer + Send + Sync,
    T::Span: Send + Sync + 'static,
{
    fn start(&self, ctx: &Context, name: &'static str) -> (Context, Box<dyn Span>) {
        let parent = ctx.value::<OtelContext>().cloned().unwrap_or_else(OtelContext::current);
        let span = self.tracer.start_with_context(name, &parent);
        let cx = parent.with_span(span);
        (ctx.with_value(cx.clone()), Box::new(OtelSpan { cx }))
    }
}

struct OtelSpan {
    cx: OtelContext,
}

impl Span for OtelSpan {
    fn set_attributes(&mut self, attributes: Vec<KeyValue>) {
        self.cx.span().set_attributes(attributes);
    }

    fn record_error(&mut self, err: &(dyn StdError + 'static)) {
        let span = self.cx.span();
        span.record_error(err);
        span.set_status(Status::error(err.to_string()));
    }

    fn end(&mut self) {
        self.cx.span().end();
    }
}
