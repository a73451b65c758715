//! Middleware layer.
//!
//! A middleware turns an [`Endpoint`] into another endpoint of the same type.
//! It is the one extension point for cross-cutting concerns: anything it does
//! has the shape "do X, call the inner endpoint, do Y with the outcome".
//!
//! Built-in middleware:
//! - [`Logging`]: one structured log line per call
//! - [`MetricsMiddleware`]: request count, latency and error count
//! - [`TracingMiddleware`]: one `"endpoint"` span per call
//!
//! Stacks are assembled with [`chain`] / [`Chain`]:
//!
//! ```rust,ignore
//! let stack = chain(tracing, [layer(metrics), layer(Logging)]);
//! let endpoint = stack.wrap(base);
//! ```

use std::sync::Arc;

use crate::endpoint::Endpoint;

mod logging;
mod metrics;
mod tracing;

pub use logging::Logging;
pub use metrics::MetricsMiddleware;
pub use tracing::TracingMiddleware;

/// Wraps an endpoint, returning an endpoint of the same type.
///
/// Any `Fn(Endpoint<Req, Resp>) -> Endpoint<Req, Resp>` closure is a
/// middleware, so one-off wrappers need no named type.
pub trait Middleware<Req, Resp>: Send + Sync + 'static {
    fn wrap(&self, next: Endpoint<Req, Resp>) -> Endpoint<Req, Resp>;
}

impl<Req, Resp, F> Middleware<Req, Resp> for F
where
    F: Fn(Endpoint<Req, Resp>) -> Endpoint<Req, Resp> + Send + Sync + 'static,
{
    fn wrap(&self, next: Endpoint<Req, Resp>) -> Endpoint<Req, Resp> {
        self(next)
    }
}

/// A shared, type-erased middleware, the element type of a [`Chain`].
pub type SharedMiddleware<Req, Resp> = Arc<dyn Middleware<Req, Resp>>;

/// Erases a concrete middleware so it can sit in a list with others.
pub fn layer<Req, Resp, M>(middleware: M) -> SharedMiddleware<Req, Resp>
where
    M: Middleware<Req, Resp>,
{
    Arc::new(middleware)
}

/// An ordered stack of middlewares that acts as one middleware.
///
/// The first middleware is the outermost: its code runs first on the way in
/// and last on the way out.
pub struct Chain<Req, Resp> {
    layers: Vec<SharedMiddleware<Req, Resp>>,
}

impl<Req, Resp> Chain<Req, Resp> {
    /// Starts a chain whose outermost layer is `outer`.
    pub fn new(outer: impl Middleware<Req, Resp>) -> Self {
        Self { layers: vec![Arc::new(outer)] }
    }

    /// Appends `middleware` one level further in.
    pub fn then(mut self, middleware: impl Middleware<Req, Resp>) -> Self {
        self.layers.push(Arc::new(middleware));
        self
    }
}

impl<Req, Resp> Clone for Chain<Req, Resp> {
    fn clone(&self) -> Self {
        Self { layers: self.layers.clone() }
    }
}

impl<Req, Resp> Middleware<Req, Resp> for Chain<Req, Resp>
where
    Req: 'static,
    Resp: 'static,
{
    fn wrap(&self, next: Endpoint<Req, Resp>) -> Endpoint<Req, Resp> {
        // Fold from the innermost layer outwards so the first-listed layer
        // ends up wrapping everything else.
        self.layers.iter().rev().fold(next, |next, m| m.wrap(next))
    }
}

/// Composes `outer` and `others` into one middleware.
///
/// Requests traverse the layers in declaration order: `outer` first, then
/// `others[0]`, `others[1]`, … For `chain(a, [b, c])` around `e` the call
/// order is `a → b → c → e → c → b → a`.
pub fn chain<Req, Resp>(
    outer: impl Middleware<Req, Resp>,
    others: impl IntoIterator<Item = SharedMiddleware<Req, Resp>>,
) -> Chain<Req, Resp> {
    let mut chain = Chain::new(outer);
    chain.layers.extend(others);
    chain
}
