//! The endpoint abstraction.
//!
//! An [`Endpoint`] is the unit of business logic every middleware wraps:
//!
//! ```text
//! (Context, Req)  ──►  Endpoint<Req, Resp>  ──►  Result<Resp, BoxError>
//! ```
//!
//! # How endpoints are stored
//!
//! Middlewares build new endpoints out of old ones at startup, and each layer
//! has its own concrete type. To keep the public type stable no matter how
//! deep the stack is, the concrete callable is erased behind
//! `Arc<dyn ErasedEndpoint>`:
//!
//! ```text
//! async |ctx, req| { … }                 ← user writes this
//!        ↓ Endpoint::new(f)
//! Arc::new(FnEndpoint(f))                ← heap-allocated wrapper
//!        ↓ stored as Arc<dyn ErasedEndpoint<Req, Resp>>
//! endpoint.call(ctx, req)                ← one vtable dispatch per layer
//!        ↓
//! Box::pin(f(ctx, req))                  ← BoxFuture
//! ```
//!
//! Cloning an endpoint is one atomic increment; the composed chain is shared
//! by every concurrent request.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::error::BoxError;
use crate::middleware::Middleware;

/// A heap-allocated, type-erased `Send` future.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// What an endpoint invocation resolves to.
pub type EndpointFuture<Resp> = BoxFuture<Result<Resp, BoxError>>;

/// Dispatch interface behind [`Endpoint`].
///
/// Implement this on a struct when a closure is awkward (the built-in
/// middlewares do), then turn it into an endpoint with
/// [`Endpoint::from_erased`].
pub trait ErasedEndpoint<Req, Resp>: Send + Sync + 'static {
    fn call(&self, ctx: Context, req: Req) -> EndpointFuture<Resp>;
}

/// A shareable, type-erased request handler.
pub struct Endpoint<Req, Resp> {
    inner: Arc<dyn ErasedEndpoint<Req, Resp>>,
}

impl<Req, Resp> Endpoint<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    /// Builds an endpoint from an async function or closure.
    ///
    /// ```rust
    /// use stringsvc::{BoxError, Endpoint};
    ///
    /// let upper = Endpoint::new(|_ctx, s: String| async move {
    ///     Ok::<_, BoxError>(s.to_uppercase())
    /// });
    /// ```
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Context, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, BoxError>> + Send + 'static,
    {
        Self::from_erased(FnEndpoint(f))
    }

    pub fn from_erased(endpoint: impl ErasedEndpoint<Req, Resp>) -> Self {
        Self { inner: Arc::new(endpoint) }
    }

    /// Invokes the endpoint.
    pub fn call(&self, ctx: Context, req: Req) -> EndpointFuture<Resp> {
        self.inner.call(ctx, req)
    }

    /// Wraps this endpoint in `middleware`. Chains read top to bottom as
    /// innermost to outermost:
    ///
    /// ```rust,ignore
    /// let ep = base.with(&logging).with(&metrics).with(&tracing);
    /// ```
    pub fn with<M>(self, middleware: &M) -> Self
    where
        M: Middleware<Req, Resp> + ?Sized,
    {
        middleware.wrap(self)
    }
}

impl<Req, Resp> Clone for Endpoint<Req, Resp> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<Req, Resp> fmt::Debug for Endpoint<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("req", &std::any::type_name::<Req>())
            .field("resp", &std::any::type_name::<Resp>())
            .finish()
    }
}

/// Newtype bridging a plain closure into [`ErasedEndpoint`].
struct FnEndpoint<F>(F);

impl<F, Fut, Req, Resp> ErasedEndpoint<Req, Resp> for FnEndpoint<F>
where
    F: Fn(Context, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Resp, BoxError>> + Send + 'static,
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn call(&self, ctx: Context, req: Req) -> EndpointFuture<Resp> {
        Box::pin((self.0)(ctx, req))
    }
}
