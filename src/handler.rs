//! HTTP handler trait and type erasure.
//!
//! Handlers sit at the HTTP edge, in front of the endpoint chains: they turn
//! a [`Request`] into a [`Response`]. The router stores handlers of many
//! concrete types in one table, so each is erased behind
//! `Arc<dyn ErasedHandler>`:
//!
//! ```text
//! |req: Request| async { … }                 ← json_handler / health / metrics
//!        ↓ router.on(Method::POST, "/ask", h)
//! h.into_boxed_handler()                      ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(h))                      ← stored as BoxedHandler
//!        ↓
//! handler.call(req)  at request time          ← one vtable dispatch
//! ```

use std::future::Future;
use std::sync::Arc;

use crate::endpoint::BoxFuture;
use crate::request::Request;
use crate::response::{IntoResponse, Response};

#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture<Response>;
}

#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Implemented for every valid route handler: any
/// `Fn(Request) -> impl Future<Output = impl IntoResponse>`.
///
/// Sealed; the blanket impl below is the only one.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture<Response> {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_response() })
    }
}
