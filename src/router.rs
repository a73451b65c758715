//! Request router.
//!
//! One radix tree per HTTP method. A path that no tree for the request's
//! method matches, but some other method's tree does, answers
//! `405 Method Not Allowed`; anything else `404 Not Found`.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use matchit::Router as MatchitRouter;

use crate::handler::{BoxedHandler, Handler};

/// The application route table. Build it once at startup and hand it to
/// [`Server::serve`](crate::Server::serve).
#[derive(Default)]
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
}

/// Outcome of a lookup.
pub(crate) enum Route {
    Found(BoxedHandler),
    MethodNotAllowed,
    NotFound,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `method` + `path`. Returns `self` for chaining.
    ///
    /// # Panics
    ///
    /// Panics if the path is malformed or conflicts with one already
    /// registered for `method`.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes
            .entry(method.clone())
            .or_default()
            .insert(path, handler.into_boxed_handler())
            .unwrap_or_else(|e| panic!("route `{method} {path}` cannot be registered: {e}"));
        self
    }

    pub(crate) fn lookup(&self, method: &Method, path: &str) -> Route {
        if let Some(matched) = self.routes.get(method).and_then(|tree| tree.at(path).ok()) {
            return Route::Found(Arc::clone(matched.value));
        }
        if self.routes.values().any(|tree| tree.at(path).is_ok()) {
            Route::MethodNotAllowed
        } else {
            Route::NotFound
        }
    }
}
