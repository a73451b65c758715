//! Per-invocation execution context.
//!
//! A [`Context`] travels down an endpoint chain next to the request. It is an
//! immutable carrier: every `with_*` call derives a child and leaves the
//! parent untouched, so a middleware can hand a richer context to the inner
//! endpoint without affecting anything outside its own call.
//!
//! Values are keyed by type (backed by [`http::Extensions`]). A deadline, when
//! present, is inherited by every child and can only get tighter.

use std::future::Future;
use std::time::Duration;

use http::Extensions;
use tokio::time::Instant;

use crate::error::Error;

/// Request metadata the logging middleware reads.
///
/// The transport places it into the context before the chain is entered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestMeta {
    pub method: String,
    pub path: String,
}

impl RequestMeta {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self { method: method.into(), path: path.into() }
    }
}

/// Immutable, cheaply cloned execution context.
#[derive(Clone, Debug, Default)]
pub struct Context {
    values: Extensions,
    deadline: Option<Instant>,
}

impl Context {
    /// An empty root context with no values and no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Derives a child carrying `value`. A value of the same type already in
    /// the parent is shadowed in the child only.
    pub fn with_value<T>(&self, value: T) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        let mut child = self.clone();
        child.values.insert(value);
        child
    }

    /// Returns the value of type `T`, if one was attached.
    pub fn value<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.values.get::<T>()
    }

    /// Derives a child that expires `timeout` from now, or at the parent's
    /// deadline if that comes first.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derives a child that expires at `deadline`, or at the parent's
    /// deadline if that comes first.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let mut child = self.clone();
        child.deadline = Some(match self.deadline {
            Some(parent) => parent.min(deadline),
            None => deadline,
        });
        child
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True once the deadline has passed. A context without a deadline never
    /// expires.
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Drives `fut` until it completes or the deadline passes, whichever is
    /// first. Without a deadline this is just `fut.await`.
    pub async fn within_deadline<F: Future>(&self, fut: F) -> Result<F::Output, Error> {
        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, fut)
                .await
                .map_err(|_| Error::DeadlineExceeded),
            None => Ok(fut.await),
        }
    }

    /// Convenience for `with_value(RequestMeta::new(method, path))`.
    pub fn with_request_meta(&self, method: impl Into<String>, path: impl Into<String>) -> Self {
        self.with_value(RequestMeta::new(method, path))
    }

    /// Returns the request metadata placed by the transport.
    ///
    /// # Panics
    ///
    /// Panics if no [`RequestMeta`] was attached. That is a wiring bug in the
    /// caller, and defaulting the fields would corrupt the access log.
    pub fn request_meta(&self) -> &RequestMeta {
        self.value::<RequestMeta>()
            .unwrap_or_else(|| panic!("context carries no RequestMeta; attach it before entering the chain"))
    }
}
