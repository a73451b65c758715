//! Business logic.
//!
//! [`StringService`] is the seam everything else is built around: the
//! transport calls it, [`InstrumentedStringService`](crate::instrument::InstrumentedStringService)
//! and [`ProxyingService`](crate::proxy::ProxyingService) decorate it, and
//! [`StringSvc`] is the real thing.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::{BoxError, Error};

pub mod claude;

pub use claude::ClaudeClient;

/// The operations the service exposes.
#[async_trait]
pub trait StringService: Send + Sync {
    /// Unicode uppercase of `s`.
    async fn uppercase(&self, s: &str) -> Result<String, BoxError>;

    /// Forwards `question` to the language-model assistant and returns its
    /// answer. Bounded by the deadline carried in `ctx`.
    async fn ask(&self, ctx: &Context, question: &str) -> Result<String, BoxError>;
}

#[async_trait]
impl<S> StringService for Arc<S>
where
    S: StringService + ?Sized,
{
    async fn uppercase(&self, s: &str) -> Result<String, BoxError> {
        (**self).uppercase(s).await
    }

    async fn ask(&self, ctx: &Context, question: &str) -> Result<String, BoxError> {
        (**self).ask(ctx, question).await
    }
}

/// Something that can answer a free-form question.
#[async_trait]
pub trait Assistant: Send + Sync {
    async fn ask(&self, ctx: &Context, question: &str) -> Result<String, Error>;
}

/// A business error the caller caused. `code` is the HTTP status the
/// transport answers with.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ServiceError {
    pub code: u16,
    pub message: String,
}

impl ServiceError {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, message)
    }
}

/// The concrete service.
#[derive(Clone)]
pub struct StringSvc {
    assistant: Arc<dyn Assistant>,
}

impl StringSvc {
    pub fn new(assistant: Arc<dyn Assistant>) -> Self {
        Self { assistant }
    }
}

#[async_trait]
impl StringService for StringSvc {
    async fn uppercase(&self, s: &str) -> Result<String, BoxError> {
        Ok(s.to_uppercase())
    }

    async fn ask(&self, ctx: &Context, question: &str) -> Result<String, BoxError> {
        if question.trim().is_empty() {
            return Err(ServiceError::bad_request("question must not be empty").into());
        }
        Ok(self.assistant.ask(ctx, question).await?)
    }
}
