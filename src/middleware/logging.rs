//! Access-log middleware.

use std::time::Instant;

use tracing::info;

use super::Middleware;
use crate::context::Context;
use crate::endpoint::{Endpoint, EndpointFuture, ErasedEndpoint};

/// Emits one structured log line per invocation:
///
/// ```text
/// INFO stringsvc::middleware::logging: endpoint called method=POST path=/uppercase duration=84.2µs err=none
/// ```
///
/// `method` and `path` come from the [`RequestMeta`](crate::RequestMeta) the
/// transport put into the context. A chain entered without one panics. The
/// result is returned untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct Logging;

impl<Req, Resp> Middleware<Req, Resp> for Logging
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn wrap(&self, next: Endpoint<Req, Resp>) -> Endpoint<Req, Resp> {
        Endpoint::from_erased(LoggingEndpoint { next })
    }
}

struct LoggingEndpoint<Req, Resp> {
    next: Endpoint<Req, Resp>,
}

impl<Req, Resp> ErasedEndpoint<Req, Resp> for LoggingEndpoint<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn call(&self, ctx: Context, req: Req) -> EndpointFuture<Resp> {
        let next = self.next.clone();
        Box::pin(async move {
            let meta = ctx.request_meta().clone();

            let start = Instant::now();
            let result = next.call(ctx, req).await;
            let duration = start.elapsed();

            let err = match &result {
                Ok(_) => "none".to_owned(),
                Err(e) => e.to_string(),
            };
            info!(
                method = %meta.method,
                path = %meta.path,
                duration = ?duration,
                err = %err,
                "endpoint called"
            );

            result
        })
    }
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::*;
    use crate::error::BoxError;

    fn echo() -> Endpoint<String, String> {
        Endpoint::new(|_ctx, s: String| async move {
            if s.is_empty() { Err::<String, BoxError>("empty input".into()) } else { Ok(s) }
        })
    }

    #[tokio::test]
    #[traced_test]
    async fn logs_method_path_and_no_error_marker() {
        let ep = echo().with(&Logging);
        let ctx = Context::background().with_request_meta("POST", "/uppercase");

        assert_eq!(ep.call(ctx, "abc".into()).await.unwrap(), "abc");

        assert!(logs_contain("endpoint called"));
        assert!(logs_contain("method=POST"));
        assert!(logs_contain("path=/uppercase"));
        assert!(logs_contain("err=none"));
    }

    #[tokio::test]
    #[traced_test]
    async fn logs_the_error_and_returns_it_unchanged() {
        let ep = echo().with(&Logging);
        let ctx = Context::background().with_request_meta("POST", "/uppercase");

        let err = ep.call(ctx, String::new()).await.unwrap_err();

        assert_eq!(err.to_string(), "empty input");
        assert!(logs_contain("err=empty input"));
    }

    #[tokio::test]
    #[should_panic(expected = "RequestMeta")]
    async fn missing_request_meta_panics() {
        let _ = echo().with(&Logging).call(Context::background(), "x".into()).await;
    }
}
