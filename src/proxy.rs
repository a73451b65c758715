//! Forwarding `ask` to another instance of this service.
//!
//! [`ProxyingService`] keeps serving `uppercase` locally and sends every
//! `ask` through an [`Endpoint`] that POSTs the question to a peer's `/ask`.
//! The endpoint has the same shape as the one the peer serves, only used to
//! make a request instead of answering one.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;

use crate::context::Context;
use crate::endpoint::Endpoint;
use crate::error::{BoxError, Error};
use crate::service::{ServiceError, StringService};
use crate::transport::{AskRequest, AskResponse, ErrorBody};

/// Client side of a peer's `POST /ask`.
///
/// A 4xx answer carrying `{"error": ...}` comes back as a [`ServiceError`]
/// with the peer's status, so a bad question stays a bad question. Any other
/// non-2xx is [`Error::UpstreamStatus`]. The caller's deadline bounds the
/// exchange.
pub fn remote_ask_endpoint(client: reqwest::Client, url: Url) -> Endpoint<AskRequest, AskResponse> {
    Endpoint::new(move |ctx: Context, req: AskRequest| {
        let client = client.clone();
        let url = url.clone();
        async move { ctx.within_deadline(post_ask(&client, url, &req)).await? }
    })
}

async fn post_ask(client: &reqwest::Client, url: Url, req: &AskRequest) -> Result<AskResponse, BoxError> {
    let resp = client.post(url).json(req).send().await.map_err(Error::from)?;
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json().await.map_err(Error::from)?);
    }
    match resp.json::<ErrorBody>().await {
        Ok(body) if status.is_client_error() => Err(ServiceError::new(status.as_u16(), body.error).into()),
        _ => Err(Error::UpstreamStatus(status.as_u16()).into()),
    }
}

/// [`StringService`] that serves `uppercase` through `next` and `ask`
/// through a remote endpoint.
pub struct ProxyingService<S> {
    next: S,
    ask: Endpoint<AskRequest, AskResponse>,
}

impl<S> ProxyingService<S> {
    pub fn new(next: S, ask: Endpoint<AskRequest, AskResponse>) -> Self {
        Self { next, ask }
    }

    /// Proxies `ask` to `url`, which must point at a peer's `/ask`.
    pub fn to_url(next: S, url: &str, timeout: Duration) -> Result<Self, Error> {
        let url = Url::parse(url).map_err(|e| Error::config(format!("proxy url `{url}`: {e}")))?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::new(next, remote_ask_endpoint(client, url)))
    }
}

#[async_trait]
impl<S: StringService> StringService for ProxyingService<S> {
    async fn uppercase(&self, s: &str) -> Result<String, BoxError> {
        self.next.uppercase(s).await
    }

    async fn ask(&self, ctx: &Context, question: &str) -> Result<String, BoxError> {
        let resp = self.ask.call(ctx.clone(), AskRequest { question: question.to_owned() }).await?;
        match resp.error {
            Some(err) if !err.is_empty() => Err(Error::Remote(err).into()),
            _ => Ok(resp.answer),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use http::{Method, StatusCode};
    use tokio::sync::oneshot;

    use super::*;
    use crate::request::Request;
    use crate::response::Response;
    use crate::router::Router;
    use crate::server::Server;

    struct Local;

    #[async_trait]
    impl StringService for Local {
        async fn uppercase(&self, s: &str) -> Result<String, BoxError> {
            Ok(format!("local:{}", s.to_uppercase()))
        }
        async fn ask(&self, _ctx: &Context, _question: &str) -> Result<String, BoxError> {
            unreachable!("ask is proxied")
        }
    }

    /// A peer whose `/ask` answers according to the question.
    async fn peer() -> (SocketAddr, oneshot::Sender<()>) {
        let router = Router::new().on(Method::POST, "/ask", |req: Request| async move {
            let ask: AskRequest = serde_json::from_slice(req.body()).unwrap();
            match ask.question.as_str() {
                "in-band" => Response::json(&AskResponse { answer: String::new(), error: Some("peer failed".into()) }),
                "bad" => Response::builder()
                    .status(StatusCode::BAD_REQUEST)
                    .json(&ErrorBody { error: "question must not be empty".into() }),
                "crash" => Response::status(StatusCode::INTERNAL_SERVER_ERROR),
                "slow" => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Response::json(&AskResponse::default())
                }
                q => Response::json(&AskResponse { answer: format!("peer answered {q}"), error: None }),
            }
        });
        let server = Server::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = server.local_addr();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(server.serve_with_shutdown(router, async {
            let _ = rx.await;
        }));
        (addr, tx)
    }

    async fn proxied() -> (ProxyingService<Local>, oneshot::Sender<()>) {
        let (addr, stop) = peer().await;
        let svc = ProxyingService::to_url(Local, &format!("http://{addr}/ask"), Duration::from_secs(5)).unwrap();
        (svc, stop)
    }

    #[tokio::test]
    async fn uppercase_stays_local_and_ask_goes_remote() {
        let (svc, _stop) = proxied().await;

        assert_eq!(svc.uppercase("abc").await.unwrap(), "local:ABC");
        assert_eq!(svc.ask(&Context::background(), "why").await.unwrap(), "peer answered why");
    }

    #[tokio::test]
    async fn in_band_remote_error_becomes_an_error() {
        let (svc, _stop) = proxied().await;

        let err = svc.ask(&Context::background(), "in-band").await.unwrap_err();

        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Remote(m)) if m == "peer failed"));
    }

    #[tokio::test]
    async fn remote_status_is_mapped() {
        let (svc, _stop) = proxied().await;

        let bad = svc.ask(&Context::background(), "bad").await.unwrap_err();
        assert_eq!(
            bad.downcast_ref::<ServiceError>(),
            Some(&ServiceError::bad_request("question must not be empty"))
        );

        let crash = svc.ask(&Context::background(), "crash").await.unwrap_err();
        assert!(matches!(crash.downcast_ref::<Error>(), Some(Error::UpstreamStatus(500))));
    }

    #[tokio::test]
    async fn caller_deadline_bounds_the_remote_call() {
        let (svc, _stop) = proxied().await;
        let ctx = Context::background().with_timeout(Duration::from_millis(50));

        let err = svc.ask(&ctx, "slow").await.unwrap_err();

        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::DeadlineExceeded)));
    }

    #[test]
    fn invalid_url_is_a_config_error() {
        assert!(matches!(
            ProxyingService::to_url(Local, "not a url", Duration::from_secs(1)),
            Err(Error::Config(_))
        ));
    }
}
