//! JSON-over-HTTP transport.
//!
//! Three layers, outermost first:
//!
//! 1. [`json_handler`]: the HTTP edge. Decodes the body, builds the
//!    [`Context`], runs the endpoint under the request deadline and turns the
//!    outcome into a status + JSON body.
//! 2. [`Endpoints`]: one middleware chain per operation,
//!    `tracing → metrics → logging → base`.
//! 3. `make_*_endpoint`: base endpoints calling the [`StringService`].
//!
//! [`router`] wires all of it, plus health and metrics, into the route table.

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use http::{Method, StatusCode};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::context::Context;
use crate::endpoint::Endpoint;
use crate::error::{BoxError, Error};
use crate::handler::Handler;
use crate::health::{self, Health};
use crate::middleware::{chain, layer, Chain, Logging, MetricsMiddleware, Middleware, TracingMiddleware};
use crate::recorder::Metrics;
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;
use crate::service::{ServiceError, StringService};
use crate::trace::{KeyValue, TraceAttributes, Tracer};

/// Body of a `400` for JSON that does not decode into the request type.
pub const INVALID_BODY: &str = "Invalid request body";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UppercaseRequest {
    #[serde(rename = "string")]
    pub s: String,
}

impl TraceAttributes for UppercaseRequest {
    fn trace_attributes(&self) -> Vec<KeyValue> {
        vec![KeyValue::new("input", self.s.clone())]
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UppercaseResponse {
    #[serde(rename = "result")]
    pub v: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `{"error": "..."}`, the body of every non-2xx JSON answer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// A [`ServiceError`] stays an error so the edge can answer with its code.
/// Any other failure is reported in-band next to an empty result.
fn fold<T>(
    result: Result<String, BoxError>,
    ok: impl FnOnce(String) -> T,
    failed: impl FnOnce(String) -> T,
) -> Result<T, BoxError> {
    match result {
        Ok(v) => Ok(ok(v)),
        Err(e) if e.is::<ServiceError>() => Err(e),
        Err(e) => Ok(failed(e.to_string())),
    }
}

pub fn make_uppercase_endpoint(
    svc: Arc<dyn StringService>,
) -> Endpoint<UppercaseRequest, UppercaseResponse> {
    Endpoint::new(move |_ctx, req: UppercaseRequest| {
        let svc = Arc::clone(&svc);
        async move {
            fold(
                svc.uppercase(&req.s).await,
                |v| UppercaseResponse { v, error: None },
                |e| UppercaseResponse { v: String::new(), error: Some(e) },
            )
        }
    })
}

pub fn make_ask_endpoint(svc: Arc<dyn StringService>) -> Endpoint<AskRequest, AskResponse> {
    Endpoint::new(move |ctx: Context, req: AskRequest| {
        let svc = Arc::clone(&svc);
        async move {
            fold(
                svc.ask(&ctx, &req.question).await,
                |answer| AskResponse { answer, error: None },
                |e| AskResponse { answer: String::new(), error: Some(e) },
            )
        }
    })
}

/// The composed endpoint of every operation.
#[derive(Clone, Debug)]
pub struct Endpoints {
    pub uppercase: Endpoint<UppercaseRequest, UppercaseResponse>,
    pub ask: Endpoint<AskRequest, AskResponse>,
}

impl Endpoints {
    /// Wraps both base endpoints in `tracing → metrics → logging`. Uppercase
    /// spans carry the input string; ask spans carry no attributes.
    pub fn new(svc: Arc<dyn StringService>, metrics: Arc<Metrics>, tracer: Arc<dyn Tracer>) -> Self {
        let uppercase_stack: Chain<UppercaseRequest, UppercaseResponse> = chain(
            TracingMiddleware::traced(Arc::clone(&tracer)),
            [layer(MetricsMiddleware::new(Arc::clone(&metrics))), layer(Logging)],
        );
        let ask_stack: Chain<AskRequest, AskResponse> = chain(
            TracingMiddleware::new(tracer),
            [layer(MetricsMiddleware::new(metrics)), layer(Logging)],
        );

        let uppercase = uppercase_stack.wrap(make_uppercase_endpoint(Arc::clone(&svc)));
        let ask = ask_stack.wrap(make_ask_endpoint(svc));

        Self { uppercase, ask }
    }
}

/// Serves `endpoint` as a JSON handler.
///
/// The chain is only entered with a well-formed request: a body that does
/// not decode answers `400 {"error":"Invalid request body"}` directly.
pub fn json_handler<Req, Resp>(endpoint: Endpoint<Req, Resp>, request_timeout: Duration) -> impl Handler
where
    Req: DeserializeOwned + Send + 'static,
    Resp: Serialize + Send + 'static,
{
    move |req: Request| {
        let endpoint = endpoint.clone();
        async move {
            let Ok(body) = serde_json::from_slice::<Req>(req.body()) else {
                return error_response(StatusCode::BAD_REQUEST, INVALID_BODY);
            };

            let ctx = Context::background()
                .with_request_meta(req.method().as_str(), req.path())
                .with_timeout(request_timeout);

            let err = match ctx.within_deadline(endpoint.call(ctx.clone(), body)).await {
                Ok(Ok(resp)) => return Response::json(&resp),
                Ok(Err(e)) => e,
                Err(e) => e.into(),
            };

            let status = status_for(&*err);
            if status.is_server_error() {
                warn!(path = %req.path(), status = status.as_u16(), error = %err, "request failed");
            }
            error_response(status, &err.to_string())
        }
    }
}

/// Maps an endpoint error to the status the client sees.
///
/// For the endpoints [`Endpoints`] builds, only a [`ServiceError`] and the
/// edge's own [`Error::DeadlineExceeded`] get here: the base endpoints fold
/// every other failure into the response body. The upstream branches (`502`,
/// and `504` for a client timeout) serve endpoints that return those errors
/// directly, such as [`remote_ask_endpoint`](crate::proxy::remote_ask_endpoint)
/// served through [`json_handler`].
pub fn status_for(err: &(dyn StdError + Send + Sync + 'static)) -> StatusCode {
    if let Some(e) = err.downcast_ref::<ServiceError>() {
        return StatusCode::from_u16(e.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    }
    match err.downcast_ref::<Error>() {
        Some(Error::DeadlineExceeded) => StatusCode::GATEWAY_TIMEOUT,
        Some(Error::Upstream(e)) if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
        Some(Error::Upstream(_) | Error::UpstreamStatus(_) | Error::EmptyAnswer | Error::Remote(_)) => {
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    Response::builder()
        .status(status)
        .json(&ErrorBody { error: message.to_owned() })
}

/// `GET /metrics`: Prometheus text exposition.
pub fn metrics_handler(handle: PrometheusHandle) -> impl Handler {
    move |_req: Request| {
        let body = handle.render();
        async move { Response::text(body) }
    }
}

/// The full route table.
pub fn router(
    endpoints: Endpoints,
    health: Arc<Health>,
    exporter: PrometheusHandle,
    request_timeout: Duration,
) -> Router {
    Router::new()
        .on(Method::POST, "/uppercase", json_handler(endpoints.uppercase, request_timeout))
        .on(Method::POST, "/ask", json_handler(endpoints.ask, request_timeout))
        .on(Method::GET, "/health", health::liveness(health))
        .on(Method::GET, "/ready", health::readiness)
        .on(Method::GET, "/metrics", metrics_handler(exporter))
}
