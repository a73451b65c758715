//! The whole service over real HTTP, with a fake Claude upstream.

mod common;

use std::sync::Arc;
use std::time::Duration;

use http::{Method, StatusCode};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusRecorder};
use serde_json::{json, Value};
use stringsvc::config::ClaudeConfig;
use stringsvc::health::Health;
use stringsvc::proxy::ProxyingService;
use stringsvc::service::ClaudeClient;
use stringsvc::transport::{self, Endpoints};
use stringsvc::{Request, Response, Router, StringService, StringSvc};

use common::{spawn_server, RecordingMetrics, RecordingTracer, TestServer};

const API_KEY: &str = "test-key";

/// Answers like the Messages API. "overloaded" gets a 529.
async fn fake_claude() -> TestServer {
    let router = Router::new().on(Method::POST, "/v1/messages", |req: Request| async move {
        if req.header("authorization") != Some("Bearer test-key") {
            return Response::status(StatusCode::UNAUTHORIZED);
        }
        let body: Value = serde_json::from_slice(req.body()).unwrap_or(Value::Null);
        let question = body["messages"][0]["content"].as_str().unwrap_or_default().to_owned();
        assert_eq!(body["messages"][0]["role"], "user");
        assert!(body["max_tokens"].as_u64().is_some_and(|n| n > 0));

        match question.as_str() {
            "overloaded" => Response::status(StatusCode::from_u16(529).unwrap()),
            q => Response::json(&json!({
                "content": [{ "type": "text", "text": format!("claude says: {q}") }]
            })),
        }
    });
    spawn_server(router).await
}

fn claude_svc(upstream: &TestServer) -> StringSvc {
    let cfg = ClaudeConfig {
        api_key: API_KEY.into(),
        base_url: upstream.url("/v1/messages"),
        timeout_secs: 5,
        ..ClaudeConfig::default()
    };
    StringSvc::new(Arc::new(ClaudeClient::new(&cfg).unwrap()))
}

struct App {
    server: TestServer,
    health: Arc<Health>,
    // Keeps the exporter's registry alive for `/metrics`.
    recorder: PrometheusRecorder,
}

async fn app(svc: Arc<dyn StringService>) -> App {
    let recorder = PrometheusBuilder::new().build_recorder();
    let health = Arc::new(Health::new());
    let endpoints = Endpoints::new(
        svc,
        RecordingMetrics::default().metrics(),
        RecordingTracer::default().shared(),
    );
    let router = transport::router(
        endpoints,
        Arc::clone(&health),
        recorder.handle(),
        Duration::from_secs(5),
    );
    App { server: spawn_server(router).await, health, recorder }
}

async fn post(app: &App, path: &str, body: &str) -> (StatusCode, Value) {
    let resp = reqwest::Client::new()
        .post(app.server.url(path))
        .header("content-type", "application/json")
        .body(body.to_owned())
        .send()
        .await
        .unwrap();
    let status = resp.status();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn uppercase_over_http() {
    let upstream = fake_claude().await;
    let app = app(Arc::new(claude_svc(&upstream))).await;

    let (status, body) = post(&app, "/uppercase", r#"{"string":"hello"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "result": "HELLO" }));

    let (status, body) = post(&app, "/uppercase", "not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Invalid request body" }));

    let resp = reqwest::get(app.server.url("/uppercase")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);

    let resp = reqwest::get(app.server.url("/nope")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn ask_reaches_claude_and_reports_failures_in_band() {
    let upstream = fake_claude().await;
    let app = app(Arc::new(claude_svc(&upstream))).await;

    let (status, body) = post(&app, "/ask", r#"{"question":"what is rust?"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "answer": "claude says: what is rust?" }));

    let (status, body) = post(&app, "/ask", r#"{"question":"overloaded"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], "");
    assert_eq!(body["error"], "upstream returned status 529");

    let (status, body) = post(&app, "/ask", r#"{"question":"   "}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "question must not be empty" }));
}

#[tokio::test]
async fn ask_is_forwarded_to_a_peer() {
    let upstream = fake_claude().await;
    let peer = app(Arc::new(claude_svc(&upstream))).await;

    let proxied = ProxyingService::to_url(
        claude_svc(&upstream),
        &peer.server.url("/ask"),
        Duration::from_secs(5),
    )
    .unwrap();
    let front = app(Arc::new(proxied)).await;

    let (status, body) = post(&front, "/ask", r#"{"question":"hops?"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "answer": "claude says: hops?" }));

    // The peer's in-band error comes back in-band, prefixed as remote.
    let (status, body) = post(&front, "/ask", r#"{"question":"overloaded"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["error"], "remote: upstream returned status 529");

    // The peer's 400 stays a 400.
    let (status, body) = post(&front, "/ask", r#"{"question":""}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "question must not be empty");

    let (status, body) = post(&front, "/uppercase", r#"{"string":"local"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "LOCAL");
}

#[tokio::test]
async fn health_readiness_and_metrics() {
    let upstream = fake_claude().await;
    let app = app(Arc::new(claude_svc(&upstream))).await;

    let health = reqwest::get(app.server.url("/health")).await.unwrap();
    assert_eq!(health.status(), StatusCode::SERVICE_UNAVAILABLE);

    app.health.set_healthy();
    let health = reqwest::get(app.server.url("/health")).await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);
    assert_eq!(health.text().await.unwrap(), "ok");

    let ready = reqwest::get(app.server.url("/ready")).await.unwrap();
    assert_eq!(ready.status(), StatusCode::OK);
    assert_eq!(ready.text().await.unwrap(), "ready");

    metrics::with_local_recorder(&app.recorder, || {
        metrics::counter!("api_string_service_request_count").increment(3);
    });
    let exposition = reqwest::get(app.server.url("/metrics")).await.unwrap();
    assert_eq!(exposition.status(), StatusCode::OK);
    assert!(exposition.text().await.unwrap().contains("api_string_service_request_count 3"));
}
