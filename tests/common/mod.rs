//! Shared test doubles: in-memory metrics and tracer, and a helper that runs
//! a [`Router`] on an ephemeral port.

#![allow(dead_code)]

use std::error::Error as StdError;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use stringsvc::trace::{KeyValue, Span, Tracer};
use stringsvc::{Context, Counter, Histogram, LabelValues, Metrics, Router, Server};
use tokio::sync::oneshot;

// ── Metrics ──────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct RecordingCounter {
    lvs: LabelValues,
    adds: Arc<Mutex<Vec<(LabelValues, u64)>>>,
}

impl RecordingCounter {
    pub fn total(&self) -> u64 {
        self.adds.lock().unwrap().iter().map(|(_, n)| n).sum()
    }

    pub fn adds(&self) -> Vec<(LabelValues, u64)> {
        self.adds.lock().unwrap().clone()
    }
}

impl Counter for RecordingCounter {
    fn with(&self, label_values: &[&str]) -> Arc<dyn Counter> {
        Arc::new(Self { lvs: self.lvs.with(label_values), adds: Arc::clone(&self.adds) })
    }

    fn add(&self, delta: u64) {
        self.adds.lock().unwrap().push((self.lvs.clone(), delta));
    }
}

#[derive(Clone, Default)]
pub struct RecordingHistogram {
    lvs: LabelValues,
    observations: Arc<Mutex<Vec<(LabelValues, f64)>>>,
}

impl RecordingHistogram {
    pub fn observations(&self) -> Vec<(LabelValues, f64)> {
        self.observations.lock().unwrap().clone()
    }
}

impl Histogram for RecordingHistogram {
    fn with(&self, label_values: &[&str]) -> Arc<dyn Histogram> {
        Arc::new(Self { lvs: self.lvs.with(label_values), observations: Arc::clone(&self.observations) })
    }

    fn observe(&self, value: f64) {
        self.observations.lock().unwrap().push((self.lvs.clone(), value));
    }
}

/// A [`Metrics`] set whose every write can be inspected afterwards.
#[derive(Clone, Default)]
pub struct RecordingMetrics {
    pub requests: RecordingCounter,
    pub latency: RecordingHistogram,
    pub errors: RecordingCounter,
}

impl RecordingMetrics {
    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::new(Metrics {
            request_count: Arc::new(self.requests.clone()),
            request_latency: Arc::new(self.latency.clone()),
            error_count: Arc::new(self.errors.clone()),
        })
    }
}

pub fn labels(pairs: &[&str]) -> LabelValues {
    LabelValues::new().with(pairs)
}

// ── Tracing ──────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default)]
pub struct SpanRecord {
    pub name: &'static str,
    pub parent: Option<usize>,
    pub attributes: Vec<KeyValue>,
    pub errors: Vec<String>,
    pub ended: usize,
}

/// Marker the tracer puts into the derived context: the index of the span
/// that context belongs to.
#[derive(Clone, Copy, Debug)]
struct ActiveSpan(usize);

#[derive(Clone, Default)]
pub struct RecordingTracer {
    spans: Arc<Mutex<Vec<SpanRecord>>>,
}

impl RecordingTracer {
    pub fn shared(&self) -> Arc<dyn Tracer> {
        Arc::new(self.clone())
    }

    pub fn spans(&self) -> Vec<SpanRecord> {
        self.spans.lock().unwrap().clone()
    }
}

impl Tracer for RecordingTracer {
    fn start(&self, ctx: &Context, name: &'static str) -> (Context, Box<dyn Span>) {
        let parent = ctx.value::<ActiveSpan>().map(|a| a.0);
        let mut spans = self.spans.lock().unwrap();
        let index = spans.len();
        spans.push(SpanRecord { name, parent, ..Default::default() });
        (
            ctx.with_value(ActiveSpan(index)),
            Box::new(RecordingSpan { index, spans: Arc::clone(&self.spans) }),
        )
    }
}

struct RecordingSpan {
    index: usize,
    spans: Arc<Mutex<Vec<SpanRecord>>>,
}

impl RecordingSpan {
    fn record(&self, f: impl FnOnce(&mut SpanRecord)) {
        f(&mut self.spans.lock().unwrap()[self.index]);
    }
}

impl Span for RecordingSpan {
    fn set_attributes(&mut self, attributes: Vec<KeyValue>) {
        self.record(|s| s.attributes.extend(attributes));
    }

    fn record_error(&mut self, err: &(dyn StdError + 'static)) {
        self.record(|s| s.errors.push(err.to_string()));
    }

    fn end(&mut self) {
        self.record(|s| s.ended += 1);
    }
}

// ── HTTP ─────────────────────────────────────────────────────────────────────

/// A server running in the background. Stops when dropped.
pub struct TestServer {
    pub addr: SocketAddr,
    _stop: oneshot::Sender<()>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }
}

pub async fn spawn_server(router: Router) -> TestServer {
    let server = Server::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let addr = server.local_addr();
    let (stop, stopped) = oneshot::channel();
    tokio::spawn(server.serve_with_shutdown(router, async {
        let _ = stopped.await;
    }));
    TestServer { addr, _stop: stop }
}
