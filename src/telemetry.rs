//! Process-wide telemetry setup: log subscriber, Prometheus recorder and the
//! OpenTelemetry tracer provider.
//!
//! Everything here installs global state, so the binary calls it exactly once
//! at startup. Library code and tests never go through this module; they
//! hand the middlewares their own recorders and tracers.

use std::sync::Arc;

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider};
use opentelemetry_sdk::Resource;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, TelemetryConfig};
use crate::error::Error;
use crate::instrument::{Instrument, METHOD_REQUEST_LATENCY};
use crate::recorder::{metric_name, FacadeGauge, Gauge, Metrics};
use crate::trace::{OtelTracer, Tracer};

/// Latency buckets in seconds. Uppercasing lands in the first few, Claude
/// round trips in the last few.
pub const LATENCY_BUCKETS: &[f64] =
    &[0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Installs the global `tracing` subscriber. `RUST_LOG` filters, default
/// `info`.
pub fn init_logging(format: LogFormat) -> Result<(), Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().flatten_event(true).try_init(),
    };
    installed.map_err(|e| Error::config(format!("installing log subscriber: {e}")))
}

/// Installs the Prometheus recorder as the global `metrics` recorder. The
/// returned handle renders the exposition for `GET /metrics`.
pub fn install_prometheus(cfg: &TelemetryConfig) -> Result<PrometheusHandle, Error> {
    prometheus_builder(cfg)?
        .install_recorder()
        .map_err(|e| Error::Exporter(e.to_string()))
}

/// Exporter builder with [`LATENCY_BUCKETS`] on both latency histograms.
pub fn prometheus_builder(cfg: &TelemetryConfig) -> Result<PrometheusBuilder, Error> {
    let name = |suffix: &str| metric_name(&cfg.metrics_namespace, &cfg.metrics_subsystem, suffix);
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(name("request_latency_seconds")), LATENCY_BUCKETS)
        .and_then(|b| b.set_buckets_for_metric(Matcher::Full(name(METHOD_REQUEST_LATENCY)), LATENCY_BUCKETS))
        .map_err(|e| Error::Exporter(e.to_string()))
}

/// Tracer provider sampling `sampling_ratio` of root traces and honouring the
/// parent's decision otherwise.
///
/// With `collector_addr` set, finished spans are batched and sent to that
/// OTLP/gRPC collector. Without it, spans are sampled and dropped. Must be
/// called inside a tokio runtime when exporting.
pub fn tracer_provider(cfg: &TelemetryConfig) -> Result<SdkTracerProvider, Error> {
    let builder = SdkTracerProvider::builder()
        .with_sampler(sampler(cfg.sampling_ratio))
        .with_resource(Resource::builder().with_service_name(cfg.service_name.clone()).build());

    let Some(addr) = &cfg.collector_addr else {
        return Ok(builder.build());
    };
    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(collector_endpoint(addr))
        .build()
        .map_err(|e| Error::Exporter(format!("otlp exporter for `{addr}`: {e}")))?;
    Ok(builder.with_batch_exporter(exporter).build())
}

/// `host:port` as written in the config, or a full URL.
pub fn collector_endpoint(addr: &str) -> String {
    if addr.contains("://") { addr.to_owned() } else { format!("http://{addr}") }
}

fn sampler(ratio: f64) -> Sampler {
    Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(ratio)))
}

/// The recorders and tracer the service is wired with.
pub struct Telemetry {
    pub metrics: Arc<Metrics>,
    pub instrument: Instrument,
    pub health_gauge: Arc<dyn Gauge>,
    pub exporter: PrometheusHandle,
    pub tracer: Arc<dyn Tracer>,
    provider: SdkTracerProvider,
}

impl Telemetry {
    /// Installs the Prometheus recorder and builds the tracer. Call after
    /// [`init_logging`].
    pub fn install(cfg: &TelemetryConfig) -> Result<Self, Error> {
        let exporter = install_prometheus(cfg)?;
        let metrics = Arc::new(Metrics::facade(&cfg.metrics_namespace, &cfg.metrics_subsystem));
        let instrument = Instrument::facade(&cfg.metrics_namespace, &cfg.metrics_subsystem);
        let health_gauge: Arc<dyn Gauge> = Arc::new(FacadeGauge::new(
            metric_name(&cfg.metrics_namespace, &cfg.metrics_subsystem, "healthy"),
            "1 while the service reports healthy, 0 otherwise.",
        ));

        let provider = tracer_provider(cfg)?;
        let tracer: Arc<dyn Tracer> = Arc::new(OtelTracer::new(provider.tracer(cfg.service_name.clone())));

        Ok(Self { metrics, instrument, health_gauge, exporter, tracer, provider })
    }

    /// Flushes and stops the tracer provider.
    pub fn shutdown(self) {
        if let Err(e) = self.provider.shutdown() {
            tracing::warn!("tracer provider shutdown: {e}");
        }
    }
}
