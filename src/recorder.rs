//! Metrics recorder capability.
//!
//! The core only ever *writes* metrics: it increments counters and records
//! observations, and never reads accumulated values back. Those two
//! operations are all the [`Counter`], [`Histogram`] and [`Gauge`] traits
//! expose, plus `with` to attach labels.
//!
//! The `Facade*` implementations forward to the [`metrics`](::metrics) facade,
//! so whatever recorder the binary installs (the Prometheus exporter, see
//! [`telemetry`](crate::telemetry)) receives the samples. Tests substitute
//! their own in-memory doubles.

use std::sync::Arc;

use ::metrics::Label;

/// Label value used to pad a dangling key.
pub const UNKNOWN_LABEL_VALUE: &str = "unknown";

/// An ordered, flattened list of label key/value pairs:
/// `["method", "uppercase", "error", "false"]`.
///
/// Always even-length. [`LabelValues::with`] pads an odd input with
/// [`UNKNOWN_LABEL_VALUE`] instead of rejecting it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelValues(Vec<String>);

impl LabelValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new set with `label_values` appended.
    pub fn with(&self, label_values: &[&str]) -> Self {
        let mut out = self.0.clone();
        out.extend(label_values.iter().map(|s| (*s).to_owned()));
        if label_values.len() % 2 != 0 {
            out.push(UNKNOWN_LABEL_VALUE.to_owned());
        }
        Self(out)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Key/value pairs in insertion order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.chunks_exact(2).map(|kv| (kv[0].as_str(), kv[1].as_str()))
    }

    fn to_labels(&self) -> Vec<Label> {
        self.pairs().map(|(k, v)| Label::new(k.to_owned(), v.to_owned())).collect()
    }
}

/// A monotonically increasing count, e.g. requests received.
pub trait Counter: Send + Sync {
    fn with(&self, label_values: &[&str]) -> Arc<dyn Counter>;
    fn add(&self, delta: u64);
}

/// A value that moves both ways over time, e.g. queue depth.
pub trait Gauge: Send + Sync {
    fn with(&self, label_values: &[&str]) -> Arc<dyn Gauge>;
    fn set(&self, value: f64);
    fn add(&self, delta: f64);
}

/// Repeated observations of the same kind of thing, e.g. request latency.
pub trait Histogram: Send + Sync {
    fn with(&self, label_values: &[&str]) -> Arc<dyn Histogram>;
    fn observe(&self, value: f64);
}

/// [`Counter`] backed by the `metrics` facade.
#[derive(Clone, Debug)]
pub struct FacadeCounter {
    name: String,
    lvs: LabelValues,
}

impl FacadeCounter {
    pub fn new(name: impl Into<String>, help: &'static str) -> Self {
        let name = name.into();
        ::metrics::describe_counter!(name.clone(), help);
        Self { name, lvs: LabelValues::new() }
    }
}

impl Counter for FacadeCounter {
    fn with(&self, label_values: &[&str]) -> Arc<dyn Counter> {
        Arc::new(Self { name: self.name.clone(), lvs: self.lvs.with(label_values) })
    }

    fn add(&self, delta: u64) {
        ::metrics::counter!(self.name.clone(), self.lvs.to_labels()).increment(delta);
    }
}

/// [`Gauge`] backed by the `metrics` facade.
#[derive(Clone, Debug)]
pub struct FacadeGauge {
    name: String,
    lvs: LabelValues,
}

impl FacadeGauge {
    pub fn new(name: impl Into<String>, help: &'static str) -> Self {
        let name = name.into();
        ::metrics::describe_gauge!(name.clone(), help);
        Self { name, lvs: LabelValues::new() }
    }
}

impl Gauge for FacadeGauge {
    fn with(&self, label_values: &[&str]) -> Arc<dyn Gauge> {
        Arc::new(Self { name: self.name.clone(), lvs: self.lvs.with(label_values) })
    }

    fn set(&self, value: f64) {
        ::metrics::gauge!(self.name.clone(), self.lvs.to_labels()).set(value);
    }

    fn add(&self, delta: f64) {
        ::metrics::gauge!(self.name.clone(), self.lvs.to_labels()).increment(delta);
    }
}

/// [`Histogram`] backed by the `metrics` facade.
#[derive(Clone, Debug)]
pub struct FacadeHistogram {
    name: String,
    lvs: LabelValues,
}

impl FacadeHistogram {
    pub fn new(name: impl Into<String>, help: &'static str) -> Self {
        let name = name.into();
        ::metrics::describe_histogram!(name.clone(), ::metrics::Unit::Seconds, help);
        Self { name, lvs: LabelValues::new() }
    }
}

impl Histogram for FacadeHistogram {
    fn with(&self, label_values: &[&str]) -> Arc<dyn Histogram> {
        Arc::new(Self { name: self.name.clone(), lvs: self.lvs.with(label_values) })
    }

    fn observe(&self, value: f64) {
        ::metrics::histogram!(self.name.clone(), self.lvs.to_labels()).record(value);
    }
}

/// The shared recorders the metrics middleware and the instrumentation
/// adapter write into. Built once at startup and handed out by `Arc`.
#[derive(Clone)]
pub struct Metrics {
    pub request_count: Arc<dyn Counter>,
    pub request_latency: Arc<dyn Histogram>,
    pub error_count: Arc<dyn Counter>,
}

impl Metrics {
    /// Facade-backed metric names: `<namespace>_<subsystem>_request_count`,
    /// `…_request_latency_seconds`, `…_error_count`.
    pub fn facade(namespace: &str, subsystem: &str) -> Self {
        let name = |suffix: &str| metric_name(namespace, subsystem, suffix);
        Self {
            request_count: Arc::new(FacadeCounter::new(
                name("request_count"),
                "Number of requests received.",
            )),
            request_latency: Arc::new(FacadeHistogram::new(
                name("request_latency_seconds"),
                "Request duration in seconds.",
            )),
            error_count: Arc::new(FacadeCounter::new(
                name("error_count"),
                "Number of errors occurred.",
            )),
        }
    }
}

/// Joins the non-empty parts with `_`.
pub fn metric_name(namespace: &str, subsystem: &str, name: &str) -> String {
    [namespace, subsystem, name]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use metrics_exporter_prometheus::PrometheusBuilder;

    use super::*;

    #[test]
    fn odd_label_values_get_padded() {
        let lvs = LabelValues::new().with(&["method"]);
        assert_eq!(lvs.as_slice(), ["method", "unknown"]);
    }

    #[test]
    fn even_label_values_pass_through() {
        let lvs = LabelValues::new().with(&["method", "uppercase"]);
        assert_eq!(lvs.as_slice(), ["method", "uppercase"]);
    }

    #[test]
    fn with_appends_without_touching_the_parent() {
        let parent = LabelValues::new().with(&["method", "ask"]);
        let child = parent.with(&["error", "true"]);

        assert_eq!(parent.as_slice().len(), 2);
        assert_eq!(
            child.pairs().collect::<Vec<_>>(),
            [("method", "ask"), ("error", "true")]
        );
    }

    #[test]
    fn metric_name_skips_empty_parts() {
        assert_eq!(metric_name("api", "string_service", "error_count"), "api_string_service_error_count");
        assert_eq!(metric_name("", "", "up"), "up");
    }

    #[test]
    fn facade_recorders_reach_the_installed_recorder() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        ::metrics::with_local_recorder(&recorder, || {
            let m = Metrics::facade("api", "string_service");
            m.request_count.with(&["method", "uppercase"]).add(1);
            m.request_count.with(&["method", "uppercase"]).add(1);
            m.error_count.with(&["method"]).add(1);
            m.request_latency.with(&["method", "uppercase"]).observe(0.25);
        });

        let out = handle.render();
        assert!(out.contains(r#"api_string_service_request_count{method="uppercase"} 2"#), "{out}");
        assert!(out.contains(r#"api_string_service_error_count{method="unknown"} 1"#), "{out}");
        assert!(out.contains("api_string_service_request_latency_seconds"), "{out}");
    }
}
