//! Unified error type.

/// Error type carried across the endpoint seam.
///
/// Business errors travel through every middleware as a `BoxError` and come
/// out the other side as the same value. Downcast at the edge when the
/// concrete type matters (see [`transport`](crate::transport)).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by stringsvc's own fallible operations.
///
/// These are infrastructure failures: binding a port, loading config,
/// talking to the upstream language-model API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config: {0}")]
    Config(String),

    #[error("config yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("upstream: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("upstream returned status {0}")]
    UpstreamStatus(u16),

    #[error("upstream response carried no answer")]
    EmptyAnswer,

    #[error("remote: {0}")]
    Remote(String),

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("metrics exporter: {0}")]
    Exporter(String),
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
