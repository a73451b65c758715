//! Service configuration.
//!
//! Loaded once at startup from a YAML file and validated before anything
//! binds or connects. Every field has a default except the Claude API key,
//! which may also come from the `CLAUDE_API_KEY` environment variable (the
//! environment wins over the file).
//!
//! ```yaml
//! server:
//!   addr: 0.0.0.0:8080
//!   shutdown_timeout_secs: 10
//!   request_timeout_secs: 30
//! telemetry:
//!   service_name: string-service
//!   log_format: text            # or json
//!   metrics_namespace: api
//!   metrics_subsystem: string_service
//!   sampling_ratio: 1.0         # share of root traces sampled
//!   collector_addr: otel-collector:4317   # optional, OTLP/gRPC span export
//! claude:
//!   api_key: sk-...
//!   base_url: https://api.anthropic.com/v1/messages
//!   model: claude-3-5-haiku-latest
//!   timeout_secs: 30
//!   max_tokens: 1024
//! proxy:
//!   url: http://other-instance:8080/ask   # optional
//! ```

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Error;

/// Environment variable overriding `claude.api_key`.
pub const API_KEY_ENV: &str = "CLAUDE_API_KEY";

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub claude: ClaudeConfig,
    pub proxy: ProxyConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub addr: String,
    /// Upper bound on draining in-flight connections after a shutdown signal.
    pub shutdown_timeout_secs: u64,
    /// Deadline attached to every request's context.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_owned(),
            shutdown_timeout_secs: 10,
            request_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> Result<SocketAddr, Error> {
        self.addr
            .parse()
            .map_err(|e| Error::config(format!("server.addr `{}`: {e}", self.addr)))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub log_format: LogFormat,
    pub metrics_namespace: String,
    pub metrics_subsystem: String,
    pub sampling_ratio: f64,
    /// OTLP/gRPC collector receiving finished spans. Unset keeps spans
    /// in-process.
    pub collector_addr: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "string-service".to_owned(),
            log_format: LogFormat::Text,
            metrics_namespace: "api".to_owned(),
            metrics_subsystem: "string_service".to_owned(),
            sampling_ratio: 1.0,
            collector_addr: None,
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClaudeConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
}

impl Default for ClaudeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.anthropic.com/v1/messages".to_owned(),
            model: "claude-3-5-haiku-latest".to_owned(),
            timeout_secs: 30,
            max_tokens: 1024,
        }
    }
}

// Keeps the key out of logs.
impl std::fmt::Debug for ClaudeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaudeConfig")
            .field("api_key", &if self.api_key.is_empty() { "" } else { "***" })
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// When `url` is set, `ask` is forwarded to another instance of this service
/// instead of calling Claude directly.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProxyConfig {
    pub url: Option<String>,
}

impl Config {
    /// Reads `path`, applies the environment override and validates.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("reading {}: {e}", path.display())))?;
        let config = Self::from_yaml(&raw)?.with_api_key(std::env::var(API_KEY_ENV).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parses without validating.
    pub fn from_yaml(raw: &str) -> Result<Self, Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Replaces the API key when `key` is present and non-empty.
    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        if let Some(key) = key.filter(|k| !k.is_empty()) {
            self.claude.api_key = key;
        }
        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        self.server.listen_addr()?;
        if self.server.shutdown_timeout_secs == 0 {
            return Err(Error::config("server.shutdown_timeout_secs must be > 0"));
        }
        if self.server.request_timeout_secs == 0 {
            return Err(Error::config("server.request_timeout_secs must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.telemetry.sampling_ratio) {
            return Err(Error::config("telemetry.sampling_ratio must be within 0.0..=1.0"));
        }
        if let Some(addr) = &self.telemetry.collector_addr {
            let endpoint = crate::telemetry::collector_endpoint(addr);
            let parsed = reqwest::Url::parse(&endpoint)
                .map_err(|e| Error::config(format!("telemetry.collector_addr `{addr}`: {e}")))?;
            if parsed.host_str().is_none_or(str::is_empty) {
                return Err(Error::config(format!("telemetry.collector_addr `{addr}` has no host")));
            }
        }
        if self.claude.base_url.is_empty() {
            return Err(Error::config("claude.base_url must not be empty"));
        }
        if self.claude.model.is_empty() {
            return Err(Error::config("claude.model must not be empty"));
        }
        if self.claude.timeout_secs == 0 {
            return Err(Error::config("claude.timeout_secs must be > 0"));
        }
        if self.claude.max_tokens == 0 {
            return Err(Error::config("claude.max_tokens must be > 0"));
        }
        // Without a proxy every `ask` goes straight to Claude.
        if self.proxy.url.is_none() && self.claude.api_key.is_empty() {
            return Err(Error::config(format!(
                "claude.api_key is empty; set it in the config file or via {API_KEY_ENV}"
            )));
        }
        if let Some(url) = &self.proxy.url {
            reqwest::Url::parse(url).map_err(|e| Error::config(format!("proxy.url `{url}`: {e}")))?;
        }
        Ok(())
    }
}
