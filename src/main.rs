use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use tracing::info;

use stringsvc::config::Config;
use stringsvc::health::Health;
use stringsvc::proxy::ProxyingService;
use stringsvc::service::{ClaudeClient, StringService, StringSvc};
use stringsvc::telemetry::{self, Telemetry};
use stringsvc::transport::{self, Endpoints};
use stringsvc::{Instrument, InstrumentedStringService, Server};

#[derive(Debug, Parser)]
#[command(version, about = "String service: uppercase and ask Claude over JSON/HTTP")]
struct Args {
    /// Path to the YAML config file.
    #[arg(short, long, env = "STRINGSVC_CONFIG", default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let cfg = Config::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    telemetry::init_logging(cfg.telemetry.log_format)?;
    let telemetry = Telemetry::install(&cfg.telemetry)?;

    let svc = build_service(&cfg, telemetry.instrument.clone())?;
    let endpoints = Endpoints::new(svc, Arc::clone(&telemetry.metrics), Arc::clone(&telemetry.tracer));

    let health = Arc::new(Health::with_gauge(Arc::clone(&telemetry.health_gauge)));
    let router = transport::router(
        endpoints,
        Arc::clone(&health),
        telemetry.exporter.clone(),
        cfg.server.request_timeout(),
    );

    let server = Server::bind(cfg.server.listen_addr()?)
        .await?
        .shutdown_timeout(cfg.server.shutdown_timeout());

    health.set_healthy();
    info!(
        service = %cfg.telemetry.service_name,
        proxy = cfg.proxy.url.as_deref().unwrap_or("none"),
        collector = cfg.telemetry.collector_addr.as_deref().unwrap_or("none"),
        "starting"
    );

    let shutdown = {
        let health = Arc::clone(&health);
        async move {
            stringsvc::shutdown_signal().await;
            health.set_unhealthy();
        }
    };
    let served = server.serve_with_shutdown(router, shutdown).await;

    telemetry.shutdown();
    Ok(served?)
}

/// `StringSvc` over Claude, or over a peer when `proxy.url` is set, wrapped
/// in per-method instrumentation.
fn build_service(cfg: &Config, instrument: Instrument) -> anyhow::Result<Arc<dyn StringService>> {
    let base = StringSvc::new(Arc::new(ClaudeClient::new(&cfg.claude)?));

    let svc: Arc<dyn StringService> = match &cfg.proxy.url {
        Some(url) => {
            let proxied = ProxyingService::to_url(base, url, cfg.server.request_timeout())?;
            Arc::new(InstrumentedStringService::new(instrument, proxied))
        }
        None => Arc::new(InstrumentedStringService::new(instrument, base)),
    };
    Ok(svc)
}
