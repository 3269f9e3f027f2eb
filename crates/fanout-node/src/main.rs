//! Fanout Node - Server-Sent Events broadcast service.

use anyhow::Context;
use clap::Parser;
use fanout_node::api::{create_router, AppState};
use fanout_node::config::Config;
use fanout_node::logging::{init_logging, LogFormat};
use fanout_sse::Hub;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Fanout Node - Server-Sent Events broadcast service
#[derive(Parser, Debug)]
#[command(name = "fanout-node")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// HTTP listen address (overrides the config file)
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log format (pretty, json)
    #[arg(long)]
    log_format: Option<String>,

    /// Client idle timeout in milliseconds, 0 disables it
    #[arg(long)]
    client_idle_ms: Option<u64>,

    /// Enable the /metrics endpoint
    #[arg(long)]
    metrics: bool,
}

impl Args {
    fn apply(self, mut config: Config) -> Config {
        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        if let Some(idle) = self.client_idle_ms {
            config.sse.client_idle_ms = idle;
        }
        if self.metrics {
            config.sse.metrics.enabled = true;
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let config = args.apply(config);

    init_logging(&config.log_level, LogFormat::parse(&config.log_format));
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting fanout node");
    tracing::info!(
        listen = %config.listen,
        client_idle_ms = config.sse.client_idle_ms,
        keep_alive_ms = config.sse.keep_alive_ms,
        metrics = config.sse.metrics.enabled,
        "Node configuration"
    );

    let hub = Hub::new(config.sse.clone());
    let app = create_router(AppState::new(hub.clone()));

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("binding {}", config.listen))?;
    tracing::info!(addr = %config.listen, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(hub.clone()))
        .await
        .context("HTTP server error")?;

    tracing::info!("Fanout node stopped");
    Ok(())
}

/// Wait for Ctrl+C, then close the hub so open streams write `closing` and end.
async fn shutdown_signal(hub: Hub) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown requested");
    hub.close().await;
}
