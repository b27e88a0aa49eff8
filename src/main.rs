use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use product_advisor::api::{AppState, create_router};
use product_advisor::config::CONFIG;
use product_advisor::gateway::Limits;

#[derive(Debug, Parser)]
#[command(about = "Product comparison and recommendation gateway")]
struct Cli {
    /// Port to listen on (overrides PORT)
    #[arg(long)]
    port: Option<u16>,
    /// Analyzer deadline in seconds (overrides ANALYZER_TIMEOUT_SECS)
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Directory with the client UI (overrides STATIC_DIR)
    #[arg(long)]
    static_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber (handles both tracing and log crate)
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(true)
        .init();

    let cli = Cli::parse();
    let mut config = (*CONFIG).clone();
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(secs) = cli.timeout_secs {
        config.analyzer_timeout = Duration::from_secs(secs);
    }
    if let Some(dir) = cli.static_dir {
        config.static_dir = dir;
    }

    let analyzer = config.analyzer_command();
    let analyzer_version = analyzer
        .self_check()
        .await
        .with_context(|| format!("analyzer runtime {} is not available", analyzer.program()))?;
    tracing::info!(
        "analyzer runtime verified: {} ({})",
        analyzer_version,
        config.analyzer_script.display()
    );

    let state = Arc::new(AppState {
        analyzer,
        analyzer_version,
        limits: Limits::default(),
        timeout: config.analyzer_timeout,
        deployment: config.deployment,
        started_at: chrono::Utc::now(),
        static_dir: config.static_dir.clone(),
        body_limit_bytes: config.body_limit_bytes,
    });

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;
    tracing::info!(
        "listening on {} ({} mode)",
        listener.local_addr()?,
        config.deployment.as_str()
    );

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {:#}", e);
    }
    tracing::info!("shutting down");
}
