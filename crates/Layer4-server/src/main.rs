//! Ralph Dashboard - Main entry point

mod routes;
mod sampler;

use anyhow::Context;
use clap::Parser;
use ralph_foundation::DashboardConfig;
use ralph_task::Engine;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Ralph Dashboard - supervise ralph-tui agents and stream their logs
#[derive(Parser, Debug)]
#[command(name = "ralph-dashboard")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Directory containing ralph-tui projects (overrides config)
    #[arg(long)]
    projects_dir: Option<String>,

    /// Config file to use instead of the stored one (.json or .toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = load_config(&args)?;
    info!("Projects directory: {}", config.projects_dir().display());

    let engine = Arc::new(Engine::from_config(&config));
    match engine.projects() {
        Ok(projects) => info!("Found {} project(s)", projects.len()),
        Err(e) => warn!("Failed to scan projects: {}", e),
    }
    engine.start_metrics_feed(sampler::HostSampler::new()).await;

    let app = routes::router(routes::AppState::new(Arc::clone(&engine)));
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Ralph Dashboard listening on http://{}", addr);

    // Closing the hub ends every WebSocket, which graceful shutdown waits for.
    let shutdown_engine = Arc::clone(&engine);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown_engine.shutdown().await;
        })
        .await
        .context("Server error")?;

    info!("Ralph Dashboard stopped");
    Ok(())
}

fn load_config(args: &Args) -> anyhow::Result<DashboardConfig> {
    let mut config = match &args.config {
        Some(path) => DashboardConfig::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => DashboardConfig::load().unwrap_or_else(|e| {
            warn!("Failed to load config: {}", e);
            DashboardConfig::default()
        }),
    };

    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(dir) = &args.projects_dir {
        config.projects_dir = dir.clone();
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("Shutdown requested");
}
