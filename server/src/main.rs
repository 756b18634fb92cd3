//! Chorus Server - standalone headless process hosting the playback core.
//!
//! This binary owns the composition root and the operational HTTP surface.
//! The Discord gateway connection itself is external to this crate; see
//! [`collaborators`] for the placeholder `Resolver`/`VoicePlatform` this
//! process starts with until a real gateway integration is wired in.

mod collaborators;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chorus_core::api::{self, ApiState};
use chorus_core::{bootstrap_services, Config, ExternalServices};
use clap::Parser;
use tokio::signal;

use crate::collaborators::{UnconfiguredResolver, UnconfiguredVoicePlatform};

/// Chorus Server - headless process hosting a multi-tenant voice-streaming
/// playback engine.
#[derive(Parser, Debug)]
#[command(name = "chorus-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "CHORUS_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Port the health/metrics HTTP surface binds to (overrides config file).
    #[arg(short = 'p', long, env = "HEALTH_PORT")]
    health_port: Option<u16>,

    /// Directory the on-disk file cache is rooted at (overrides config file).
    #[arg(short = 'd', long, env = "CACHE_DIR")]
    cache_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("Chorus Server v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load(args.config.as_deref()).context("failed to load configuration")?;

    if let Some(port) = args.health_port {
        config.health_port = port;
    }
    if let Some(dir) = args.cache_dir {
        config.cache_dir = dir;
    }

    log::info!(
        "configuration: cache_dir={}, cache_limit_bytes={}, health_port={}",
        config.cache_dir.display(),
        config.cache_limit_bytes,
        config.health_port
    );

    let external = ExternalServices {
        resolver: Arc::new(UnconfiguredResolver),
        voice: Arc::new(UnconfiguredVoicePlatform),
        settings_store: None,
    };

    let services = bootstrap_services(&config, external).context("failed to bootstrap services")?;
    log::info!("services bootstrapped successfully");

    let api_state = ApiState {
        registry: services.registry.clone(),
        cache: services.cache.clone(),
    };
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.health_port))
        .await
        .with_context(|| format!("failed to bind health port {}", config.health_port))?;
    let health_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, api::router(api_state)).await {
            log::error!("health server error: {e}");
        }
    });
    log::info!("health/metrics surface listening on port {}", config.health_port);

    shutdown_signal().await;
    log::info!("shutdown signal received, cleaning up...");

    services.shutdown().await;
    health_handle.abort();

    log::info!("shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install sigterm handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
