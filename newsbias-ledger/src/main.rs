//! newsbias-ledger - encrypted news-bias ledger service
//!
//! Runs the ledger against the in-process crypto service: submissions and
//! queries over HTTP, decryption results delivered by the relayer task (or
//! externally via `/api/callbacks/decryption`), ledger events over SSE.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use newsbias_common::config::resolve_service_config;
use newsbias_common::events::EventBus;
use newsbias_ledger::authorization::Principal;
use newsbias_ledger::crypto::LocalFheService;
use newsbias_ledger::{build_router, relayer, AppState, Ledger};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Command-line arguments; each overrides the config file
#[derive(Parser, Debug)]
#[command(name = "newsbias-ledger")]
#[command(about = "Encrypted news-article bias ledger")]
#[command(version)]
struct Args {
    /// Path to config.toml
    #[arg(short, long, env = "NEWSBIAS_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP port
    #[arg(short, long, env = "NEWSBIAS_PORT")]
    port: Option<u16>,

    /// Bind address
    #[arg(short, long, env = "NEWSBIAS_BIND")]
    bind: Option<String>,

    /// Principal authorized at startup
    #[arg(short, long, env = "NEWSBIAS_DEPLOYER")]
    deployer: Option<String>,

    /// Default log level when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = resolve_service_config(args.config.as_deref())
        .context("Failed to resolve configuration")?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    if let Some(deployer) = args.deployer {
        config.deployer = deployer;
    }
    if let Some(level) = args.log_level {
        config.log_level = level;
    }
    config.validate().context("Invalid configuration")?;

    let default_filter = format!(
        "newsbias_ledger={level},newsbias_common={level},tower_http={level}",
        level = config.log_level
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting newsbias-ledger v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let events = Arc::new(EventBus::new(config.event_capacity));
    let (service, requests) = LocalFheService::new();
    let service = Arc::new(service);
    let ledger = Arc::new(Ledger::new(
        Principal::new(config.deployer.as_str()),
        service.clone(),
        events,
    ));

    tokio::spawn(relayer::run(requests, service.clone(), ledger.clone()));

    let app = build_router(AppState::new(ledger, Some(service)));

    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.port)
        .parse()
        .context("Invalid bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("newsbias-ledger listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
