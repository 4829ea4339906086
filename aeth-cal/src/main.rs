//! aeth-cal - Topic calibration microservice
//!
//! Decomposes topics into prerequisite graphs, generates calibration probes,
//! and scores submitted answers into per-concept stability.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aeth_cal::services::{CalibrationPipeline, GeminiClient, PipelineSettings};
use aeth_cal::AppState;
use aeth_common::config::{RootFolderInitializer, RootFolderResolver};

const MODULE_NAME: &str = "aeth-cal";

#[derive(Parser, Debug)]
#[command(name = "aeth-cal")]
#[command(about = "Topic decomposition and calibration microservice")]
#[command(version)]
struct Args {
    /// Root folder holding aetheliz.db
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Port to listen on (overrides TOML)
    #[arg(short, long, env = "AETH_CAL_PORT")]
    port: Option<u16>,

    /// Bootstrap TOML file (default ~/.config/aetheliz/aeth-cal.toml)
    #[arg(short, long, env = "AETH_CAL_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = aeth_common::config::load_or_default(args.config.as_deref(), MODULE_NAME)
        .context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("aeth_cal={0},aeth_common={0},tower_http=info", toml_config.logging.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting aeth-cal v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE"),
    );

    let root_folder = RootFolderResolver::new(MODULE_NAME)
        .with_cli_arg(args.root_folder)
        .with_toml_config(&toml_config)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;
    info!("Root folder: {}", initializer.root_folder().display());

    let db_path = initializer.database_path();
    let db = aeth_cal::db::init_database_pool(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    info!("Database: {}", db_path.display());

    let shared_secret = aeth_common::api::load_shared_secret(&db)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load shared secret: {}", e))?;
    if shared_secret == 0 {
        warn!("Caller signature checking disabled (shared secret is 0)");
    }

    let api_key = aeth_cal::config::resolve_completion_api_key(&db, &toml_config).await?;
    let client = GeminiClient::new(&toml_config.completion, api_key)?;
    info!(
        endpoint = %toml_config.completion.endpoint,
        requests_per_second = toml_config.completion.requests_per_second,
        timeout_secs = toml_config.completion.timeout_secs,
        "Completion client ready"
    );

    let pipeline = CalibrationPipeline::new(
        db,
        Arc::new(client),
        PipelineSettings::from_config(&toml_config),
    );
    let state = AppState::new(Arc::new(pipeline), shared_secret);
    let app = aeth_cal::build_router(state);

    let port = args.port.unwrap_or(toml_config.port);
    let addr: SocketAddr = format!("{}:{}", toml_config.bind_address, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}", toml_config.bind_address))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
