//! SalesMind API (salesmind-api) - Main entry point
//!
//! HTTP service for sales call recordings: upload, background AI analysis,
//! status polling and feedback retrieval.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use salesmind_api::config::{resolve_bind_address, resolve_gemini_api_key};
use salesmind_api::services::orchestrator::recover_unfinished;
use salesmind_api::services::{AnalysisConfig, FileStore, GeminiClient};
use salesmind_api::{build_router, db, AppState};
use salesmind_common::config::{
    default_config_path, load_toml_config, RootFolderInitializer, RootFolderResolver, TomlConfig,
};

/// Command-line arguments for salesmind-api
#[derive(Parser, Debug)]
#[command(name = "salesmind-api")]
#[command(about = "Sales call recording and AI feedback service")]
#[command(version)]
struct Args {
    /// Address to listen on (host:port)
    #[arg(short, long, env = "SALESMIND_BIND")]
    bind: Option<String>,

    /// Root folder holding the database and uploaded audio
    #[arg(short, long)]
    root_folder: Option<String>,

    /// TOML config file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().or_else(default_config_path);
    let toml_result = match config_path.as_deref() {
        Some(path) => load_toml_config(path),
        None => Ok(TomlConfig::default()),
    };

    // RUST_LOG wins over the TOML level
    let default_level = toml_result
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting SalesMind API (salesmind-api) v{}",
        env!("CARGO_PKG_VERSION")
    );

    let toml_config = toml_result.context("Failed to load configuration")?;
    if let Some(path) = &config_path {
        info!("Config file: {}", path.display());
    }

    let root_folder = RootFolderResolver::new(args.root_folder.as_deref(), &toml_config).resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to create root folder")?;
    info!("Root folder: {}", initializer.root().display());

    let db_path = initializer.database_path();
    let pool = db::init_database_pool(&db_path)
        .await
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
    info!("Database path: {}", db_path.display());

    recover_unfinished(&pool)
        .await
        .context("Failed to recover interrupted recordings")?;

    let storage = &toml_config.storage;
    let file_store = FileStore::new(initializer.uploads_path())
        .context("Failed to initialize upload storage")?
        .with_retention(storage.retention());

    let api_key = resolve_gemini_api_key(&toml_config);
    let analyzer = GeminiClient::new(AnalysisConfig::from_processing(
        api_key,
        &toml_config.processing,
    ))
    .context("Failed to build AI client")?;

    let (state, _dispatcher) = AppState::new(
        pool,
        file_store,
        Arc::new(analyzer),
        &toml_config.processing,
        &toml_config.cache,
    );

    state
        .feedback_cache
        .spawn_sweeper(Duration::from_secs(toml_config.cache.sweep_interval_secs.max(1)));
    spawn_upload_cleanup(
        Arc::clone(&state.file_store),
        storage.cleanup_interval(),
    );

    let app = build_router(state);

    let bind_address = resolve_bind_address(args.bind.as_deref(), &toml_config);
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_address))?;
    info!("salesmind-api listening on http://{}", bind_address);
    info!("Health check: http://{}/health", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Periodically prune uploads past the retention window
fn spawn_upload_cleanup(file_store: Arc<FileStore>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let report = file_store.cleanup_old_files().await;
            if report.failed > 0 {
                warn!(
                    removed = report.removed,
                    failed = report.failed,
                    "Upload cleanup finished with failures"
                );
            } else if report.removed > 0 {
                info!(removed = report.removed, "Upload cleanup finished");
            }
        }
    });
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
