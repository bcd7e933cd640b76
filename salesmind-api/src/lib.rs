//! salesmind-api library
//!
//! Sales call recording service: accepts audio uploads, runs them through
//! transcription and AI analysis in the background, and serves the resulting
//! coaching feedback.

use axum::Router;
use chrono::{DateTime, Utc};
use salesmind_common::config::{CacheConfig, ProcessingConfig};
use salesmind_common::ResultCache;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod multipart;
pub mod services;
pub mod utils;

pub use error::{ApiError, ApiResult};

use models::FeedbackResponse;
use services::{CallAnalyzer, FileStore, ProcessingOrchestrator, ProcessingQueue};

/// Feedback lookups keyed by recording id
pub type FeedbackCache = ResultCache<i64, FeedbackResponse>;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Uploaded audio storage
    pub file_store: Arc<FileStore>,
    /// Background pipeline intake
    pub processing: ProcessingQueue,
    pub feedback_cache: Arc<FeedbackCache>,
    /// Whether the analyzer has provider credentials
    pub ai_configured: bool,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Create application state and start the processing dispatcher
    ///
    /// Must be called inside a tokio runtime. The returned handle completes
    /// once every clone of the state is dropped.
    pub fn new(
        db: SqlitePool,
        file_store: FileStore,
        analyzer: Arc<dyn CallAnalyzer>,
        processing: &ProcessingConfig,
        cache: &CacheConfig,
    ) -> (Self, JoinHandle<()>) {
        let feedback_cache = Arc::new(FeedbackCache::new(Duration::from_secs(
            cache.feedback_ttl_secs,
        )));
        let ai_configured = analyzer.is_configured();
        let orchestrator = Arc::new(ProcessingOrchestrator::new(
            db.clone(),
            analyzer,
            Arc::clone(&feedback_cache),
        ));
        let (queue, dispatcher) = ProcessingQueue::start(orchestrator, processing.max_concurrent_jobs);

        let state = Self {
            db,
            file_store: Arc::new(file_store),
            processing: queue,
            feedback_cache,
            ai_configured,
            startup_time: Utc::now(),
        };
        (state, dispatcher)
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::recording_routes())
        .merge(api::feedback_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
