//! SQLite storage for recordings, feedback and tenant lookups

pub mod feedback;
pub mod recordings;
pub mod tenants;

use salesmind_common::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (creating if needed) the database file and ensure the schema
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;

    init_tables(&pool).await?;
    Ok(pool)
}

/// Private in-memory database with the full schema
///
/// Limited to one connection: every pooled connection to `:memory:` would
/// otherwise see its own empty database.
pub async fn init_memory_pool() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    init_tables(&pool).await?;
    Ok(pool)
}

/// Create tables and indexes if they do not exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'VENDEDOR'
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS clients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id INTEGER NOT NULL,
            name TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS recordings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id),
            client_id INTEGER NOT NULL REFERENCES clients(id),
            audio_path TEXT NOT NULL,
            audio_filename TEXT NOT NULL,
            transcript TEXT,
            ai_summary TEXT,
            sale_status TEXT NOT NULL DEFAULT 'PENDENTE',
            processing_status TEXT NOT NULL DEFAULT 'UPLOADING',
            duration_seconds INTEGER,
            error_message TEXT,
            recorded_at TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_recordings_user ON recordings(user_id, created_at)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_recordings_status ON recordings(processing_status)",
    )
    .execute(pool)
    .await?;

    // List columns hold JSON arrays of strings
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS feedback (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            recording_id INTEGER NOT NULL UNIQUE REFERENCES recordings(id) ON DELETE CASCADE,
            tenant_id INTEGER NOT NULL,
            strengths TEXT NOT NULL DEFAULT '[]',
            weaknesses TEXT NOT NULL DEFAULT '[]',
            suggestions TEXT NOT NULL DEFAULT '[]',
            objections TEXT NOT NULL DEFAULT '[]',
            key_moments TEXT NOT NULL DEFAULT '[]',
            sentiment_score INTEGER CHECK (sentiment_score BETWEEN 0 AND 100),
            closing_probability INTEGER CHECK (closing_probability BETWEEN 0 AND 100),
            sentiment_category TEXT,
            service_quality_score INTEGER CHECK (service_quality_score BETWEEN 0 AND 100),
            script_adherence_score INTEGER CHECK (script_adherence_score BETWEEN 0 AND 100),
            objection_handling_score INTEGER CHECK (objection_handling_score BETWEEN 0 AND 100),
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_feedback_tenant ON feedback(tenant_id)")
        .execute(pool)
        .await?;

    tracing::info!("Database tables initialized (users, clients, recordings, feedback)");
    Ok(())
}

pub(crate) fn parse_timestamp(column: &str, value: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| {
            salesmind_common::Error::Internal(format!("Failed to parse {}: {}", column, e))
        })
}
