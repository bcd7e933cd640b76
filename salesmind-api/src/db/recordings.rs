//! Recording persistence

use chrono::Utc;
use salesmind_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqlitePool};

use super::parse_timestamp;
use crate::models::{NewRecording, ProcessingStatus, Recording, SaleStatus};

const COLUMNS: &str = "id, user_id, client_id, audio_path, audio_filename, transcript, ai_summary, \
     sale_status, processing_status, duration_seconds, error_message, recorded_at, created_at, updated_at";

fn recording_from_row(row: &SqliteRow) -> Result<Recording> {
    let sale_status: String = row.try_get("sale_status")?;
    let processing_status: String = row.try_get("processing_status")?;
    let recorded_at: String = row.try_get("recorded_at")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Recording {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        client_id: row.try_get("client_id")?,
        audio_path: row.try_get("audio_path")?,
        audio_filename: row.try_get("audio_filename")?,
        transcript: row.try_get("transcript")?,
        ai_summary: row.try_get("ai_summary")?,
        sale_status: sale_status.parse::<SaleStatus>().map_err(Error::Internal)?,
        processing_status: processing_status
            .parse::<ProcessingStatus>()
            .map_err(Error::Internal)?,
        duration_seconds: row.try_get("duration_seconds")?,
        error_message: row.try_get("error_message")?,
        recorded_at: parse_timestamp("recorded_at", &recorded_at)?,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

/// Store a new recording in UPLOADING / PENDENTE
pub async fn insert(pool: &SqlitePool, new: &NewRecording) -> Result<Recording> {
    let now = Utc::now().to_rfc3339();
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO recordings (
            user_id, client_id, audio_path, audio_filename,
            sale_status, processing_status, duration_seconds,
            recorded_at, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING {}
        "#,
        COLUMNS
    ))
    .bind(new.user_id)
    .bind(new.client_id)
    .bind(&new.audio_path)
    .bind(&new.audio_filename)
    .bind(SaleStatus::Pendente.as_str())
    .bind(ProcessingStatus::Uploading.as_str())
    .bind(new.duration_seconds)
    .bind(&now)
    .bind(&now)
    .bind(&now)
    .fetch_one(pool)
    .await?;

    recording_from_row(&row)
}

pub async fn find_by_id<'e, E>(executor: E, id: i64) -> Result<Option<Recording>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!("SELECT {} FROM recordings WHERE id = ?", COLUMNS))
        .bind(id)
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(recording_from_row).transpose()
}

/// A user's recordings, newest first
pub async fn list_by_user(pool: &SqlitePool, user_id: i64) -> Result<Vec<Recording>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM recordings WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(recording_from_row).collect()
}

/// Write back every mutable column of `recording`
pub async fn update<'e, E>(executor: E, recording: &Recording) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE recordings SET
            transcript = ?,
            ai_summary = ?,
            sale_status = ?,
            processing_status = ?,
            duration_seconds = ?,
            error_message = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&recording.transcript)
    .bind(&recording.ai_summary)
    .bind(recording.sale_status.as_str())
    .bind(recording.processing_status.as_str())
    .bind(recording.duration_seconds)
    .bind(&recording.error_message)
    .bind(Utc::now().to_rfc3339())
    .bind(recording.id)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Recording {}", recording.id)));
    }
    Ok(())
}

/// Polling projection: flags only, no transcript payload
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingStatus {
    pub id: i64,
    pub user_id: i64,
    pub processing_status: ProcessingStatus,
    pub sale_status: SaleStatus,
    pub has_transcript: bool,
    pub has_summary: bool,
    pub has_feedback: bool,
    pub error_message: Option<String>,
}

pub async fn find_status(pool: &SqlitePool, id: i64) -> Result<Option<RecordingStatus>> {
    let row = sqlx::query(
        r#"
        SELECT r.id, r.user_id, r.processing_status, r.sale_status, r.error_message,
               r.transcript IS NOT NULL AS has_transcript,
               r.ai_summary IS NOT NULL AS has_summary,
               EXISTS (SELECT 1 FROM feedback f WHERE f.recording_id = r.id) AS has_feedback
        FROM recordings r
        WHERE r.id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let processing_status: String = row.try_get("processing_status")?;
    let sale_status: String = row.try_get("sale_status")?;
    Ok(Some(RecordingStatus {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        processing_status: processing_status.parse().map_err(Error::Internal)?,
        sale_status: sale_status.parse().map_err(Error::Internal)?,
        has_transcript: row.try_get("has_transcript")?,
        has_summary: row.try_get("has_summary")?,
        has_feedback: row.try_get("has_feedback")?,
        error_message: row.try_get("error_message")?,
    }))
}

/// Move every non-terminal recording to ERRO; returns how many changed
pub async fn fail_unfinished(pool: &SqlitePool, message: &str) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE recordings
        SET processing_status = ?, error_message = ?, updated_at = ?
        WHERE processing_status IN (?, ?)
        "#,
    )
    .bind(ProcessingStatus::Erro.as_str())
    .bind(message)
    .bind(Utc::now().to_rfc3339())
    .bind(ProcessingStatus::Uploading.as_str())
    .bind(ProcessingStatus::Processando.as_str())
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
