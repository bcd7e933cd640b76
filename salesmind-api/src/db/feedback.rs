//! Feedback persistence
//!
//! List-valued fields are stored as JSON arrays in TEXT columns.

use chrono::Utc;
use salesmind_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqlitePool};

use super::parse_timestamp;
use crate::models::{Feedback, NewFeedback, SentimentCategory};

const COLUMNS: &str = "id, recording_id, tenant_id, strengths, weaknesses, suggestions, objections, \
     key_moments, sentiment_score, closing_probability, sentiment_category, service_quality_score, \
     script_adherence_score, objection_handling_score, created_at";

fn encode_list(column: &str, items: &[String]) -> Result<String> {
    serde_json::to_string(items)
        .map_err(|e| Error::Internal(format!("Failed to serialize {}: {}", column, e)))
}

fn decode_list(row: &SqliteRow, column: &str) -> Result<Vec<String>> {
    let raw: String = row.try_get(column)?;
    serde_json::from_str(&raw)
        .map_err(|e| Error::Internal(format!("Failed to deserialize {}: {}", column, e)))
}

fn feedback_from_row(row: &SqliteRow) -> Result<Feedback> {
    let category: Option<String> = row.try_get("sentiment_category")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(Feedback {
        id: row.try_get("id")?,
        recording_id: row.try_get("recording_id")?,
        tenant_id: row.try_get("tenant_id")?,
        strengths: decode_list(row, "strengths")?,
        weaknesses: decode_list(row, "weaknesses")?,
        suggestions: decode_list(row, "suggestions")?,
        objections: decode_list(row, "objections")?,
        key_moments: decode_list(row, "key_moments")?,
        sentiment_score: row.try_get("sentiment_score")?,
        closing_probability: row.try_get("closing_probability")?,
        stored_category: category
            .map(|c| c.parse::<SentimentCategory>())
            .transpose()
            .map_err(Error::Internal)?,
        service_quality_score: row.try_get("service_quality_score")?,
        script_adherence_score: row.try_get("script_adherence_score")?,
        objection_handling_score: row.try_get("objection_handling_score")?,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}

/// Insert feedback; fails if the recording already has one
pub async fn insert<'e, E>(executor: E, new: &NewFeedback) -> Result<Feedback>
where
    E: Executor<'e, Database = Sqlite>,
{
    let strengths = encode_list("strengths", &new.strengths)?;
    let weaknesses = encode_list("weaknesses", &new.weaknesses)?;
    let suggestions = encode_list("suggestions", &new.suggestions)?;
    let objections = encode_list("objections", &new.objections)?;
    let key_moments = encode_list("key_moments", &new.key_moments)?;

    let row = sqlx::query(&format!(
        r#"
        INSERT INTO feedback (
            recording_id, tenant_id, strengths, weaknesses, suggestions, objections,
            key_moments, sentiment_score, closing_probability, sentiment_category,
            service_quality_score, script_adherence_score, objection_handling_score, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING {}
        "#,
        COLUMNS
    ))
    .bind(new.recording_id)
    .bind(new.tenant_id)
    .bind(strengths)
    .bind(weaknesses)
    .bind(suggestions)
    .bind(objections)
    .bind(key_moments)
    .bind(new.sentiment_score)
    .bind(new.closing_probability)
    .bind(new.sentiment_category.map(|c| c.as_str()))
    .bind(new.service_quality_score)
    .bind(new.script_adherence_score)
    .bind(new.objection_handling_score)
    .bind(Utc::now().to_rfc3339())
    .fetch_one(executor)
    .await?;

    feedback_from_row(&row)
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Feedback>> {
    let row = sqlx::query(&format!("SELECT {} FROM feedback WHERE id = ?", COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(feedback_from_row).transpose()
}

pub async fn find_by_recording(pool: &SqlitePool, recording_id: i64) -> Result<Option<Feedback>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM feedback WHERE recording_id = ?",
        COLUMNS
    ))
    .bind(recording_id)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(feedback_from_row).transpose()
}

/// All feedback of a tenant, newest first
pub async fn list_by_tenant(pool: &SqlitePool, tenant_id: i64) -> Result<Vec<Feedback>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM feedback WHERE tenant_id = ? ORDER BY created_at DESC, id DESC",
        COLUMNS
    ))
    .bind(tenant_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(feedback_from_row).collect()
}
