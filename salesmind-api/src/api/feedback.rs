//! Feedback retrieval
//!
//! Lookups by recording go through the shared feedback cache; the
//! orchestrator invalidates an entry when it commits new feedback.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tracing::debug;

use crate::api::recordings::owned_recording;
use crate::auth::AuthContext;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::FeedbackResponse;
use crate::AppState;

/// GET /api/feedbacks/recording/{id}
///
/// Ownership is checked on every call, cached or not.
pub async fn get_feedback_by_recording(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(recording_id): Path<i64>,
) -> ApiResult<Json<FeedbackResponse>> {
    owned_recording(&state, &auth, recording_id).await?;

    if let Some(cached) = state.feedback_cache.get(&recording_id) {
        debug!(recording_id, "Feedback cache hit");
        return Ok(Json(cached));
    }
    debug!(recording_id, "Feedback cache miss");

    let feedback = db::feedback::find_by_recording(&state.db, recording_id)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("Feedback for recording {}", recording_id))
        })?;

    let response = FeedbackResponse::from(&feedback);
    state.feedback_cache.put(recording_id, response.clone());
    Ok(Json(response))
}

/// GET /api/feedbacks/{id}
///
/// Visible to the recording's owner and to admins of the same tenant.
pub async fn get_feedback(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> ApiResult<Json<FeedbackResponse>> {
    let feedback = db::feedback::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Feedback {}", id)))?;

    if feedback.tenant_id != auth.tenant_id {
        return Err(ApiError::Forbidden(format!(
            "Feedback {} belongs to another tenant",
            id
        )));
    }
    if !auth.is_admin() {
        owned_recording(&state, &auth, feedback.recording_id).await?;
    }

    Ok(Json(FeedbackResponse::from(&feedback)))
}

/// GET /api/feedbacks
///
/// Admin only; scoped to the caller's tenant.
pub async fn list_feedbacks(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<Vec<FeedbackResponse>>> {
    if !auth.is_admin() {
        return Err(ApiError::Forbidden(
            "Listing feedback requires the ADMIN role".to_string(),
        ));
    }

    let feedbacks = db::feedback::list_by_tenant(&state.db, auth.tenant_id).await?;
    Ok(Json(feedbacks.iter().map(FeedbackResponse::from).collect()))
}

pub fn feedback_routes() -> Router<AppState> {
    Router::new()
        .route("/api/feedbacks", get(list_feedbacks))
        .route("/api/feedbacks/:id", get(get_feedback))
        .route(
            "/api/feedbacks/recording/:recording_id",
            get(get_feedback_by_recording),
        )
}
