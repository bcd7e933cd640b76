//! Recording upload, status polling and retrieval
//!
//! POST /api/recordings/upload, GET /api/recordings, GET /api/recordings/{id},
//! GET /api/recordings/{id}/status, GET /api/recordings/{id}/audio

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::AuthContext;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{FeedbackResponse, NewRecording, ProcessingStatus, Recording, SaleStatus};
use crate::multipart;
use crate::services::analysis_client::mime_type_for;
use crate::services::file_store::MAX_FILE_SIZE;
use crate::AppState;

/// Form field carrying the client id
pub const CLIENT_FIELD: &str = "idCliente";
/// Form field carrying the audio file
pub const AUDIO_FIELD: &str = "audioFile";

/// Rough bytes-per-second used for the duration estimate
const BYTES_PER_SECOND: usize = 16_000;

/// Request body ceiling; leaves room for multipart framing around a file at
/// the storage limit so oversized files reach the store's own check
const UPLOAD_BODY_LIMIT: usize = MAX_FILE_SIZE as usize + 4 * 1024 * 1024;

const UPLOAD_ACCEPTED_MESSAGE: &str = "Audio upload successful. Processing started asynchronously.";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub id: i64,
    pub status: ProcessingStatus,
    pub message: String,
    pub audio_filename: String,
    pub audio_url: String,
    pub estimated_duration: String,
    pub check_status_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingStatusResponse {
    pub id: i64,
    pub status_processamento: ProcessingStatus,
    pub status_venda: SaleStatus,
    pub has_transcricao: bool,
    pub has_resumo: bool,
    pub has_feedback: bool,
    pub erro_processamento: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingResponse {
    pub id: i64,
    pub id_usuario: i64,
    pub id_cliente: i64,
    pub audio_filename: String,
    pub audio_url: String,
    pub transcricao: Option<String>,
    pub resumo_ia: Option<String>,
    pub status_venda: SaleStatus,
    pub status_processamento: ProcessingStatus,
    pub duracao_segundos: Option<i64>,
    pub erro_processamento: Option<String>,
    pub data_gravacao: DateTime<Utc>,
    pub data_criacao: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<FeedbackResponse>,
}

impl RecordingResponse {
    fn new(recording: Recording, feedback: Option<FeedbackResponse>) -> Self {
        Self {
            audio_url: audio_url(recording.id),
            id: recording.id,
            id_usuario: recording.user_id,
            id_cliente: recording.client_id,
            audio_filename: recording.audio_filename,
            transcricao: recording.transcript,
            resumo_ia: recording.ai_summary,
            status_venda: recording.sale_status,
            status_processamento: recording.processing_status,
            duracao_segundos: recording.duration_seconds,
            erro_processamento: recording.error_message,
            data_gravacao: recording.recorded_at,
            data_criacao: recording.created_at,
            feedback,
        }
    }
}

fn audio_url(id: i64) -> String {
    format!("/api/recordings/{}/audio", id)
}

fn status_url(id: i64) -> String {
    format!("/api/recordings/{}/status", id)
}

/// Load a recording the caller owns
pub(crate) async fn owned_recording(
    state: &AppState,
    auth: &AuthContext,
    id: i64,
) -> ApiResult<Recording> {
    let recording = db::recordings::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Recording {}", id)))?;
    if recording.user_id != auth.user_id {
        return Err(ApiError::Forbidden(format!(
            "Recording {} belongs to another user",
            id
        )));
    }
    Ok(recording)
}

/// POST /api/recordings/upload
///
/// Multipart form with `idCliente` and `audioFile`. Stores the audio,
/// creates the recording in UPLOADING and queues it for processing.
/// Responds 202 before any processing happens.
pub async fn upload_recording(
    State(state): State<AppState>,
    auth: AuthContext,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("Missing Content-Type header".to_string()))?;

    let mut form = multipart::parse(content_type, &body)?;

    let client_id: i64 = form
        .field(CLIENT_FIELD)
        .ok_or_else(|| ApiError::BadRequest(format!("Missing required field '{}'", CLIENT_FIELD)))?
        .trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Field '{}' must be a number", CLIENT_FIELD)))?;

    let file = form
        .take_file(AUDIO_FIELD)
        .ok_or_else(|| ApiError::BadRequest(format!("Missing required file '{}'", AUDIO_FIELD)))?;
    if file.filename.trim().is_empty() {
        return Err(ApiError::BadRequest("No file uploaded".to_string()));
    }

    let uploader = db::tenants::find_user(&state.db, auth.user_id)
        .await?
        .filter(|user| user.tenant_id == auth.tenant_id)
        .ok_or_else(|| ApiError::Unauthorized(format!("Unknown user {}", auth.user_id)))?;

    let client = db::tenants::find_client(&state.db, client_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Client {}", client_id)))?;
    if client.tenant_id != uploader.tenant_id {
        return Err(ApiError::Forbidden(format!(
            "Client {} belongs to another tenant",
            client_id
        )));
    }

    let stored_path = state
        .file_store
        .save_file(file.data.as_slice(), &file.filename, uploader.id, client.id)
        .await?;
    let duration_seconds = (file.len() / BYTES_PER_SECOND) as i64;

    let new_recording = NewRecording {
        user_id: uploader.id,
        client_id: client.id,
        audio_path: stored_path.to_string_lossy().into_owned(),
        audio_filename: file.filename.clone(),
        duration_seconds: Some(duration_seconds),
    };
    let recording = match db::recordings::insert(&state.db, &new_recording).await {
        Ok(recording) => recording,
        Err(e) => {
            state.file_store.delete_file(&stored_path).await;
            return Err(e.into());
        }
    };

    tracing::info!(
        recording_id = recording.id,
        user_id = uploader.id,
        client_id = client.id,
        bytes = file.len(),
        "Recording uploaded"
    );

    state.processing.submit(recording.id).await;

    let response = UploadResponse {
        id: recording.id,
        status: recording.processing_status,
        message: UPLOAD_ACCEPTED_MESSAGE.to_string(),
        audio_filename: recording.audio_filename,
        audio_url: audio_url(recording.id),
        estimated_duration: format!("{}s", duration_seconds),
        check_status_at: status_url(recording.id),
    };

    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// GET /api/recordings/{id}/status
pub async fn get_recording_status(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> ApiResult<Json<RecordingStatusResponse>> {
    let status = db::recordings::find_status(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Recording {}", id)))?;
    if status.user_id != auth.user_id {
        return Err(ApiError::Forbidden(format!(
            "Recording {} belongs to another user",
            id
        )));
    }

    Ok(Json(RecordingStatusResponse {
        id: status.id,
        status_processamento: status.processing_status,
        status_venda: status.sale_status,
        has_transcricao: status.has_transcript,
        has_resumo: status.has_summary,
        has_feedback: status.has_feedback,
        erro_processamento: status.error_message,
    }))
}

/// GET /api/recordings/{id}
pub async fn get_recording(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> ApiResult<Json<RecordingResponse>> {
    let recording = owned_recording(&state, &auth, id).await?;
    let feedback = db::feedback::find_by_recording(&state.db, id)
        .await?
        .map(|f| FeedbackResponse::from(&f));
    Ok(Json(RecordingResponse::new(recording, feedback)))
}

/// GET /api/recordings
pub async fn list_recordings(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<Vec<RecordingResponse>>> {
    let recordings = db::recordings::list_by_user(&state.db, auth.user_id).await?;
    Ok(Json(
        recordings
            .into_iter()
            .map(|r| RecordingResponse::new(r, None))
            .collect(),
    ))
}

/// GET /api/recordings/{id}/audio
pub async fn get_recording_audio(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let recording = owned_recording(&state, &auth, id).await?;
    let path = std::path::Path::new(&recording.audio_path);
    let data = match tokio::fs::read(path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound(format!(
                "Audio for recording {} is no longer stored",
                id
            )))
        }
        Err(e) => return Err(e.into()),
    };
    Ok(([(header::CONTENT_TYPE, mime_type_for(path))], data))
}

pub fn recording_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/recordings/upload",
            post(upload_recording).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/api/recordings", get(list_recordings))
        .route("/api/recordings/:id", get(get_recording))
        .route("/api/recordings/:id/status", get(get_recording_status))
        .route("/api/recordings/:id/audio", get(get_recording_audio))
}
