//! Shared fixtures for salesmind-api integration tests

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use http_body_util::BodyExt;
use salesmind_api::models::{ProcessingStatus, Role};
use salesmind_api::services::{AnalysisError, AnalysisResult, CallAnalyzer, FileStore};
use salesmind_api::{build_router, db, AppState};
use salesmind_common::config::{CacheConfig, ProcessingConfig};
use sqlx::{Row, SqlitePool};
use tempfile::TempDir;
use tower::util::ServiceExt;

pub const BOUNDARY: &str = "----salesmind-test-boundary";

/// Where the fake analyzer should fail, if anywhere
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FailAt {
    Nowhere,
    Transcribe,
    Analyze,
}

/// What a run looked like from inside the analyzer
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub status: ProcessingStatus,
    pub has_transcript: bool,
}

/// Scripted [`CallAnalyzer`] that records what it saw
pub struct FakeAnalyzer {
    pub transcript: String,
    pub result: AnalysisResult,
    pub fail_at: FailAt,
    pub delay: Duration,
    observer: Option<SqlitePool>,
    observations: Mutex<Vec<Observation>>,
}

impl FakeAnalyzer {
    pub fn new(result: AnalysisResult) -> Self {
        Self {
            transcript: "Vendedor: Bom dia!\nCliente: Bom dia, tudo bem?".to_string(),
            result,
            fail_at: FailAt::Nowhere,
            delay: Duration::ZERO,
            observer: None,
            observations: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(fail_at: FailAt) -> Self {
        Self {
            fail_at,
            ..Self::new(AnalysisResult::default())
        }
    }

    /// Read the recording's row during transcription
    pub fn observing(mut self, pool: SqlitePool) -> Self {
        self.observer = Some(pool);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn observations(&self) -> Vec<Observation> {
        self.observations.lock().unwrap().clone()
    }
}

#[async_trait]
impl CallAnalyzer for FakeAnalyzer {
    async fn transcribe(&self, file_path: &Path) -> Result<String, AnalysisError> {
        if let Some(pool) = &self.observer {
            let row = sqlx::query(
                "SELECT processing_status, transcript FROM recordings WHERE audio_path = ?",
            )
            .bind(file_path.to_string_lossy().to_string())
            .fetch_one(pool)
            .await
            .unwrap();
            let status: String = row.get("processing_status");
            let transcript: Option<String> = row.get("transcript");
            self.observations.lock().unwrap().push(Observation {
                status: status.parse().unwrap(),
                has_transcript: transcript.is_some(),
            });
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail_at == FailAt::Transcribe {
            return Err(AnalysisError::RemoteApiError {
                status: 503,
                body: "transcription backend unavailable".to_string(),
            });
        }
        Ok(self.transcript.clone())
    }

    async fn analyze(&self, _transcript: &str) -> Result<AnalysisResult, AnalysisError> {
        if self.fail_at == FailAt::Analyze {
            return Err(AnalysisError::ContentBlocked("SAFETY".to_string()));
        }
        Ok(self.result.clone())
    }

    fn is_configured(&self) -> bool {
        true
    }
}

/// Analysis with a given closing probability and a couple of list entries
pub fn analysis(closing_probability: i32) -> AnalysisResult {
    AnalysisResult {
        summary: "Cliente interessado no plano anual.".to_string(),
        strengths: vec!["Rapport inicial".to_string()],
        weaknesses: vec!["Não confirmou orçamento".to_string()],
        suggestions: vec!["Enviar proposta por escrito".to_string()],
        sentiment_score: 75,
        closing_probability,
        objections: vec!["Preço".to_string()],
        key_moments: vec!["01:23 - objeção de preço".to_string()],
        service_quality_score: Some(80),
        ..AnalysisResult::default()
    }
}

/// One tenant's worth of rows
pub struct Seed {
    pub tenant_id: i64,
    pub user_id: i64,
    pub admin_id: i64,
    pub client_id: i64,
}

pub async fn seed_tenant(pool: &SqlitePool, tenant_id: i64) -> Seed {
    Seed {
        tenant_id,
        user_id: db::tenants::insert_user(pool, tenant_id, "Vendedor", Role::Vendedor)
            .await
            .unwrap(),
        admin_id: db::tenants::insert_user(pool, tenant_id, "Admin", Role::Admin)
            .await
            .unwrap(),
        client_id: db::tenants::insert_client(pool, tenant_id, "Cliente")
            .await
            .unwrap(),
    }
}

/// Running application over an in-memory database and a temp upload dir
pub struct TestApp {
    pub state: AppState,
    pub pool: SqlitePool,
    pub analyzer: Arc<FakeAnalyzer>,
    pub uploads: TempDir,
}

impl TestApp {
    pub async fn new(analyzer: FakeAnalyzer) -> Self {
        Self::build(analyzer, None).await
    }

    /// Same as [`TestApp::new`] with a smaller per-file upload limit
    pub async fn with_max_file_size(analyzer: FakeAnalyzer, max_bytes: u64) -> Self {
        Self::build(analyzer, Some(max_bytes)).await
    }

    async fn build(analyzer: FakeAnalyzer, max_file_size: Option<u64>) -> Self {
        let pool = db::init_memory_pool().await.unwrap();
        let uploads = TempDir::new().unwrap();
        let analyzer = Arc::new(analyzer);
        let mut file_store = FileStore::new(uploads.path()).unwrap();
        if let Some(max_bytes) = max_file_size {
            file_store = file_store.with_max_file_size(max_bytes);
        }
        let (state, _dispatcher) = AppState::new(
            pool.clone(),
            file_store,
            analyzer.clone(),
            &ProcessingConfig::default(),
            &CacheConfig::default(),
        );
        Self {
            state,
            pool,
            analyzer,
            uploads,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        build_router(self.state.clone())
            .oneshot(request)
            .await
            .unwrap()
    }

    /// Poll the status endpoint until the recording is terminal
    pub async fn wait_for_terminal(&self, recording_id: i64, user: (i64, i64, &str)) -> serde_json::Value {
        for _ in 0..200 {
            let response = self
                .send(get_as(&format!("/api/recordings/{}/status", recording_id), user))
                .await;
            let body = json_body(response).await;
            let status = body["statusProcessamento"].as_str().unwrap_or_default().to_string();
            if status == "CONCLUIDO" || status == "ERRO" {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("recording {} never reached a terminal state", recording_id);
    }
}

/// Identity headers for (user_id, tenant_id, role)
pub fn with_identity(
    builder: axum::http::request::Builder,
    (user_id, tenant_id, role): (i64, i64, &str),
) -> axum::http::request::Builder {
    builder
        .header("x-user-id", user_id.to_string())
        .header("x-tenant-id", tenant_id.to_string())
        .header("x-user-role", role)
}

pub fn get_as(uri: &str, user: (i64, i64, &str)) -> Request<Body> {
    with_identity(Request::builder().uri(uri), user)
        .body(Body::empty())
        .unwrap()
}

/// multipart/form-data body with text fields and files (field, filename, bytes)
pub fn multipart_body(fields: &[(&str, &str)], files: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    for (name, filename, data) in files {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, name, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn upload_request(body: Vec<u8>, user: Option<(i64, i64, &str)>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/recordings/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
    if let Some(user) = user {
        builder = with_identity(builder, user);
    }
    builder.body(Body::from(body)).unwrap()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Every regular file under `dir`
pub fn stored_files(dir: &Path) -> Vec<std::path::PathBuf> {
    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect()
}
