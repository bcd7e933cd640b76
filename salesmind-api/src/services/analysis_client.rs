//! Generative-AI client for call transcription and analysis
//!
//! Talks to the Gemini REST API:
//!
//! 1. `POST /upload/v1beta/files` with `X-Goog-Upload-Command: start` declares
//!    size and MIME type and returns a one-time upload URL in the
//!    `X-Goog-Upload-URL` response header
//! 2. `POST {upload_url}` with `upload, finalize` sends the bytes and returns
//!    the file resource
//! 3. `GET /v1beta/files/{name}` is polled until the file is `ACTIVE`
//! 4. `POST /v1beta/models/{model}:generateContent` runs the prompt
//!
//! The credential is only checked when a call is made, so a service started
//! without one still serves every non-AI endpoint.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::SentimentCategory;
use salesmind_common::config::ProcessingConfig;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Upper bound on list items requested from the model
const MAX_LIST_ITEMS: usize = 3;

const DEFAULT_SCORE: i32 = 50;
const SUMMARY_UNAVAILABLE: &str = "Análise não disponível";
const SUMMARY_PENDING: &str = "Análise pendente";

const TRANSCRIPTION_PROMPT: &str = "Transcreva este áudio de uma ligação de vendas em português. \
Inclua todas as falas com precisão, na ordem em que ocorrem. \
Responda somente com a transcrição, sem introdução, comentários ou formatação adicional.";

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("AI provider credential is not configured")]
    Unconfigured,

    #[error("AI provider returned HTTP {status}: {body}")]
    RemoteApiError { status: u16, body: String },

    #[error("Uploaded file not ready after {attempts} status checks")]
    Timeout { attempts: u32 },

    #[error("Content blocked by provider safety policy: {0}")]
    ContentBlocked(String),

    #[error("Provider failed to process the file: {0}")]
    RemoteProcessingFailed(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected provider response: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for AnalysisError {
    fn from(e: reqwest::Error) -> Self {
        AnalysisError::Network(e.to_string())
    }
}

/// Structured outcome of analyzing a transcript
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub summary: String,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub suggestions: Vec<String>,
    pub sentiment_score: i32,
    pub closing_probability: i32,
    pub sentiment_category: SentimentCategory,
    pub service_quality_score: Option<i32>,
    pub script_adherence_score: Option<i32>,
    pub objection_handling_score: Option<i32>,
    pub objections: Vec<String>,
    pub key_moments: Vec<String>,
}

impl Default for AnalysisResult {
    /// Placeholder used when the model output cannot be read at all
    fn default() -> Self {
        Self {
            summary: SUMMARY_PENDING.to_string(),
            strengths: Vec::new(),
            weaknesses: Vec::new(),
            suggestions: Vec::new(),
            sentiment_score: DEFAULT_SCORE,
            closing_probability: DEFAULT_SCORE,
            sentiment_category: SentimentCategory::Neutro,
            service_quality_score: None,
            script_adherence_score: None,
            objection_handling_score: None,
            objections: Vec::new(),
            key_moments: Vec::new(),
        }
    }
}

/// Transcription and analysis backend used by the pipeline
#[async_trait]
pub trait CallAnalyzer: Send + Sync {
    /// Transcribe the audio file at `file_path`
    async fn transcribe(&self, file_path: &Path) -> Result<String, AnalysisError>;

    /// Produce structured feedback for a transcript
    async fn analyze(&self, transcript: &str) -> Result<AnalysisResult, AnalysisError>;

    /// Whether calls can succeed at all (credential present)
    fn is_configured(&self) -> bool;
}

/// Connection and polling settings
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self::from_processing(None, &ProcessingConfig::default())
    }
}

impl AnalysisConfig {
    pub fn from_processing(api_key: Option<String>, processing: &ProcessingConfig) -> Self {
        Self {
            api_key,
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            connect_timeout: Duration::from_secs(processing.connect_timeout_secs),
            request_timeout: Duration::from_secs(processing.request_timeout_secs),
            poll_interval: Duration::from_secs(processing.poll_interval_secs),
            max_poll_attempts: processing.max_poll_attempts.max(1),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }
}

/// Gemini REST client
pub struct GeminiClient {
    http_client: reqwest::Client,
    config: AnalysisConfig,
}

impl GeminiClient {
    pub fn new(config: AnalysisConfig) -> Result<Self, AnalysisError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AnalysisError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    fn api_key(&self) -> Result<&str, AnalysisError> {
        self.config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(AnalysisError::Unconfigured)
    }

    /// Steps 1+2: hand the bytes to the provider, returning the file URI
    async fn upload_file(
        &self,
        api_key: &str,
        data: Vec<u8>,
        mime_type: &str,
        display_name: &str,
    ) -> Result<String, AnalysisError> {
        let start_url = format!("{}/upload/v1beta/files", self.config.api_base);
        let response = self
            .http_client
            .post(&start_url)
            .header("x-goog-api-key", api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", data.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&json!({ "file": { "display_name": display_name } }))
            .send()
            .await?;
        let response = check_status(response).await?;

        let upload_url = response
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| AnalysisError::Parse("missing X-Goog-Upload-URL header".to_string()))?;

        debug!(bytes = data.len(), mime_type, "Upload session opened");

        let response = self
            .http_client
            .post(&upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(data)
            .send()
            .await?;
        let response = check_status(response).await?;

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::Parse(format!("upload response: {}", e)))?;
        Ok(body.file.uri)
    }

    /// Step 3: poll until the uploaded file is usable
    async fn wait_until_active(&self, api_key: &str, file_uri: &str) -> Result<(), AnalysisError> {
        let file_name = file_uri.rsplit('/').next().unwrap_or(file_uri);
        let status_url = format!("{}/v1beta/files/{}", self.config.api_base, file_name);
        let attempts = self.config.max_poll_attempts;

        for attempt in 1..=attempts {
            let response = self
                .http_client
                .get(&status_url)
                .header("x-goog-api-key", api_key)
                .send()
                .await?;
            let response = check_status(response).await?;
            let status: FileStatus = response
                .json()
                .await
                .map_err(|e| AnalysisError::Parse(format!("file status: {}", e)))?;

            match status.state.as_deref() {
                Some("ACTIVE") => {
                    debug!(file = file_name, attempt, "Uploaded file is active");
                    return Ok(());
                }
                Some("FAILED") => {
                    let detail = status
                        .error
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "no error detail".to_string());
                    return Err(AnalysisError::RemoteProcessingFailed(detail));
                }
                state => {
                    debug!(file = file_name, attempt, state = ?state, "Waiting for file");
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.config.poll_interval).await;
            }
        }

        Err(AnalysisError::Timeout { attempts })
    }

    /// Step 4: run a prompt, optionally against an uploaded file
    async fn generate_content(
        &self,
        api_key: &str,
        prompt: &str,
        file: Option<(&str, &str)>,
    ) -> Result<String, AnalysisError> {
        let mut parts = vec![json!({ "text": prompt })];
        if let Some((file_uri, mime_type)) = file {
            parts.push(json!({
                "file_data": { "file_uri": file_uri, "mime_type": mime_type }
            }));
        }

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.api_base, self.config.model
        );
        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&json!({ "contents": [{ "parts": parts }] }))
            .send()
            .await?;
        let response = check_status(response).await?;

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::Parse(format!("generateContent response: {}", e)))?;
        extract_text(body)
    }
}

#[async_trait]
impl CallAnalyzer for GeminiClient {
    async fn transcribe(&self, file_path: &Path) -> Result<String, AnalysisError> {
        let api_key = self.api_key()?;

        let data = tokio::fs::read(file_path).await?;
        let mime_type = mime_type_for(file_path);
        let display_name = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio");

        info!(file = display_name, bytes = data.len(), "Starting transcription");

        let file_uri = self
            .upload_file(api_key, data, mime_type, display_name)
            .await?;
        self.wait_until_active(api_key, &file_uri).await?;

        let raw = self
            .generate_content(api_key, TRANSCRIPTION_PROMPT, Some((file_uri.as_str(), mime_type)))
            .await?;
        let transcript = clean_transcript(&raw);

        info!(file = display_name, chars = transcript.len(), "Transcription finished");
        Ok(transcript)
    }

    async fn analyze(&self, transcript: &str) -> Result<AnalysisResult, AnalysisError> {
        let api_key = self.api_key()?;

        let raw = self
            .generate_content(api_key, &analysis_prompt(transcript), None)
            .await?;
        Ok(parse_analysis(&raw))
    }

    fn is_configured(&self) -> bool {
        self.api_key().is_ok()
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AnalysisError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AnalysisError::RemoteApiError {
        status: status.as_u16(),
        body,
    })
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: UploadedFile,
}

#[derive(Debug, Deserialize)]
struct UploadedFile {
    uri: String,
}

#[derive(Debug, Deserialize)]
struct FileStatus {
    state: Option<String>,
    error: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<CandidateContent>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ContentPart>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ContentPart {
    pub text: Option<String>,
}

/// Text of the first candidate, or the reason there is none
pub fn extract_text(response: GenerateContentResponse) -> Result<String, AnalysisError> {
    if let Some(reason) = response
        .prompt_feedback
        .and_then(|f| f.block_reason)
        .filter(|r| !r.is_empty())
    {
        return Err(AnalysisError::ContentBlocked(reason));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| AnalysisError::Parse("response has no candidates".to_string()))?;

    if let Some(reason @ ("SAFETY" | "PROHIBITED_CONTENT")) = candidate.finish_reason.as_deref() {
        return Err(AnalysisError::ContentBlocked(reason.to_string()));
    }

    candidate
        .content
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .ok_or_else(|| AnalysisError::Parse("candidate has no text".to_string()))
}

/// Audio MIME type inferred from the file extension
pub fn mime_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("mp3") => "audio/mp3",
        Some("wav") => "audio/wav",
        Some("m4a") | Some("mp4") => "audio/mp4",
        Some("ogg") => "audio/ogg",
        Some("flac") => "audio/flac",
        _ => "audio/mpeg",
    }
}

static TRANSCRIPT_INTRO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\A[^\n]*?transcrição[^\n]*?áudio[^\n]*?:[ \t]*\r?\n?").expect("Invalid regex"));
static TRANSCRIPT_START_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^[^\n]*início da transcrição[^\n]*$").expect("Invalid regex"));
static TRANSCRIPT_END_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)fim da transcrição.*\z").expect("Invalid regex"));
static BLANK_LINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*\r?\n").expect("Invalid regex"));

/// Remove model boilerplate around a transcript
pub fn clean_transcript(raw: &str) -> String {
    let text = TRANSCRIPT_INTRO.replace(raw, "");
    let text = TRANSCRIPT_START_MARKER.replace_all(&text, "");
    let text = TRANSCRIPT_END_MARKER.replace(&text, "");
    let text = BLANK_LINES.replace_all(&text, "");
    text.trim().to_string()
}

fn analysis_prompt(transcript: &str) -> String {
    format!(
        r#"Você é um especialista em vendas. Analise a transcrição da ligação abaixo e responda APENAS com um objeto JSON válido, sem texto antes ou depois, com exatamente estas chaves:

{{
  "resumo": "resumo objetivo da ligação em até 3 frases",
  "pontosFortes": ["até {n} pontos fortes do vendedor"],
  "pontosFracos": ["até {n} pontos a melhorar"],
  "sugestoes": ["até {n} sugestões práticas"],
  "sentimentScore": 0-100,
  "probabilidadeFechamento": 0-100,
  "categoriaAmbiental": "POSITIVO" | "NEUTRO" | "NEGATIVO",
  "qualidadeAtendimento": 0-100,
  "aderenciaScript": 0-100,
  "gestaoObjecoes": 0-100,
  "objecoesIdentificadas": ["objeções levantadas pelo cliente"],
  "momentosChave": ["MM:SS - descrição do momento"]
}}

Transcrição:
{transcript}"#,
        n = MAX_LIST_ITEMS,
        transcript = transcript
    )
}

/// Remove a surrounding Markdown code fence, if any
pub fn strip_code_fences(raw: &str) -> &str {
    let text = raw.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```JSON"))
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}

/// Parse model output into an [`AnalysisResult`]
///
/// Never fails: missing or malformed fields fall back to defaults, and
/// output that is not a JSON object yields [`AnalysisResult::default`].
pub fn parse_analysis(raw: &str) -> AnalysisResult {
    let json: Value = match serde_json::from_str(strip_code_fences(raw)) {
        Ok(value @ Value::Object(_)) => value,
        Ok(_) => {
            warn!("Analysis output is not a JSON object, using defaults");
            return AnalysisResult::default();
        }
        Err(e) => {
            warn!(error = %e, "Analysis output is not valid JSON, using defaults");
            return AnalysisResult::default();
        }
    };

    let summary = json
        .get("resumo")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(SUMMARY_UNAVAILABLE)
        .to_string();

    let sentiment_category = json
        .get("categoriaAmbiental")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .unwrap_or(SentimentCategory::Neutro);

    AnalysisResult {
        summary,
        strengths: string_list(&json, "pontosFortes"),
        weaknesses: string_list(&json, "pontosFracos"),
        suggestions: string_list(&json, "sugestoes"),
        sentiment_score: score(&json, "sentimentScore").unwrap_or(DEFAULT_SCORE),
        closing_probability: score(&json, "probabilidadeFechamento").unwrap_or(DEFAULT_SCORE),
        sentiment_category,
        service_quality_score: score(&json, "qualidadeAtendimento"),
        script_adherence_score: score(&json, "aderenciaScript"),
        objection_handling_score: score(&json, "gestaoObjecoes"),
        objections: string_list(&json, "objecoesIdentificadas"),
        key_moments: string_list(&json, "momentosChave")
            .into_iter()
            .map(|m| normalize_timestamp(&m))
            .collect(),
    }
}

/// Integer score clamped to [0, 100]; accepts numbers and numeric strings
fn score(json: &Value, key: &str) -> Option<i32> {
    let value = json.get(key)?;
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !number.is_finite() {
        return None;
    }
    Some(number.round().clamp(0.0, 100.0) as i32)
}

fn string_list(json: &Value, key: &str) -> Vec<String> {
    let Some(items) = json.get(key).and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Null => None,
            other => Some(other.to_string()),
        })
        .filter(|s| !s.is_empty())
        .collect()
}

static SHORT_MINUTES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\A(\d):(\d{2})(.*)\z").expect("Invalid regex"));

/// Zero-pad single-digit minutes: `1:23 - x` → `01:23 - x`
pub fn normalize_timestamp(moment: &str) -> String {
    let moment = moment.trim();
    match SHORT_MINUTES.captures(moment) {
        Some(caps) => format!("0{}:{}{}", &caps[1], &caps[2], &caps[3]),
        None => moment.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_types() {
        assert_eq!(mime_type_for(Path::new("a.mp3")), "audio/mp3");
        assert_eq!(mime_type_for(Path::new("a.WAV")), "audio/wav");
        assert_eq!(mime_type_for(Path::new("a.m4a")), "audio/mp4");
        assert_eq!(mime_type_for(Path::new("a.ogg")), "audio/ogg");
        assert_eq!(mime_type_for(Path::new("a.flac")), "audio/flac");
        assert_eq!(mime_type_for(Path::new("a.bin")), "audio/mpeg");
        assert_eq!(mime_type_for(Path::new("noext")), "audio/mpeg");
    }

    #[test]
    fn test_normalize_timestamp() {
        assert_eq!(normalize_timestamp("1:23 - abertura"), "01:23 - abertura");
        assert_eq!(normalize_timestamp("12:30 - fechamento"), "12:30 - fechamento");
        assert_eq!(normalize_timestamp("0:05"), "00:05");
        assert_eq!(normalize_timestamp("sem horário"), "sem horário");
        assert_eq!(normalize_timestamp("123:45 - x"), "123:45 - x");
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn test_parse_full_analysis() {
        let raw = r#"```json
{
  "resumo": "Cliente interessado no plano anual.",
  "pontosFortes": ["Rapport", "Clareza"],
  "pontosFracos": ["Pouca escuta"],
  "sugestoes": ["Fazer mais perguntas"],
  "sentimentScore": 82,
  "probabilidadeFechamento": "75",
  "categoriaAmbiental": "positivo",
  "qualidadeAtendimento": 90.4,
  "aderenciaScript": 130,
  "gestaoObjecoes": -5,
  "objecoesIdentificadas": ["Preço"],
  "momentosChave": ["1:23 - apresentação", "10:02 - proposta"]
}
```"#;
        let result = parse_analysis(raw);

        assert_eq!(result.summary, "Cliente interessado no plano anual.");
        assert_eq!(result.strengths, vec!["Rapport", "Clareza"]);
        assert_eq!(result.sentiment_score, 82);
        assert_eq!(result.closing_probability, 75);
        assert_eq!(result.sentiment_category, SentimentCategory::Positivo);
        assert_eq!(result.service_quality_score, Some(90));
        assert_eq!(result.script_adherence_score, Some(100));
        assert_eq!(result.objection_handling_score, Some(0));
        assert_eq!(result.objections, vec!["Preço"]);
        assert_eq!(result.key_moments, vec!["01:23 - apresentação", "10:02 - proposta"]);
    }

    #[test]
    fn test_parse_missing_fields_use_defaults() {
        let result = parse_analysis(r#"{"pontosFortes": "not a list", "sentimentScore": "high"}"#);

        assert_eq!(result.summary, "Análise não disponível");
        assert!(result.strengths.is_empty());
        assert_eq!(result.sentiment_score, 50);
        assert_eq!(result.closing_probability, 50);
        assert_eq!(result.sentiment_category, SentimentCategory::Neutro);
        assert_eq!(result.service_quality_score, None);
        assert!(result.key_moments.is_empty());
    }

    #[test]
    fn test_parse_garbage_yields_pending_default() {
        let result = parse_analysis("Desculpe, não consegui analisar.");
        assert_eq!(result, AnalysisResult::default());
        assert_eq!(result.summary, "Análise pendente");

        assert_eq!(parse_analysis("[1, 2]"), AnalysisResult::default());
    }

    #[test]
    fn test_clean_transcript() {
        let raw = "Aqui está a transcrição do áudio:\n\nVendedor: Bom dia!\n\nCliente: Olá.\n";
        assert_eq!(clean_transcript(raw), "Vendedor: Bom dia!\nCliente: Olá.");

        let raw = "INÍCIO DA TRANSCRIÇÃO\nVendedor: Oi\nFim da transcrição.\nObrigado!";
        assert_eq!(clean_transcript(raw), "Vendedor: Oi");

        assert_eq!(clean_transcript("  Vendedor: Oi  "), "Vendedor: Oi");
    }

    fn response(value: Value) -> GenerateContentResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_extract_text() {
        let ok = response(json!({
            "candidates": [{ "content": { "parts": [{ "text": "olá" }] }, "finishReason": "STOP" }]
        }));
        assert_eq!(extract_text(ok).unwrap(), "olá");
    }

    #[test]
    fn test_extract_text_detects_blocking() {
        let prompt_blocked = response(json!({ "promptFeedback": { "blockReason": "SAFETY" } }));
        assert!(matches!(
            extract_text(prompt_blocked),
            Err(AnalysisError::ContentBlocked(_))
        ));

        for reason in ["SAFETY", "PROHIBITED_CONTENT"] {
            let blocked = response(json!({ "candidates": [{ "finishReason": reason }] }));
            assert!(matches!(
                extract_text(blocked),
                Err(AnalysisError::ContentBlocked(r)) if r == reason
            ));
        }

        let empty = response(json!({ "candidates": [] }));
        assert!(matches!(extract_text(empty), Err(AnalysisError::Parse(_))));
    }

    #[tokio::test]
    async fn test_unconfigured_fails_at_call_time() {
        let client = GeminiClient::new(AnalysisConfig::default()).unwrap();
        assert!(!client.is_configured());
        assert!(matches!(
            client.analyze("texto").await,
            Err(AnalysisError::Unconfigured)
        ));
        assert!(matches!(
            client.transcribe(Path::new("/nonexistent.mp3")).await,
            Err(AnalysisError::Unconfigured)
        ));

        let blank = AnalysisConfig {
            api_key: Some("   ".to_string()),
            ..AnalysisConfig::default()
        };
        assert!(!GeminiClient::new(blank).unwrap().is_configured());
    }
}
