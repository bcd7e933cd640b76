//! Structured call feedback produced by the analysis pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Three-valued sentiment bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SentimentCategory {
    Positivo,
    Neutro,
    Negativo,
}

impl SentimentCategory {
    /// ≥70 → POSITIVO, ≥40 → NEUTRO, else NEGATIVO
    pub fn from_score(score: i32) -> Self {
        if score >= 70 {
            SentimentCategory::Positivo
        } else if score >= 40 {
            SentimentCategory::Neutro
        } else {
            SentimentCategory::Negativo
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentCategory::Positivo => "POSITIVO",
            SentimentCategory::Neutro => "NEUTRO",
            SentimentCategory::Negativo => "NEGATIVO",
        }
    }
}

impl fmt::Display for SentimentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SentimentCategory {
    type Err = String;

    /// Case-insensitive; model output is not always upper case
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "POSITIVO" => Ok(SentimentCategory::Positivo),
            "NEUTRO" => Ok(SentimentCategory::Neutro),
            "NEGATIVO" => Ok(SentimentCategory::Negativo),
            other => Err(format!("Unknown sentiment category: {}", other)),
        }
    }
}

/// Persisted feedback row
#[derive(Debug, Clone, PartialEq)]
pub struct Feedback {
    pub id: i64,
    pub recording_id: i64,
    pub tenant_id: i64,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub suggestions: Vec<String>,
    pub objections: Vec<String>,
    /// `MM:SS - description`
    pub key_moments: Vec<String>,
    pub sentiment_score: Option<i32>,
    pub closing_probability: Option<i32>,
    /// Explicitly stored category; may be absent on older rows
    pub stored_category: Option<SentimentCategory>,
    pub service_quality_score: Option<i32>,
    pub script_adherence_score: Option<i32>,
    pub objection_handling_score: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl Feedback {
    /// Stored category if set, otherwise derived from the sentiment score
    pub fn sentiment_category(&self) -> Option<SentimentCategory> {
        self.stored_category
            .or_else(|| self.sentiment_score.map(SentimentCategory::from_score))
    }
}

/// Fields written when feedback is created
#[derive(Debug, Clone)]
pub struct NewFeedback {
    pub recording_id: i64,
    pub tenant_id: i64,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub suggestions: Vec<String>,
    pub objections: Vec<String>,
    pub key_moments: Vec<String>,
    pub sentiment_score: Option<i32>,
    pub closing_probability: Option<i32>,
    pub sentiment_category: Option<SentimentCategory>,
    pub service_quality_score: Option<i32>,
    pub script_adherence_score: Option<i32>,
    pub objection_handling_score: Option<i32>,
}

/// Wire form of a feedback record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackResponse {
    pub id: i64,
    #[serde(rename = "idGravacao")]
    pub recording_id: i64,
    #[serde(rename = "pontosFortes")]
    pub strengths: Vec<String>,
    #[serde(rename = "pontosFracos")]
    pub weaknesses: Vec<String>,
    #[serde(rename = "sugestoes")]
    pub suggestions: Vec<String>,
    #[serde(rename = "objecoesIdentificadas")]
    pub objections: Vec<String>,
    #[serde(rename = "momentosChave")]
    pub key_moments: Vec<String>,
    pub sentiment_score: Option<i32>,
    #[serde(rename = "probabilidadeFechamento")]
    pub closing_probability: Option<i32>,
    #[serde(rename = "categoriaSentimento")]
    pub sentiment_category: Option<SentimentCategory>,
    #[serde(rename = "qualidadeAtendimento")]
    pub service_quality_score: Option<i32>,
    #[serde(rename = "aderenciaScript")]
    pub script_adherence_score: Option<i32>,
    #[serde(rename = "gestaoObjecoes")]
    pub objection_handling_score: Option<i32>,
    #[serde(rename = "dataCriacao")]
    pub created_at: DateTime<Utc>,
}

impl From<&Feedback> for FeedbackResponse {
    fn from(feedback: &Feedback) -> Self {
        Self {
            id: feedback.id,
            recording_id: feedback.recording_id,
            strengths: feedback.strengths.clone(),
            weaknesses: feedback.weaknesses.clone(),
            suggestions: feedback.suggestions.clone(),
            objections: feedback.objections.clone(),
            key_moments: feedback.key_moments.clone(),
            sentiment_score: feedback.sentiment_score,
            closing_probability: feedback.closing_probability,
            sentiment_category: feedback.sentiment_category(),
            service_quality_score: feedback.service_quality_score,
            script_adherence_score: feedback.script_adherence_score,
            objection_handling_score: feedback.objection_handling_score,
            created_at: feedback.created_at,
        }
    }
}
