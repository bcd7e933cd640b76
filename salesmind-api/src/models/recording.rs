//! Call recording model and its status enums

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Lifecycle of a recording through the analysis pipeline
///
/// ```text
/// UPLOADING ──► PROCESSANDO ──► CONCLUIDO
///     │              │
///     └──────────────┴────────► ERRO
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProcessingStatus {
    /// Stored, waiting for a pipeline slot
    Uploading,
    /// Transcription and analysis in flight
    Processando,
    /// Transcript, summary and feedback committed
    Concluido,
    /// Pipeline failed; see `error_message`
    Erro,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Uploading => "UPLOADING",
            ProcessingStatus::Processando => "PROCESSANDO",
            ProcessingStatus::Concluido => "CONCLUIDO",
            ProcessingStatus::Erro => "ERRO",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessingStatus::Concluido | ProcessingStatus::Erro)
    }

    /// Legal forward moves; terminal states accept nothing
    pub fn can_transition_to(&self, next: ProcessingStatus) -> bool {
        matches!(
            (self, next),
            (ProcessingStatus::Uploading, ProcessingStatus::Processando)
                | (ProcessingStatus::Processando, ProcessingStatus::Concluido)
                | (ProcessingStatus::Uploading, ProcessingStatus::Erro)
                | (ProcessingStatus::Processando, ProcessingStatus::Erro)
        )
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UPLOADING" => Ok(ProcessingStatus::Uploading),
            "PROCESSANDO" => Ok(ProcessingStatus::Processando),
            "CONCLUIDO" => Ok(ProcessingStatus::Concluido),
            "ERRO" => Ok(ProcessingStatus::Erro),
            other => Err(format!("Unknown processing status: {}", other)),
        }
    }
}

/// Commercial outcome of the call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaleStatus {
    Pendente,
    PropostaEnviada,
    Qualificado,
    Fechado,
}

impl SaleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Pendente => "PENDENTE",
            SaleStatus::PropostaEnviada => "PROPOSTA_ENVIADA",
            SaleStatus::Qualificado => "QUALIFICADO",
            SaleStatus::Fechado => "FECHADO",
        }
    }

    /// Sale status implied by the model's closing probability
    ///
    /// ≥70 → QUALIFICADO, ≥40 → PROPOSTA_ENVIADA, otherwise `current` is kept.
    pub fn from_closing_probability(probability: i32, current: SaleStatus) -> SaleStatus {
        if probability >= 70 {
            SaleStatus::Qualificado
        } else if probability >= 40 {
            SaleStatus::PropostaEnviada
        } else {
            current
        }
    }
}

impl fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SaleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDENTE" => Ok(SaleStatus::Pendente),
            "PROPOSTA_ENVIADA" => Ok(SaleStatus::PropostaEnviada),
            "QUALIFICADO" => Ok(SaleStatus::Qualificado),
            "FECHADO" => Ok(SaleStatus::Fechado),
            other => Err(format!("Unknown sale status: {}", other)),
        }
    }
}

/// Rejected status change
#[derive(Debug, Clone, Error)]
#[error("Invalid processing transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: ProcessingStatus,
    pub to: ProcessingStatus,
}

/// Persisted call recording
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    pub id: i64,
    pub user_id: i64,
    pub client_id: i64,
    /// Absolute path of the stored audio
    pub audio_path: String,
    /// File name as sent by the client
    pub audio_filename: String,
    pub transcript: Option<String>,
    pub ai_summary: Option<String>,
    pub sale_status: SaleStatus,
    pub processing_status: ProcessingStatus,
    /// Estimated from byte size at upload
    pub duration_seconds: Option<i64>,
    pub error_message: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Recording {
    /// Move to `next`, rejecting anything the lifecycle forbids
    pub fn transition_to(&mut self, next: ProcessingStatus) -> Result<(), InvalidTransition> {
        if !self.processing_status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.processing_status,
                to: next,
            });
        }
        self.processing_status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Enter ERRO with a diagnostic message
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), InvalidTransition> {
        self.transition_to(ProcessingStatus::Erro)?;
        self.error_message = Some(message.into());
        Ok(())
    }
}

/// Fields supplied when a recording is first stored
#[derive(Debug, Clone)]
pub struct NewRecording {
    pub user_id: i64,
    pub client_id: i64,
    pub audio_path: String,
    pub audio_filename: String,
    pub duration_seconds: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Recording {
        let now = Utc::now();
        Recording {
            id: 1,
            user_id: 1,
            client_id: 1,
            audio_path: "/tmp/a.mp3".to_string(),
            audio_filename: "a.mp3".to_string(),
            transcript: None,
            ai_summary: None,
            sale_status: SaleStatus::Pendente,
            processing_status: ProcessingStatus::Uploading,
            duration_seconds: None,
            error_message: None,
            recorded_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_allowed_transitions() {
        use ProcessingStatus::*;
        assert!(Uploading.can_transition_to(Processando));
        assert!(Uploading.can_transition_to(Erro));
        assert!(Processando.can_transition_to(Concluido));
        assert!(Processando.can_transition_to(Erro));

        assert!(!Uploading.can_transition_to(Concluido));
        assert!(!Processando.can_transition_to(Uploading));
        for terminal in [Concluido, Erro] {
            assert!(terminal.is_terminal());
            for next in [Uploading, Processando, Concluido, Erro] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_recording_rejects_invalid_transition() {
        let mut recording = sample();
        let err = recording
            .transition_to(ProcessingStatus::Concluido)
            .unwrap_err();
        assert_eq!(err.from, ProcessingStatus::Uploading);
        assert_eq!(recording.processing_status, ProcessingStatus::Uploading);

        recording.transition_to(ProcessingStatus::Processando).unwrap();
        recording.fail("boom").unwrap();
        assert_eq!(recording.processing_status, ProcessingStatus::Erro);
        assert_eq!(recording.error_message.as_deref(), Some("boom"));
        assert!(recording.fail("again").is_err());
    }

    #[test]
    fn test_sale_status_from_probability() {
        let p = SaleStatus::Pendente;
        assert_eq!(SaleStatus::from_closing_probability(85, p), SaleStatus::Qualificado);
        assert_eq!(SaleStatus::from_closing_probability(70, p), SaleStatus::Qualificado);
        assert_eq!(SaleStatus::from_closing_probability(69, p), SaleStatus::PropostaEnviada);
        assert_eq!(SaleStatus::from_closing_probability(40, p), SaleStatus::PropostaEnviada);
        assert_eq!(SaleStatus::from_closing_probability(39, p), SaleStatus::Pendente);
        assert_eq!(
            SaleStatus::from_closing_probability(10, SaleStatus::Fechado),
            SaleStatus::Fechado
        );
    }

    #[test]
    fn test_status_string_forms() {
        assert_eq!(
            serde_json::to_string(&SaleStatus::PropostaEnviada).unwrap(),
            "\"PROPOSTA_ENVIADA\""
        );
        assert_eq!(
            serde_json::to_string(&ProcessingStatus::Processando).unwrap(),
            "\"PROCESSANDO\""
        );
        assert_eq!("ERRO".parse::<ProcessingStatus>().unwrap(), ProcessingStatus::Erro);
        assert!("erro".parse::<ProcessingStatus>().is_err());
    }
}
