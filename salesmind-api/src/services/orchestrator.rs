//! Background processing of uploaded recordings
//!
//! Each upload becomes one job on [`ProcessingQueue`]. A dispatcher task
//! hands jobs to [`ProcessingOrchestrator::process_recording`], at most
//! `max_concurrent_jobs` at a time. A run moves the recording
//! UPLOADING → PROCESSANDO, transcribes and analyzes the audio, then commits
//! transcript, feedback, summary, sale status and CONCLUIDO in a single
//! transaction. Any failure leaves the recording in ERRO with a message.

use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::db;
use crate::models::{InvalidTransition, NewFeedback, ProcessingStatus, SaleStatus};
use crate::services::analysis_client::{AnalysisError, AnalysisResult, CallAnalyzer};
use crate::utils::{begin_monitored, retry_on_lock};
use crate::FeedbackCache;

/// Message stored when the job never reached a worker
pub const NOT_STARTED_MESSAGE: &str = "task failed before start";

/// Message stored for runs cut short by a process restart
pub const INTERRUPTED_MESSAGE: &str = "interrupted by service restart";

const FAILURE_WRITE_MAX_WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Recording {0} not found")]
    RecordingNotFound(i64),

    #[error("Owner {user_id} of recording {recording_id} not found")]
    OwnerNotFound { recording_id: i64, user_id: i64 },

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Transition(#[from] InvalidTransition),

    #[error(transparent)]
    Storage(#[from] salesmind_common::Error),

    #[error("Pipeline task aborted: {0}")]
    Aborted(String),
}

impl From<sqlx::Error> for PipelineError {
    fn from(e: sqlx::Error) -> Self {
        PipelineError::Storage(salesmind_common::Error::Database(e))
    }
}

fn new_feedback(recording_id: i64, tenant_id: i64, analysis: &AnalysisResult) -> NewFeedback {
    NewFeedback {
        recording_id,
        tenant_id,
        strengths: analysis.strengths.clone(),
        weaknesses: analysis.weaknesses.clone(),
        suggestions: analysis.suggestions.clone(),
        objections: analysis.objections.clone(),
        key_moments: analysis.key_moments.clone(),
        sentiment_score: Some(analysis.sentiment_score),
        closing_probability: Some(analysis.closing_probability),
        sentiment_category: Some(analysis.sentiment_category),
        service_quality_score: analysis.service_quality_score,
        script_adherence_score: analysis.script_adherence_score,
        objection_handling_score: analysis.objection_handling_score,
    }
}

/// Drives one recording through the pipeline
pub struct ProcessingOrchestrator {
    db: SqlitePool,
    analyzer: Arc<dyn CallAnalyzer>,
    feedback_cache: Arc<FeedbackCache>,
}

impl ProcessingOrchestrator {
    pub fn new(
        db: SqlitePool,
        analyzer: Arc<dyn CallAnalyzer>,
        feedback_cache: Arc<FeedbackCache>,
    ) -> Self {
        Self {
            db,
            analyzer,
            feedback_cache,
        }
    }

    pub fn analyzer(&self) -> &Arc<dyn CallAnalyzer> {
        &self.analyzer
    }

    /// Run the pipeline to a terminal state
    ///
    /// Never returns an error: failures are recorded on the recording itself.
    /// The returned status is what was persisted (or attempted).
    pub async fn process_recording(&self, recording_id: i64) -> ProcessingStatus {
        match self.run(recording_id).await {
            Ok(()) => ProcessingStatus::Concluido,
            Err(e) => {
                error!(recording_id, error = %e, "Recording processing failed");
                self.record_failure(recording_id, &e.to_string()).await;
                ProcessingStatus::Erro
            }
        }
    }

    async fn run(&self, recording_id: i64) -> Result<(), PipelineError> {
        let mut recording = db::recordings::find_by_id(&self.db, recording_id)
            .await?
            .ok_or(PipelineError::RecordingNotFound(recording_id))?;

        // Visible to pollers before any provider call
        recording.transition_to(ProcessingStatus::Processando)?;
        db::recordings::update(&self.db, &recording).await?;
        info!(recording_id, status = %recording.processing_status, "Processing started");

        let transcript = self
            .analyzer
            .transcribe(Path::new(&recording.audio_path))
            .await?;
        debug!(recording_id, chars = transcript.len(), "Transcript received");

        let analysis = self.analyzer.analyze(&transcript).await?;
        debug!(
            recording_id,
            closing_probability = analysis.closing_probability,
            "Analysis received"
        );

        self.commit_results(recording_id, transcript, analysis).await?;
        self.feedback_cache.invalidate(&recording_id);
        Ok(())
    }

    /// Single atomic write of everything a successful run produces
    async fn commit_results(
        &self,
        recording_id: i64,
        transcript: String,
        analysis: AnalysisResult,
    ) -> Result<(), PipelineError> {
        let mut tx = begin_monitored(&self.db, "orchestrator::commit_results").await?;

        let mut recording = db::recordings::find_by_id(tx.conn()?, recording_id)
            .await?
            .ok_or(PipelineError::RecordingNotFound(recording_id))?;
        let owner = db::tenants::find_user(tx.conn()?, recording.user_id)
            .await?
            .ok_or(PipelineError::OwnerNotFound {
                recording_id,
                user_id: recording.user_id,
            })?;

        let feedback = db::feedback::insert(
            tx.conn()?,
            &new_feedback(recording_id, owner.tenant_id, &analysis),
        )
        .await?;

        recording.transcript = Some(transcript);
        recording.ai_summary = Some(analysis.summary);
        recording.sale_status =
            SaleStatus::from_closing_probability(analysis.closing_probability, recording.sale_status);
        recording.transition_to(ProcessingStatus::Concluido)?;
        db::recordings::update(tx.conn()?, &recording).await?;

        tx.commit().await?;

        info!(
            recording_id,
            feedback_id = feedback.id,
            sale_status = %recording.sale_status,
            status = %recording.processing_status,
            "Processing finished"
        );
        Ok(())
    }

    /// Best-effort move to ERRO
    ///
    /// Runs outside any pipeline transaction. Its own failures are logged and
    /// dropped since nothing is left to report them to.
    pub async fn record_failure(&self, recording_id: i64, message: &str) {
        let result = retry_on_lock("orchestrator::record_failure", FAILURE_WRITE_MAX_WAIT, || {
            self.write_failure(recording_id, message)
        })
        .await;

        match result {
            Ok(true) => info!(recording_id, status = %ProcessingStatus::Erro, "Failure recorded"),
            Ok(false) => {}
            Err(e) => error!(
                recording_id,
                error = %e,
                "Could not record processing failure"
            ),
        }
    }

    async fn write_failure(&self, recording_id: i64, message: &str) -> salesmind_common::Result<bool> {
        let Some(mut recording) = db::recordings::find_by_id(&self.db, recording_id).await? else {
            warn!(recording_id, "Failed recording no longer exists");
            return Ok(false);
        };
        if let Err(e) = recording.fail(message) {
            warn!(recording_id, error = %e, "Recording not moved to ERRO");
            return Ok(false);
        }
        db::recordings::update(&self.db, &recording).await?;
        Ok(true)
    }
}

/// Move recordings abandoned by a previous process to ERRO
pub async fn recover_unfinished(pool: &SqlitePool) -> salesmind_common::Result<u64> {
    let count = retry_on_lock("orchestrator::recover_unfinished", FAILURE_WRITE_MAX_WAIT, || {
        db::recordings::fail_unfinished(pool, INTERRUPTED_MESSAGE)
    })
    .await?;
    if count > 0 {
        warn!(count, "Marked recordings interrupted by restart as failed");
    }
    Ok(count)
}

/// Non-blocking job intake for the orchestrator
#[derive(Clone)]
pub struct ProcessingQueue {
    sender: mpsc::UnboundedSender<i64>,
    orchestrator: Arc<ProcessingOrchestrator>,
}

impl ProcessingQueue {
    /// Start the dispatcher; it runs until every queue handle is dropped
    pub fn start(
        orchestrator: Arc<ProcessingOrchestrator>,
        max_concurrent_jobs: usize,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let dispatcher = tokio::spawn(dispatch(
            receiver,
            Arc::clone(&orchestrator),
            max_concurrent_jobs.max(1),
        ));
        (
            Self {
                sender,
                orchestrator,
            },
            dispatcher,
        )
    }

    pub fn orchestrator(&self) -> &Arc<ProcessingOrchestrator> {
        &self.orchestrator
    }

    /// Schedule `recording_id`; returns without waiting for the run
    pub async fn submit(&self, recording_id: i64) {
        if self.sender.send(recording_id).is_err() {
            error!(recording_id, "Processing queue closed, job not scheduled");
            self.orchestrator
                .record_failure(recording_id, NOT_STARTED_MESSAGE)
                .await;
            return;
        }
        debug!(recording_id, "Processing job queued");
    }
}

async fn dispatch(
    mut receiver: mpsc::UnboundedReceiver<i64>,
    orchestrator: Arc<ProcessingOrchestrator>,
    max_concurrent_jobs: usize,
) {
    let slots = Arc::new(Semaphore::new(max_concurrent_jobs));
    info!(max_concurrent_jobs, "Processing dispatcher started");

    while let Some(recording_id) = receiver.recv().await {
        let permit = match Arc::clone(&slots).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                orchestrator
                    .record_failure(recording_id, NOT_STARTED_MESSAGE)
                    .await;
                break;
            }
        };

        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            let _permit = permit;
            let worker = Arc::clone(&orchestrator);
            let run = tokio::spawn(async move { worker.process_recording(recording_id).await });

            // A panicking run must still leave the recording terminal
            if let Err(e) = run.await {
                let reason = PipelineError::Aborted(e.to_string());
                error!(recording_id, error = %reason, "Processing task aborted");
                orchestrator
                    .record_failure(recording_id, &reason.to_string())
                    .await;
            }
        });
    }

    info!("Processing dispatcher stopped");
}
