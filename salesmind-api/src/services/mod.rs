//! Storage, AI provider and background processing services

pub mod analysis_client;
pub mod file_store;
pub mod orchestrator;

pub use analysis_client::{AnalysisConfig, AnalysisError, AnalysisResult, CallAnalyzer, GeminiClient};
pub use file_store::{FileStore, StorageError};
pub use orchestrator::{ProcessingOrchestrator, ProcessingQueue};
