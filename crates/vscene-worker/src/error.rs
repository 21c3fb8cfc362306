//! Worker error types.

use thiserror::Error;
use vscene_models::PipelineStage;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// Submission refused before anything was queued.
    #[error("Input rejected: {0}")]
    InputRejected(String),

    /// A pipeline stage could not finish; the run is aborted.
    #[error("{stage} failed: {message}")]
    StageFailed {
        stage: PipelineStage,
        message: String,
    },

    #[error("Task failed: {0}")]
    TaskFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    Storage(#[from] vscene_storage::StorageError),

    #[error("Media error: {0}")]
    Media(#[from] vscene_media::MediaError),

    #[error("ML service error: {0}")]
    Ml(#[from] vscene_ml_client::MlError),

    #[error("Queue error: {0}")]
    Queue(#[from] vscene_queue::QueueError),

    #[error("Timeline error: {0}")]
    Timeline(#[from] vscene_timeline::TimelineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn input_rejected(msg: impl Into<String>) -> Self {
        Self::InputRejected(msg.into())
    }

    pub fn stage_failed(stage: PipelineStage, msg: impl Into<String>) -> Self {
        Self::StageFailed {
            stage,
            message: msg.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Attribute an error to the stage it happened in.
    ///
    /// Errors already tagged with a stage keep their original one.
    pub fn in_stage(self, stage: PipelineStage) -> Self {
        match self {
            err @ Self::StageFailed { .. } => err,
            other => Self::stage_failed(stage, other.to_string()),
        }
    }

    /// Stage the error was raised in, if it came from a pipeline run.
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            Self::StageFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
