//! Per-run progress publishing.

use std::sync::Arc;

use tracing::warn;
use vscene_models::{AnalysisResult, JobEvent, JobId, JobProgress, PipelineStage};
use vscene_queue::StatusStore;

use crate::error::WorkerResult;
use crate::logging::JobLogger;

/// Sole writer of one job's progress stream.
///
/// Published percents never decrease. Stage announcements are best effort;
/// terminal events must be stored or the caller hears about it.
pub struct ProgressReporter {
    status: Arc<dyn StatusStore>,
    job_id: JobId,
    logger: JobLogger,
    stage: PipelineStage,
    last: JobProgress,
}

impl ProgressReporter {
    pub fn new(status: Arc<dyn StatusStore>, job_id: JobId, logger: JobLogger) -> Self {
        Self {
            status,
            job_id,
            logger,
            stage: PipelineStage::Queued,
            last: PipelineStage::Queued.progress(),
        }
    }

    /// Stage most recently entered.
    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn last(&self) -> &JobProgress {
        &self.last
    }

    /// Announce the start of `stage`.
    pub async fn enter(&mut self, stage: PipelineStage) {
        self.stage = stage;
        self.logger.log_stage(stage);

        let progress = stage.progress();
        if progress.percent < self.last.percent {
            warn!(
                job_id = %self.job_id,
                "Not publishing {} at {}%, already at {}%",
                stage,
                progress.percent,
                self.last.percent
            );
            return;
        }
        self.last = progress;

        if let Err(e) = self.status.append(&self.job_id, JobEvent::stage(stage)).await {
            self.logger
                .log_warning(&format!("failed to publish progress for {}: {}", stage, e));
        }
    }

    pub async fn complete(&mut self, result: AnalysisResult) -> WorkerResult<()> {
        let event = self.status.append(&self.job_id, JobEvent::completed(result)).await?;
        self.last = event.progress;
        Ok(())
    }

    /// Record the run as failed, keeping the percent it reached.
    pub async fn fail(&mut self, error: &str) -> WorkerResult<()> {
        let event = self
            .status
            .append(&self.job_id, JobEvent::failed(&self.last, error))
            .await?;
        self.last = event.progress;
        Ok(())
    }
}
