//! Job submission and status queries.

use std::sync::Arc;

use tracing::{info, warn};
use vscene_models::{AnalysisSettings, ArtifactKey, JobEvent, JobId, JobStatus, PipelineStage};
use vscene_queue::{AnalyzeVideoJob, JobSink, QueueError, StatusStore};
use vscene_storage::{ArtifactStore, StorageError};

use crate::config::validate_settings;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;

/// Accepts analysis requests and answers status queries.
///
/// Submission returns as soon as the job is queued; the run itself happens
/// in whichever worker consumes it.
#[derive(Clone)]
pub struct JobService {
    store: Arc<dyn ArtifactStore>,
    status: Arc<dyn StatusStore>,
    sink: Arc<dyn JobSink>,
    defaults: AnalysisSettings,
}

impl JobService {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        status: Arc<dyn StatusStore>,
        sink: Arc<dyn JobSink>,
        defaults: AnalysisSettings,
    ) -> Self {
        Self {
            store,
            status,
            sink,
            defaults,
        }
    }

    /// Queue an analysis of an already-stored artifact.
    ///
    /// Nothing is recorded or queued when the artifact is missing or the
    /// settings are invalid. If the artifact already has a live job, that
    /// job's id is returned instead of starting a second run.
    pub async fn submit(
        &self,
        artifact_key: ArtifactKey,
        settings: Option<AnalysisSettings>,
    ) -> WorkerResult<JobId> {
        let settings = settings.unwrap_or_else(|| self.defaults.clone());
        validate_settings(&settings).map_err(WorkerError::input_rejected)?;

        match self.store.exists(&artifact_key).await {
            Ok(true) => {}
            Ok(false) => {
                return Err(WorkerError::input_rejected(format!(
                    "artifact {} not found",
                    artifact_key
                )))
            }
            Err(StorageError::InvalidKey(key)) => {
                return Err(WorkerError::input_rejected(format!(
                    "invalid artifact key {}",
                    key
                )))
            }
            Err(e) => return Err(e.into()),
        }

        let job = AnalyzeVideoJob::new(artifact_key, settings);
        self.status
            .append(&job.job_id, JobEvent::stage(PipelineStage::Queued))
            .await?;

        match self.sink.enqueue(&job).await {
            Ok(message_id) => {
                metrics::record_job_submitted();
                info!(
                    job_id = %job.job_id,
                    "Queued analysis of {} as {}", job.artifact_key, message_id
                );
                Ok(job.job_id)
            }
            Err(QueueError::Duplicate { existing }) => {
                info!(
                    "Artifact {} already has job {}, not queueing another",
                    job.artifact_key, existing
                );
                if let Err(e) = self.status.discard(&job.job_id).await {
                    warn!("Could not discard stream of unqueued job {}: {}", job.job_id, e);
                }
                Ok(existing)
            }
            Err(e) => {
                let failed = JobEvent::failed(
                    &PipelineStage::Queued.progress(),
                    format!("failed to enqueue: {}", e),
                );
                if let Err(status_err) = self.status.append(&job.job_id, failed).await {
                    warn!("Could not record enqueue failure for {}: {}", job.job_id, status_err);
                }
                Err(e.into())
            }
        }
    }

    /// Current status of a job. Ids with no recorded events read as pending.
    pub async fn status(&self, job_id: &JobId) -> WorkerResult<JobStatus> {
        Ok(self
            .status
            .latest(job_id)
            .await?
            .map(|event| event.to_status())
            .unwrap_or(JobStatus::Pending))
    }

    /// Every progress event recorded for a job, oldest first.
    pub async fn history(&self, job_id: &JobId) -> WorkerResult<Vec<JobEvent>> {
        Ok(self.status.events(job_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::AnalysisPipeline;
    use crate::testing::{happy_path, CountingStore};
    use async_trait::async_trait;
    use tokio::sync::Mutex;
    use vscene_models::JobState;
    use vscene_queue::{MemoryStatusStore, QueueResult};

    #[derive(Default)]
    struct RecordingSink {
        jobs: Mutex<Vec<AnalyzeVideoJob>>,
        turned_away: Mutex<Vec<JobId>>,
        duplicate_of: Option<JobId>,
        broken: bool,
    }

    #[async_trait]
    impl JobSink for RecordingSink {
        async fn enqueue(&self, job: &AnalyzeVideoJob) -> QueueResult<String> {
            if let Some(existing) = &self.duplicate_of {
                self.turned_away.lock().await.push(job.job_id.clone());
                return Err(QueueError::Duplicate {
                    existing: existing.clone(),
                });
            }
            if self.broken {
                return Err(QueueError::enqueue_failed("stream unavailable"));
            }
            let mut jobs = self.jobs.lock().await;
            jobs.push(job.clone());
            Ok(format!("{}-0", jobs.len()))
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        store: Arc<CountingStore>,
        status: Arc<MemoryStatusStore>,
        sink: Arc<RecordingSink>,
        service: JobService,
    }

    async fn fixture(sink: RecordingSink) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(CountingStore::new(dir.path().join("uploads")).await);
        store.seed(&ArtifactKey::new("clip.mp4")).await;
        let status = Arc::new(MemoryStatusStore::new());
        let sink = Arc::new(sink);
        let service = JobService::new(
            store.clone(),
            status.clone(),
            sink.clone(),
            AnalysisSettings::default(),
        );
        Fixture {
            _dir: dir,
            store,
            status,
            sink,
            service,
        }
    }

    #[tokio::test]
    async fn test_submit_queues_job() {
        let f = fixture(RecordingSink::default()).await;

        let job_id = f
            .service
            .submit(ArtifactKey::new("clip.mp4"), None)
            .await
            .unwrap();

        let jobs = f.sink.jobs.lock().await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].job_id, job_id);
        assert_eq!(jobs[0].settings, AnalysisSettings::default());
        assert_eq!(f.service.status(&job_id).await.unwrap(), JobStatus::Pending);
        assert_eq!(f.service.history(&job_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_rejects_missing_artifact() {
        let f = fixture(RecordingSink::default()).await;

        let err = f
            .service
            .submit(ArtifactKey::new("missing.mp4"), None)
            .await
            .unwrap_err();

        assert!(matches!(err, WorkerError::InputRejected(_)));
        assert!(f.sink.jobs.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_submit_rejects_escaping_key() {
        let f = fixture(RecordingSink::default()).await;
        let err = f
            .service
            .submit(ArtifactKey::new("../etc/passwd"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::InputRejected(_)));
    }

    #[tokio::test]
    async fn test_submit_rejects_bad_settings() {
        let f = fixture(RecordingSink::default()).await;
        let settings = AnalysisSettings {
            emotion_sample_rate: 0.0,
            ..AnalysisSettings::default()
        };
        let err = f
            .service
            .submit(ArtifactKey::new("clip.mp4"), Some(settings))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::InputRejected(_)));
        assert!(f.sink.jobs.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_submission_returns_existing_job() {
        let existing = JobId::from_string("first-job");
        let f = fixture(RecordingSink {
            duplicate_of: Some(existing.clone()),
            ..RecordingSink::default()
        })
        .await;

        let job_id = f
            .service
            .submit(ArtifactKey::new("clip.mp4"), None)
            .await
            .unwrap();
        assert_eq!(job_id, existing);

        // The id minted for the losing submission leaves no stream behind.
        let turned_away = f.sink.turned_away.lock().await.clone();
        assert_eq!(turned_away.len(), 1);
        assert!(f.status.events(&turned_away[0]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_enqueue_failure_marks_job_failed() {
        let f = fixture(RecordingSink {
            broken: true,
            ..RecordingSink::default()
        })
        .await;

        let err = f
            .service
            .submit(ArtifactKey::new("clip.mp4"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Queue(_)));
    }

    #[tokio::test]
    async fn test_unknown_job_reads_pending() {
        let f = fixture(RecordingSink::default()).await;
        let status = f.service.status(&JobId::from_string("never-seen")).await.unwrap();
        assert_eq!(status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_submit_then_run_to_completion() {
        let f = fixture(RecordingSink::default()).await;
        let job_id = f
            .service
            .submit(ArtifactKey::new("clip.mp4"), None)
            .await
            .unwrap();

        let job = f.sink.jobs.lock().await[0].clone();
        let work = tempfile::tempdir().unwrap();
        let pipeline =
            AnalysisPipeline::new(happy_path(), f.store.clone(), f.status.clone(), work.path());
        pipeline.run(&job).await.unwrap();

        let status = f.service.status(&job_id).await.unwrap();
        assert_eq!(status.state(), JobState::Completed);

        let percents: Vec<u8> = f
            .service
            .history(&job_id)
            .await
            .unwrap()
            .iter()
            .map(|e| e.progress.percent)
            .collect();
        assert_eq!(percents.first(), Some(&0));
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));
        assert!(!f.store.exists(&job.artifact_key).await.unwrap());
    }
}
