//! Job executor.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use vscene_queue::{AnalyzeVideoJob, JobQueue};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::pipeline::AnalysisPipeline;

/// Most jobs pulled from the stream in one read.
const MAX_BATCH: usize = 5;

/// Consumes analysis jobs from the queue and runs them.
pub struct JobExecutor {
    config: WorkerConfig,
    queue: Arc<JobQueue>,
    pipeline: Arc<AnalysisPipeline>,
    job_semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
    consumer_name: String,
}

impl JobExecutor {
    pub fn new(config: WorkerConfig, queue: JobQueue, pipeline: AnalysisPipeline) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());

        Self {
            config,
            queue: Arc::new(queue),
            pipeline: Arc::new(pipeline),
            job_semaphore,
            shutdown,
            consumer_name,
        }
    }

    /// Consume jobs until [`shutdown`](Self::shutdown) is signalled, then
    /// wait (bounded by the shutdown timeout) for in-flight runs.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting job executor '{}' with {} max concurrent jobs",
            self.consumer_name, self.config.max_concurrent_jobs
        );

        self.queue.init().await?;
        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping executor");
                        break;
                    }
                }
                result = self.consume_jobs() => {
                    if let Err(e) = result {
                        error!("Error consuming jobs: {}", e);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        info!("Waiting for in-flight jobs to complete...");
        if tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_jobs())
            .await
            .is_err()
        {
            warn!(
                "In-flight jobs still running after {:?}, exiting anyway",
                self.config.shutdown_timeout
            );
        }

        info!("Job executor stopped");
        Ok(())
    }

    async fn consume_jobs(&self) -> WorkerResult<()> {
        let available = self.job_semaphore.available_permits();
        if available == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let jobs = self
            .queue
            .consume(
                &self.consumer_name,
                self.config.consumer_block.as_millis() as u64,
                available.min(MAX_BATCH),
            )
            .await?;

        if jobs.is_empty() {
            return Ok(());
        }
        debug!("Consumed {} jobs from queue", jobs.len());

        for (message_id, job) in jobs {
            let permit = self
                .job_semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| WorkerError::TaskFailed("job semaphore closed".to_string()))?;
            let pipeline = Arc::clone(&self.pipeline);
            let queue = Arc::clone(&self.queue);

            tokio::spawn(async move {
                let _permit = permit;
                Self::execute_job(pipeline, queue, message_id, job).await;
            });
        }

        Ok(())
    }

    /// Run one job and retire its queue message.
    ///
    /// Failed runs are not redelivered: the artifact is gone once the run
    /// ends, so a retry could never succeed.
    async fn execute_job(
        pipeline: Arc<AnalysisPipeline>,
        queue: Arc<JobQueue>,
        message_id: String,
        job: AnalyzeVideoJob,
    ) {
        let job_id = job.job_id.clone();
        info!("Executing job {}", job_id);

        match pipeline.run(&job).await {
            Ok(_) => info!("Job {} completed successfully", job_id),
            Err(e) => error!("Job {} failed: {}", job_id, e),
        }

        if let Err(e) = queue.ack(&message_id).await {
            error!("Failed to ack job {}: {}", job_id, e);
        }
        if let Err(e) = queue.release_dedup(&job).await {
            warn!("Failed to clear dedup key for job {}: {}", job_id, e);
        }
    }

    async fn wait_for_jobs(&self) {
        while self.job_semaphore.available_permits() < self.config.max_concurrent_jobs {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}
