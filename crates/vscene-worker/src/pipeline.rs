//! Analysis pipeline orchestration.
//!
//! One run takes an uploaded video through transcription, frame sampling,
//! captioning, scene grouping, dialogue alignment and emotion sampling, in
//! that order, publishing a progress event as each stage begins.
//!
//! The input artifact is leased for the duration of the run and deleted
//! exactly once when it ends, whether the run succeeds, fails, panics, or is
//! dropped mid-flight. The deletion happens before the terminal event is
//! published, so a terminal status always implies the artifact is gone.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use scopeguard::ScopeGuard;
use tracing::{error, warn, Instrument};
use vscene_models::{AnalysisResult, ArtifactKey, Caption, PipelineStage, Transcript};
use vscene_queue::{AnalyzeVideoJob, StatusStore};
use vscene_storage::ArtifactStore;
use vscene_timeline::{
    categorize_scenes, combine_scenes_with_transcript, merge_text_and_emotions, SegmenterConfig,
};

use crate::collaborators::Collaborators;
use crate::config::validate_settings;
use crate::emotions::analyze_emotions;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::progress::ProgressReporter;

/// Runs analysis jobs against a fixed set of collaborators.
#[derive(Clone)]
pub struct AnalysisPipeline {
    collaborators: Collaborators,
    store: Arc<dyn ArtifactStore>,
    status: Arc<dyn StatusStore>,
    work_root: PathBuf,
}

impl AnalysisPipeline {
    pub fn new(
        collaborators: Collaborators,
        store: Arc<dyn ArtifactStore>,
        status: Arc<dyn StatusStore>,
        work_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            collaborators,
            store,
            status,
            work_root: work_root.into(),
        }
    }

    /// Run one job to a terminal state.
    ///
    /// The returned error is the one recorded in the job's failed event.
    pub async fn run(&self, job: &AnalyzeVideoJob) -> WorkerResult<AnalysisResult> {
        let logger = JobLogger::new(&job.job_id, "analyze_video");
        let span = logger.create_span();
        self.run_logged(job, logger).instrument(span).await
    }

    async fn run_logged(
        &self,
        job: &AnalyzeVideoJob,
        logger: JobLogger,
    ) -> WorkerResult<AnalysisResult> {
        logger.log_start(&format!("artifact {}", job.artifact_key));
        let mut reporter =
            ProgressReporter::new(Arc::clone(&self.status), job.job_id.clone(), logger.clone());

        // Fires only if this future is dropped before the explicit release below.
        let lease = scopeguard::guard(
            (Arc::clone(&self.store), job.artifact_key.clone()),
            |(store, key)| {
                warn!("Run for {} dropped before cleanup, deleting in background", key);
                match tokio::runtime::Handle::try_current() {
                    Ok(handle) => {
                        handle.spawn(async move { release_artifact(store.as_ref(), &key).await });
                    }
                    Err(_) => error!("No runtime to delete artifact {}", key),
                }
            },
        );

        let outcome = AssertUnwindSafe(self.execute(job, &mut reporter))
            .catch_unwind()
            .await;
        let result = match outcome {
            Ok(result) => result,
            Err(panic) => Err(WorkerError::stage_failed(
                reporter.stage(),
                format!("panicked: {}", panic_message(panic.as_ref())),
            )),
        };

        let (store, key) = ScopeGuard::into_inner(lease);
        release_artifact(store.as_ref(), &key).await;

        match result {
            Ok(analysis) => {
                reporter.complete(analysis.clone()).await?;
                metrics::record_job_completed();
                logger.log_completion(&format!(
                    "{} scenes, {} merged sentences",
                    analysis.combined_scenes.len(),
                    analysis.merged_text_emotions.len()
                ));
                Ok(analysis)
            }
            Err(e) => {
                logger.log_error(&e.to_string());
                metrics::record_job_failed(e.stage());
                reporter.fail(&e.to_string()).await?;
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        job: &AnalyzeVideoJob,
        reporter: &mut ProgressReporter,
    ) -> WorkerResult<AnalysisResult> {
        let settings = &job.settings;
        let c = &self.collaborators;

        let (scratch, video) = run_stage(reporter, PipelineStage::Starting, async {
            validate_settings(settings).map_err(WorkerError::input_rejected)?;
            tokio::fs::create_dir_all(&self.work_root).await?;
            let scratch = tempfile::Builder::new()
                .prefix(&format!("job-{}-", job.job_id))
                .tempdir_in(&self.work_root)?;
            let video = self.store.fetch(&job.artifact_key, scratch.path()).await?;
            Ok::<_, WorkerError>((scratch, video))
        })
        .await?;
        let scratch_dir = scratch.path();

        let Transcript {
            segments,
            text,
            language,
        } = run_stage(reporter, PipelineStage::Transcribing, async {
            c.transcriber
                .transcribe(&video, &settings.whisper_model_size)
                .await
        })
        .await?;

        let frames = run_stage(reporter, PipelineStage::ExtractingFrames, async {
            c.frames
                .sample_frames(&video, settings.frame_fps, &scratch_dir.join("frames"))
                .await
        })
        .await?;

        let captions = run_stage(reporter, PipelineStage::Captioning, async {
            let captions = c.captioner.caption(&frames).await?;
            if captions.len() != frames.len() {
                return Err(WorkerError::stage_failed(
                    PipelineStage::Captioning,
                    format!(
                        "captioner returned {} captions for {} frames",
                        captions.len(),
                        frames.len()
                    ),
                ));
            }
            Ok::<_, WorkerError>(
                frames
                    .iter()
                    .zip(captions)
                    .map(|(frame, text)| Caption::new(frame.index, text))
                    .collect::<Vec<_>>(),
            )
        })
        .await?;

        let segmenter = SegmenterConfig {
            threshold: settings.scene_threshold,
            max_gap: settings.scene_max_gap,
            fps: settings.frame_fps,
        };
        let (captions, scenes) = run_stage(reporter, PipelineStage::GroupingScenes, async move {
            blocking(move || {
                let scenes = categorize_scenes(&captions, segmenter)?;
                Ok((captions, scenes))
            })
            .await
        })
        .await?;

        let (segments, scenes, combined) =
            run_stage(reporter, PipelineStage::AttachingDialogue, async move {
                blocking(move || {
                    let combined = combine_scenes_with_transcript(&scenes, &segments);
                    Ok((segments, scenes, combined))
                })
                .await
            })
            .await?;

        let samples = run_stage(reporter, PipelineStage::AnalyzingEmotions, async {
            analyze_emotions(
                c.frames.as_ref(),
                c.emotions.as_ref(),
                &video,
                settings.emotion_sample_rate,
                &scratch_dir.join("emotion"),
            )
            .await
        })
        .await?;

        run_stage(reporter, PipelineStage::Finalizing, async move {
            let merged_text_emotions = merge_text_and_emotions(&text, &samples);
            Ok(AnalysisResult {
                transcript_text: text,
                transcript_segments: segments,
                frame_captions: captions.into_iter().map(|c| c.text).collect(),
                scenes,
                combined_scenes: combined,
                language,
                merged_text_emotions,
            })
        })
        .await
    }
}

/// Announce `stage`, run its work, and tag any error with the stage.
async fn run_stage<T>(
    reporter: &mut ProgressReporter,
    stage: PipelineStage,
    work: impl Future<Output = WorkerResult<T>>,
) -> WorkerResult<T> {
    reporter.enter(stage).await;
    let started = Instant::now();
    let result = work.await.map_err(|e| e.in_stage(stage));
    metrics::record_stage_duration(stage, started.elapsed().as_secs_f64());
    result
}

/// Run CPU-bound timeline work off the async executor.
async fn blocking<T, F>(f: F) -> WorkerResult<T>
where
    F: FnOnce() -> WorkerResult<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(WorkerError::TaskFailed(format!(
            "panicked: {}",
            panic_message(e.into_panic().as_ref())
        ))),
        Err(e) => Err(WorkerError::TaskFailed(e.to_string())),
    }
}

async fn release_artifact(store: &dyn ArtifactStore, key: &ArtifactKey) {
    if let Err(e) = store.delete(key).await {
        metrics::record_cleanup_failure();
        error!("Failed to delete artifact {}: {}", key, e);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
