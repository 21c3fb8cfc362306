//! External collaborators of the analysis pipeline.
//!
//! Speech transcription, frame decoding, frame captioning and emotion
//! classification are all reached through these traits. Production adapters
//! wrap the FFmpeg tooling and the ML sidecar client; tests substitute fakes.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use vscene_media::{get_duration, grab_frame, sample_frames, Frame};
use vscene_ml_client::MlClient;
use vscene_models::{EmotionReading, Transcript};

use crate::error::WorkerResult;

/// Produces the timed transcript of a video's audio track.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, video: &Path, model_size: &str) -> WorkerResult<Transcript>;
}

/// Decodes frames from a video.
#[async_trait]
pub trait FrameSampler: Send + Sync {
    /// Fixed-rate frame sequence; frame `i` is stamped `i / fps`.
    async fn sample_frames(&self, video: &Path, fps: f64, out_dir: &Path)
        -> WorkerResult<Vec<Frame>>;

    /// Video duration in seconds.
    async fn duration(&self, video: &Path) -> WorkerResult<f64>;

    /// The frame shown at `time`, written as sample `index`.
    async fn frame_at(
        &self,
        video: &Path,
        index: usize,
        time: f64,
        out_dir: &Path,
    ) -> WorkerResult<Frame>;
}

/// Describes frames in natural language.
#[async_trait]
pub trait Captioner: Send + Sync {
    /// One caption per frame, in frame order.
    async fn caption(&self, frames: &[Frame]) -> WorkerResult<Vec<String>>;
}

/// Reads the dominant facial emotion of a frame.
#[async_trait]
pub trait EmotionClassifier: Send + Sync {
    async fn classify(&self, frame: &Frame) -> WorkerResult<EmotionReading>;
}

/// The collaborator set a pipeline runs against, built once per process.
#[derive(Clone)]
pub struct Collaborators {
    pub transcriber: Arc<dyn Transcriber>,
    pub frames: Arc<dyn FrameSampler>,
    pub captioner: Arc<dyn Captioner>,
    pub emotions: Arc<dyn EmotionClassifier>,
}

impl Collaborators {
    /// FFmpeg for frames, the ML sidecar for every model.
    pub fn production(ml: MlClient) -> Self {
        let ml = Arc::new(MlAdapter(ml));
        Self {
            transcriber: ml.clone(),
            frames: Arc::new(FfmpegFrameSampler),
            captioner: ml.clone(),
            emotions: ml,
        }
    }
}

/// Frame access through the `ffmpeg`/`ffprobe` binaries.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegFrameSampler;

#[async_trait]
impl FrameSampler for FfmpegFrameSampler {
    async fn sample_frames(
        &self,
        video: &Path,
        fps: f64,
        out_dir: &Path,
    ) -> WorkerResult<Vec<Frame>> {
        Ok(sample_frames(video, fps, out_dir).await?)
    }

    async fn duration(&self, video: &Path) -> WorkerResult<f64> {
        Ok(get_duration(video).await?)
    }

    async fn frame_at(
        &self,
        video: &Path,
        index: usize,
        time: f64,
        out_dir: &Path,
    ) -> WorkerResult<Frame> {
        Ok(grab_frame(video, index, time, out_dir).await?)
    }
}

/// Model collaborators served by the ML sidecar.
///
/// The sidecar shares the worker's filesystem, so media is passed by path.
#[derive(Debug, Clone)]
pub struct MlAdapter(pub MlClient);

#[async_trait]
impl Transcriber for MlAdapter {
    async fn transcribe(&self, video: &Path, model_size: &str) -> WorkerResult<Transcript> {
        Ok(self
            .0
            .transcribe(&video.to_string_lossy(), model_size)
            .await?)
    }
}

#[async_trait]
impl Captioner for MlAdapter {
    async fn caption(&self, frames: &[Frame]) -> WorkerResult<Vec<String>> {
        let paths = frames
            .iter()
            .map(|f| f.path.to_string_lossy().into_owned())
            .collect();
        Ok(self.0.caption(paths).await?)
    }
}

#[async_trait]
impl EmotionClassifier for MlAdapter {
    async fn classify(&self, frame: &Frame) -> WorkerResult<EmotionReading> {
        Ok(self
            .0
            .classify_emotion(&frame.path.to_string_lossy())
            .await?)
    }
}
