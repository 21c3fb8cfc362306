//! In-process fakes shared by the worker's unit tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use vscene_media::{Frame, MediaError};
use vscene_ml_client::MlError;
use vscene_models::{ArtifactKey, EmotionReading, EmotionScores, Transcript, TranscriptSegment};
use vscene_storage::{ArtifactStore, LocalArtifactStore, StorageResult};

use crate::collaborators::{Captioner, Collaborators, EmotionClassifier, FrameSampler, Transcriber};
use crate::error::WorkerResult;

pub struct FakeFrames {
    count: usize,
    duration: f64,
    fail_frame_at: Option<usize>,
}

impl FakeFrames {
    pub fn new(count: usize, duration: f64) -> Self {
        Self {
            count,
            duration,
            fail_frame_at: None,
        }
    }

    pub fn failing_frame_at(mut self, index: usize) -> Self {
        self.fail_frame_at = Some(index);
        self
    }
}

#[async_trait]
impl FrameSampler for FakeFrames {
    async fn sample_frames(
        &self,
        _video: &Path,
        fps: f64,
        out_dir: &Path,
    ) -> WorkerResult<Vec<Frame>> {
        Ok((0..self.count)
            .map(|index| Frame {
                index,
                time: index as f64 / fps,
                path: out_dir.join(format!("frame_{:06}.jpg", index + 1)),
            })
            .collect())
    }

    async fn duration(&self, _video: &Path) -> WorkerResult<f64> {
        Ok(self.duration)
    }

    async fn frame_at(
        &self,
        _video: &Path,
        index: usize,
        time: f64,
        out_dir: &Path,
    ) -> WorkerResult<Frame> {
        if self.fail_frame_at == Some(index) {
            return Err(MediaError::NoFrameAt(time).into());
        }
        Ok(Frame {
            index,
            time,
            path: out_dir.join(format!("sample_{:06}.jpg", index)),
        })
    }
}

pub struct FakeTranscriber {
    transcript: Option<Transcript>,
}

impl FakeTranscriber {
    pub fn with_segments(segments: Vec<TranscriptSegment>) -> Self {
        Self {
            transcript: Some(Transcript::from_segments(segments, Some("en".to_string()))),
        }
    }

    pub fn failing() -> Self {
        Self { transcript: None }
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, _video: &Path, _model_size: &str) -> WorkerResult<Transcript> {
        match &self.transcript {
            Some(t) => Ok(t.clone()),
            None => Err(MlError::ServiceUnavailable("speech model not loaded".into()).into()),
        }
    }
}

pub struct FakeCaptioner {
    captions: Vec<String>,
    panics: bool,
}

impl FakeCaptioner {
    pub fn new(captions: &[&str]) -> Self {
        Self {
            captions: captions.iter().map(|c| c.to_string()).collect(),
            panics: false,
        }
    }

    pub fn panicking() -> Self {
        Self {
            captions: Vec::new(),
            panics: true,
        }
    }
}

#[async_trait]
impl Captioner for FakeCaptioner {
    async fn caption(&self, _frames: &[Frame]) -> WorkerResult<Vec<String>> {
        if self.panics {
            panic!("caption model crashed");
        }
        Ok(self.captions.clone())
    }
}

pub struct FakeClassifier {
    dominant: String,
    failing: Vec<usize>,
}

impl FakeClassifier {
    pub fn always(dominant: &str) -> Self {
        Self::failing_at(&[], dominant)
    }

    pub fn failing_at(indices: &[usize], dominant: &str) -> Self {
        Self {
            dominant: dominant.to_string(),
            failing: indices.to_vec(),
        }
    }
}

#[async_trait]
impl EmotionClassifier for FakeClassifier {
    async fn classify(&self, frame: &Frame) -> WorkerResult<EmotionReading> {
        if self.failing.contains(&frame.index) {
            return Err(MlError::RequestFailed("no face detected".into()).into());
        }
        let mut scores = EmotionScores::new();
        scores.insert(self.dominant.clone(), 0.8);
        scores.insert("neutral".to_string(), 0.2);
        Ok(EmotionReading {
            dominant_emotion: self.dominant.clone(),
            emotion_scores: scores,
        })
    }
}

/// Collaborators for a short, well-behaved clip.
pub fn happy_path() -> Collaborators {
    Collaborators {
        transcriber: Arc::new(FakeTranscriber::with_segments(vec![
            TranscriptSegment::new(0.0, 1.5, "Hello there. "),
            TranscriptSegment::new(1.5, 3.0, "How are you. Fine"),
        ])),
        frames: Arc::new(FakeFrames::new(4, 4.0)),
        captioner: Arc::new(FakeCaptioner::new(&[
            "a cat on a mat",
            "a cat on a mat",
            "a dog running",
            "a dog runs fast",
        ])),
        emotions: Arc::new(FakeClassifier::always("happy")),
    }
}

/// Local store that counts deletions.
pub struct CountingStore {
    inner: LocalArtifactStore,
    deletes: AtomicUsize,
}

impl CountingStore {
    pub async fn new(root: PathBuf) -> Self {
        Self {
            inner: LocalArtifactStore::new(root).await.unwrap(),
            deletes: AtomicUsize::new(0),
        }
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Write a placeholder artifact under `key`.
    pub async fn seed(&self, key: &ArtifactKey) {
        let path = self.inner.resolve(key).unwrap();
        tokio::fs::write(path, b"fake video").await.unwrap();
    }
}

#[async_trait]
impl ArtifactStore for CountingStore {
    fn backend(&self) -> &'static str {
        "counting"
    }

    async fn exists(&self, key: &ArtifactKey) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    async fn fetch(&self, key: &ArtifactKey, work_dir: &Path) -> StorageResult<PathBuf> {
        self.inner.fetch(key, work_dir).await
    }

    async fn put_file(&self, path: &Path, key: &ArtifactKey) -> StorageResult<()> {
        self.inner.put_file(path, key).await
    }

    async fn delete(&self, key: &ArtifactKey) -> StorageResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(key).await
    }

    async fn check_connectivity(&self) -> StorageResult<()> {
        self.inner.check_connectivity().await
    }
}
