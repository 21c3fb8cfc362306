//! Shared data models for the VScene backend.
//!
//! This crate provides Serde-serializable types for:
//! - Captions, transcript segments and scenes
//! - Emotion samples and the merged text/emotion overlay
//! - The final analysis result and per-job analysis settings
//! - Job identifiers, pipeline stages, progress events and status responses

pub mod analysis;
pub mod emotion;
pub mod job;
pub mod job_status;
pub mod timeline;

// Re-export common types
pub use analysis::{AnalysisResult, AnalysisSettings};
pub use emotion::{EmotionReading, EmotionSample, EmotionScores, MergedUnit, ERROR_EMOTION, NEUTRAL_EMOTION};
pub use job::{ArtifactKey, JobId};
pub use job_status::{JobEvent, JobProgress, JobState, JobStatus, PipelineStage, ProgressInfo};
pub use timeline::{Caption, CombinedScene, RepresentativeCaption, Scene, Transcript, TranscriptSegment};
