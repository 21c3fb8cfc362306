//! Analysis result and per-job analysis settings.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{CombinedScene, MergedUnit, Scene, TranscriptSegment};

/// Final payload of a completed analysis job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisResult {
    pub transcript_text: String,
    pub transcript_segments: Vec<TranscriptSegment>,
    pub frame_captions: Vec<String>,
    pub scenes: Vec<Scene>,
    pub combined_scenes: Vec<CombinedScene>,
    pub language: Option<String>,
    pub merged_text_emotions: Vec<MergedUnit>,
}

/// Tunables for one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Speech model size requested from the transcription service
    pub whisper_model_size: String,
    /// Frames sampled per second for captioning
    pub frame_fps: f64,
    /// Caption similarity needed to stay in the open scene
    pub scene_threshold: f64,
    /// Dissimilar captions tolerated before a scene is closed
    pub scene_max_gap: u32,
    /// Seconds between emotion samples
    pub emotion_sample_rate: f64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            whisper_model_size: "small".to_string(),
            frame_fps: 1.0,
            scene_threshold: 0.6,
            scene_max_gap: 1,
            emotion_sample_rate: 1.0,
        }
    }
}
