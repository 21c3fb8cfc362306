//! ML service request/response types.

use serde::{Deserialize, Serialize};
use vscene_models::TranscriptSegment;

/// Request for speech transcription of a media file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscribeRequest {
    /// Path to input video
    pub input_path: String,
    /// Whisper model size (tiny, base, small, medium, large)
    pub model_size: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscribeResponse {
    pub segments: Vec<TranscriptSegment>,
    pub text: String,
    #[serde(default)]
    pub language: Option<String>,
}

/// Request for one caption per frame, in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionRequest {
    pub frame_paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionResponse {
    pub captions: Vec<String>,
}

/// Request for facial-emotion classification of one image.
///
/// The response body is a [`vscene_models::EmotionReading`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionRequest {
    pub image_path: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: Option<String>,
}
