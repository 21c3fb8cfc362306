//! Facial-emotion samples and the merged text/emotion overlay.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Emotion label used when a sentence has no positional sample.
pub const NEUTRAL_EMOTION: &str = "neutral";

/// Dominant label recorded for a sample whose classification failed.
pub const ERROR_EMOTION: &str = "error";

/// Label → probability in `[0, 1]`.
pub type EmotionScores = BTreeMap<String, f64>;

/// Raw classifier output for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EmotionReading {
    pub dominant_emotion: String,
    pub emotion_scores: EmotionScores,
}

/// One emotion reading at a sampled timestamp.
///
/// A sample whose classification failed is kept in place with
/// `dominant_emotion = "error"` and the failure text in `error`, so the
/// sequence always has one record per requested time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EmotionSample {
    pub time: f64,
    pub dominant_emotion: String,
    pub emotion_scores: EmotionScores,
    pub num_faces: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EmotionSample {
    /// Successful reading for a single detected face.
    pub fn from_reading(time: f64, reading: EmotionReading) -> Self {
        Self {
            time,
            dominant_emotion: reading.dominant_emotion,
            emotion_scores: reading.emotion_scores,
            num_faces: 1,
            error: None,
        }
    }

    /// Inline record for a sample that failed in isolation.
    pub fn degraded(time: f64, error: impl Into<String>) -> Self {
        Self {
            time,
            dominant_emotion: ERROR_EMOTION.to_string(),
            emotion_scores: EmotionScores::new(),
            num_faces: 0,
            error: Some(error.into()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

/// One transcript sentence paired positionally with an emotion sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MergedUnit {
    pub text: String,
    pub emotion: String,
    pub emotion_scores: EmotionScores,
    pub time: Option<f64>,
}

impl MergedUnit {
    /// Unit with no matching sample.
    pub fn neutral(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            emotion: NEUTRAL_EMOTION.to_string(),
            emotion_scores: EmotionScores::new(),
            time: None,
        }
    }
}
