//! Caption, transcript and scene types.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Caption of one sampled frame. Time is `index / fps`.
///
/// Derefs to its text through `AsRef<str>`, so a caption sequence can be fed
/// straight to the scene segmenter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Caption {
    pub index: usize,
    pub text: String,
}

impl Caption {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }
}

impl AsRef<str> for Caption {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

/// A timed line of spoken dialogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TranscriptSegment {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds (>= start)
    pub end: f64,
    pub text: String,
}

impl TranscriptSegment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }
}

/// Full output of the transcription collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Transcript {
    /// Segments ordered by start time
    pub segments: Vec<TranscriptSegment>,
    /// Concatenated text of all segments
    pub text: String,
    /// Detected language tag
    #[serde(default)]
    pub language: Option<String>,
}

impl Transcript {
    /// Build a transcript whose text is the plain concatenation of segment texts.
    pub fn from_segments(segments: Vec<TranscriptSegment>, language: Option<String>) -> Self {
        let text = segments.iter().map(|s| s.text.as_str()).collect::<String>();
        Self {
            segments,
            text,
            language,
        }
    }
}

/// A contiguous run of captions judged continuous by the segmenter.
///
/// `start_index..end_index` is half-open over the caption sequence. The
/// indices stay in-process: a serialized scene is `{captions, start_time,
/// end_time}`, and a decoded one has both indices at zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Scene {
    pub captions: Vec<String>,
    pub start_time: f64,
    pub end_time: f64,
    #[serde(skip)]
    pub start_index: usize,
    #[serde(skip)]
    pub end_index: usize,
}

impl Scene {
    pub fn len(&self) -> usize {
        self.end_index - self.start_index
    }

    pub fn is_empty(&self) -> bool {
        self.start_index == self.end_index
    }

    /// Closed-interval containment test on the scene's time range.
    pub fn contains_time(&self, t: f64) -> bool {
        self.start_time <= t && t <= self.end_time
    }
}

/// A scene with its representative description and aligned dialogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CombinedScene {
    pub start_time: f64,
    pub end_time: f64,
    pub description: String,
    pub dialogue: Vec<String>,
}

/// Medoid caption of a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RepresentativeCaption {
    pub text: String,
    /// Position of the caption within the scene
    pub index: usize,
    /// Aggregate similarity of every member to all others
    pub scores: Vec<f64>,
}
