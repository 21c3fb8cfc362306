//! Pipeline stages, progress events and job status responses.
//!
//! Progress is an append-only stream of [`JobEvent`]s per job. The status
//! query reads the latest event and projects it onto a [`JobStatus`].

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::AnalysisResult;

/// Stages of one analysis run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Queued,
    Starting,
    Transcribing,
    ExtractingFrames,
    Captioning,
    GroupingScenes,
    AttachingDialogue,
    AnalyzingEmotions,
    Finalizing,
}

impl PipelineStage {
    /// Processing stages in the order the pipeline runs them.
    pub const SEQUENCE: [PipelineStage; 8] = [
        PipelineStage::Starting,
        PipelineStage::Transcribing,
        PipelineStage::ExtractingFrames,
        PipelineStage::Captioning,
        PipelineStage::GroupingScenes,
        PipelineStage::AttachingDialogue,
        PipelineStage::AnalyzingEmotions,
        PipelineStage::Finalizing,
    ];

    /// Fixed percent published when the stage begins.
    pub fn percent(&self) -> u8 {
        match self {
            PipelineStage::Queued => 0,
            PipelineStage::Starting => 5,
            PipelineStage::Transcribing => 20,
            PipelineStage::ExtractingFrames => 40,
            PipelineStage::Captioning => 60,
            PipelineStage::GroupingScenes => 70,
            PipelineStage::AttachingDialogue => 80,
            PipelineStage::AnalyzingEmotions => 90,
            PipelineStage::Finalizing => 100,
        }
    }

    /// Human-readable step label.
    pub fn step(&self) -> &'static str {
        match self {
            PipelineStage::Queued => "queued",
            PipelineStage::Starting => "starting analysis",
            PipelineStage::Transcribing => "transcribing audio",
            PipelineStage::ExtractingFrames => "extracting frames",
            PipelineStage::Captioning => "captioning frames",
            PipelineStage::GroupingScenes => "grouping scenes",
            PipelineStage::AttachingDialogue => "attaching dialogue",
            PipelineStage::AnalyzingEmotions => "analyzing emotions",
            PipelineStage::Finalizing => "finalizing",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Queued => "queued",
            PipelineStage::Starting => "starting",
            PipelineStage::Transcribing => "transcribing",
            PipelineStage::ExtractingFrames => "extracting_frames",
            PipelineStage::Captioning => "captioning",
            PipelineStage::GroupingScenes => "grouping_scenes",
            PipelineStage::AttachingDialogue => "attaching_dialogue",
            PipelineStage::AnalyzingEmotions => "analyzing_emotions",
            PipelineStage::Finalizing => "finalizing",
        }
    }

    /// Progress record announcing this stage.
    pub fn progress(&self) -> JobProgress {
        let state = match self {
            PipelineStage::Queued => JobState::Pending,
            _ => JobState::Processing,
        };
        JobProgress {
            percent: self.percent(),
            step: self.step().to_string(),
            state,
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coarse job state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Job is waiting in queue
    #[default]
    Pending,
    /// Job is being processed
    Processing,
    /// Job completed successfully
    Completed,
    /// Job failed
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Progress snapshot of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct JobProgress {
    /// Progress percentage (0-100), non-decreasing over a job's lifetime
    pub percent: u8,
    /// Current processing step description
    pub step: String,
    pub state: JobState,
}

impl JobProgress {
    /// Terminal success record.
    pub fn completed() -> Self {
        Self {
            percent: 100,
            step: "completed".to_string(),
            state: JobState::Completed,
        }
    }

    /// Terminal failure record that keeps the last reached percent.
    pub fn failed(percent: u8, step: impl Into<String>) -> Self {
        Self {
            percent: percent.min(100),
            step: step.into(),
            state: JobState::Failed,
        }
    }
}

/// One entry of a job's append-only progress stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobEvent {
    /// Position in the job's stream, assigned by the status store
    #[serde(default)]
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub progress: JobProgress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Box<AnalysisResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobEvent {
    fn new(progress: JobProgress) -> Self {
        Self {
            seq: 0,
            at: Utc::now(),
            progress,
            result: None,
            error: None,
        }
    }

    /// Event announcing the start of a stage.
    pub fn stage(stage: PipelineStage) -> Self {
        Self::new(stage.progress())
    }

    /// Terminal success event carrying the full result.
    pub fn completed(result: AnalysisResult) -> Self {
        Self {
            result: Some(Box::new(result)),
            ..Self::new(JobProgress::completed())
        }
    }

    /// Terminal failure event.
    pub fn failed(last: &JobProgress, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(JobProgress::failed(last.percent, last.step.clone()))
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.progress.state.is_terminal()
    }

    /// Project this event onto the status response.
    pub fn to_status(&self) -> JobStatus {
        match self.progress.state {
            JobState::Pending => JobStatus::Pending,
            JobState::Processing => JobStatus::Processing {
                progress: ProgressInfo::from(&self.progress),
            },
            JobState::Completed => match &self.result {
                Some(result) => JobStatus::Completed {
                    result: result.clone(),
                },
                None => JobStatus::Failed {
                    error: "completed job is missing its result".to_string(),
                },
            },
            JobState::Failed => JobStatus::Failed {
                error: self
                    .error
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string()),
            },
        }
    }
}

/// Percent and step as exposed to status readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ProgressInfo {
    pub percent: u8,
    pub step: String,
}

impl From<&JobProgress> for ProgressInfo {
    fn from(p: &JobProgress) -> Self {
        Self {
            percent: p.percent,
            step: p.step.clone(),
        }
    }
}

/// Status query response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing { progress: ProgressInfo },
    Completed { result: Box<AnalysisResult> },
    Failed { error: String },
}

impl JobStatus {
    pub fn state(&self) -> JobState {
        match self {
            JobStatus::Pending => JobState::Pending,
            JobStatus::Processing { .. } => JobState::Processing,
            JobStatus::Completed { .. } => JobState::Completed,
            JobStatus::Failed { .. } => JobState::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_result() -> AnalysisResult {
        AnalysisResult {
            transcript_text: String::new(),
            transcript_segments: Vec::new(),
            frame_captions: Vec::new(),
            scenes: Vec::new(),
            combined_scenes: Vec::new(),
            language: None,
            merged_text_emotions: Vec::new(),
        }
    }

    #[test]
    fn test_stage_schedule_is_non_decreasing() {
        let percents: Vec<u8> = PipelineStage::SEQUENCE.iter().map(|s| s.percent()).collect();
        assert_eq!(percents, vec![5, 20, 40, 60, 70, 80, 90, 100]);
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));
        assert!(PipelineStage::Queued.percent() <= percents[0]);
    }

    #[test]
    fn test_queued_event_reads_as_pending() {
        let event = JobEvent::stage(PipelineStage::Queued);
        assert_eq!(event.to_status(), JobStatus::Pending);
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_processing_status_json_shape() {
        let status = JobEvent::stage(PipelineStage::Captioning).to_status();
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "processing");
        assert_eq!(json["progress"]["percent"], 60);
        assert_eq!(json["progress"]["step"], "captioning frames");
    }

    #[test]
    fn test_failed_event_keeps_last_percent() {
        let last = PipelineStage::ExtractingFrames.progress();
        let event = JobEvent::failed(&last, "ffmpeg exploded");
        assert_eq!(event.progress.percent, 40);
        assert!(event.is_terminal());
        let json = serde_json::to_value(event.to_status()).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "ffmpeg exploded");
        assert!(json.get("result").is_none());
    }

    #[test]
    fn test_completed_event_carries_result() {
        let event = JobEvent::completed(empty_result());
        assert_eq!(event.progress.percent, 100);
        match event.to_status() {
            JobStatus::Completed { result } => assert!(result.scenes.is_empty()),
            other => panic!("unexpected status: {other:?}"),
        }
    }

    #[test]
    fn test_event_serde_roundtrip() {
        let event = JobEvent::completed(empty_result());
        let json = serde_json::to_string(&event).expect("serialize JobEvent");
        let decoded: JobEvent = serde_json::from_str(&json).expect("deserialize JobEvent");
        assert_eq!(decoded, event);
    }
}
