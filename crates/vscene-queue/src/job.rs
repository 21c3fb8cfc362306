//! Job payload carried on the queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vscene_models::{AnalysisSettings, ArtifactKey, JobId};

/// Job to build the scene timeline of one uploaded video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeVideoJob {
    /// Unique job ID
    pub job_id: JobId,
    /// Uploaded input video, deleted once the job finishes
    pub artifact_key: ArtifactKey,
    #[serde(default)]
    pub settings: AnalysisSettings,
    /// When the job was created
    pub created_at: DateTime<Utc>,
}

impl AnalyzeVideoJob {
    pub fn new(artifact_key: ArtifactKey, settings: AnalysisSettings) -> Self {
        Self {
            job_id: JobId::new(),
            artifact_key,
            settings,
            created_at: Utc::now(),
        }
    }

    /// Generate idempotency key for deduplication.
    ///
    /// An artifact is consumed by its job, so one artifact maps to at most
    /// one live job.
    pub fn idempotency_key(&self) -> String {
        format!("analyze:{}", self.artifact_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idempotency_key_ignores_job_id() {
        let a = AnalyzeVideoJob::new(ArtifactKey::new("u/clip.mp4"), AnalysisSettings::default());
        let b = AnalyzeVideoJob::new(ArtifactKey::new("u/clip.mp4"), AnalysisSettings::default());
        assert_ne!(a.job_id, b.job_id);
        assert_eq!(a.idempotency_key(), b.idempotency_key());
        assert_eq!(a.idempotency_key(), "analyze:u/clip.mp4");
    }

    #[test]
    fn test_payload_without_settings_uses_defaults() {
        let json = r#"{
            "job_id": "j-1",
            "artifact_key": "clip.mp4",
            "created_at": "2024-01-01T00:00:00Z"
        }"#;
        let job: AnalyzeVideoJob = serde_json::from_str(json).unwrap();
        assert_eq!(job.settings, AnalysisSettings::default());
        assert_eq!(job.job_id.as_str(), "j-1");
    }
}
