//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use vscene_models::AnalysisSettings;

use crate::error::{WorkerError, WorkerResult};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// Work directory for per-job scratch files
    pub work_dir: PathBuf,
    /// How long one queue read blocks waiting for new jobs
    pub consumer_block: Duration,
    /// Prometheus exporter port, disabled when unset
    pub metrics_port: Option<u16>,
    /// Settings applied to submissions that don't carry their own
    pub analysis: AnalysisSettings,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            shutdown_timeout: Duration::from_secs(30),
            work_dir: PathBuf::from("/tmp/vscene"),
            consumer_block: Duration::from_millis(1000),
            metrics_port: None,
            analysis: AnalysisSettings::default(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_jobs: env_parse("WORKER_MAX_JOBS").unwrap_or(defaults.max_concurrent_jobs),
            shutdown_timeout: env_parse("WORKER_SHUTDOWN_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_timeout),
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            consumer_block: env_parse("WORKER_CONSUMER_BLOCK_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.consumer_block),
            metrics_port: env_parse("METRICS_PORT"),
            analysis: analysis_settings_from_env(),
        }
    }

    /// Reject configurations the executor can't run with.
    pub fn validate(&self) -> WorkerResult<()> {
        if self.max_concurrent_jobs == 0 {
            return Err(WorkerError::config_error("WORKER_MAX_JOBS must be at least 1"));
        }
        validate_settings(&self.analysis).map_err(WorkerError::config_error)
    }
}

/// Default analysis settings, overridable per deployment.
pub fn analysis_settings_from_env() -> AnalysisSettings {
    let defaults = AnalysisSettings::default();
    AnalysisSettings {
        whisper_model_size: std::env::var("WHISPER_MODEL_SIZE")
            .unwrap_or(defaults.whisper_model_size),
        frame_fps: env_parse("FRAME_FPS").unwrap_or(defaults.frame_fps),
        scene_threshold: env_parse("SCENE_THRESHOLD").unwrap_or(defaults.scene_threshold),
        scene_max_gap: env_parse("SCENE_MAX_GAP").unwrap_or(defaults.scene_max_gap),
        emotion_sample_rate: env_parse("EMOTION_SAMPLE_RATE")
            .unwrap_or(defaults.emotion_sample_rate),
    }
}

/// Check per-job settings, returning a human-readable reason on rejection.
pub fn validate_settings(settings: &AnalysisSettings) -> Result<(), String> {
    if settings.whisper_model_size.trim().is_empty() {
        return Err("whisper_model_size must not be empty".to_string());
    }
    if !(settings.frame_fps.is_finite() && settings.frame_fps > 0.0) {
        return Err(format!("frame_fps must be positive, got {}", settings.frame_fps));
    }
    if !(0.0..=1.0).contains(&settings.scene_threshold) {
        return Err(format!(
            "scene_threshold must be within [0, 1], got {}",
            settings.scene_threshold
        ));
    }
    if !(settings.emotion_sample_rate.is_finite() && settings.emotion_sample_rate > 0.0) {
        return Err(format!(
            "emotion_sample_rate must be positive, got {}",
            settings.emotion_sample_rate
        ));
    }
    Ok(())
}
