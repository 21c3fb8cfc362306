//! Prometheus metrics for the worker.

use std::net::{Ipv4Addr, SocketAddr};

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use vscene_models::PipelineStage;

use crate::error::{WorkerError, WorkerResult};

/// Metric names as constants for consistency.
pub mod names {
    // Job metrics
    pub const JOBS_SUBMITTED_TOTAL: &str = "vscene_jobs_submitted_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "vscene_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "vscene_jobs_failed_total";

    // Pipeline metrics
    pub const STAGE_DURATION_SECONDS: &str = "vscene_stage_duration_seconds";
    pub const EMOTION_SAMPLES_DEGRADED_TOTAL: &str = "vscene_emotion_samples_degraded_total";
    pub const ARTIFACT_CLEANUP_FAILURES_TOTAL: &str = "vscene_artifact_cleanup_failures_total";
}

/// Install the Prometheus recorder and serve `/metrics` on `port`.
///
/// Must be called from inside a Tokio runtime.
pub fn init_metrics(port: u16) -> WorkerResult<()> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| WorkerError::config_error(format!("metrics exporter: {}", e)))
}

pub fn record_job_submitted() {
    counter!(names::JOBS_SUBMITTED_TOTAL).increment(1);
}

pub fn record_job_completed() {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
}

/// Record a failed job, labelled by the stage it failed in.
pub fn record_job_failed(stage: Option<PipelineStage>) {
    let labels = [(
        "stage",
        stage.map(|s| s.as_str()).unwrap_or("unknown").to_string(),
    )];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

pub fn record_stage_duration(stage: PipelineStage, duration_secs: f64) {
    let labels = [("stage", stage.as_str().to_string())];
    histogram!(names::STAGE_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_degraded_sample() {
    counter!(names::EMOTION_SAMPLES_DEGRADED_TOTAL).increment(1);
}

pub fn record_cleanup_failure() {
    counter!(names::ARTIFACT_CLEANUP_FAILURES_TOTAL).increment(1);
}
