//! Scene-timeline analysis worker.
//!
//! This crate wires the timeline core to the outside world:
//! - The analysis pipeline with progress reporting and artifact cleanup
//! - Collaborator traits for transcription, frames, captions and emotions
//! - Job submission and status queries
//! - The queue-consuming executor, configuration, logging and metrics

pub mod collaborators;
pub mod config;
pub mod emotions;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod progress;
pub mod service;

#[cfg(test)]
mod testing;

pub use collaborators::{
    Captioner, Collaborators, EmotionClassifier, FfmpegFrameSampler, FrameSampler, MlAdapter,
    Transcriber,
};
pub use config::{analysis_settings_from_env, validate_settings, WorkerConfig};
pub use emotions::analyze_emotions;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use logging::{init_tracing, JobLogger};
pub use pipeline::AnalysisPipeline;
pub use progress::ProgressReporter;
pub use service::JobService;
