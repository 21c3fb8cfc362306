//! Client for the Python ML sidecar.
//!
//! The sidecar hosts the speech, captioning and facial-emotion models. It
//! shares a filesystem with the worker, so requests carry paths rather than
//! media bytes.

pub mod client;
pub mod error;
pub mod types;

pub use client::{MlClient, MlClientConfig};
pub use error::{MlError, MlResult};
pub use types::{
    CaptionRequest, CaptionResponse, EmotionRequest, HealthResponse, TranscribeRequest,
    TranscribeResponse,
};
