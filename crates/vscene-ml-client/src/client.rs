//! ML service HTTP client.

use std::time::Duration;

use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};
use vscene_models::{EmotionReading, Transcript};

use crate::error::{MlError, MlResult};
use crate::types::{
    CaptionRequest, CaptionResponse, EmotionRequest, HealthResponse, TranscribeRequest,
    TranscribeResponse,
};

/// Upper bound on a single retry delay.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Exponential backoff for retry `attempt` (zero-based), capped at
/// [`MAX_RETRY_DELAY`].
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    2u32.checked_pow(attempt)
        .and_then(|factor| base.checked_mul(factor))
        .map_or(MAX_RETRY_DELAY, |delay| delay.min(MAX_RETRY_DELAY))
}

/// Configuration for ML client.
#[derive(Debug, Clone)]
pub struct MlClientConfig {
    /// Base URL of ML service
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Max retries
    pub max_retries: u32,
    /// First retry delay, doubled on every attempt
    pub retry_backoff: Duration,
}

impl Default for MlClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            timeout: Duration::from_secs(600), // transcription of long videos
            max_retries: 2,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

impl MlClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("ML_SERVICE_URL").unwrap_or(defaults.base_url),
            timeout: std::env::var("ML_SERVICE_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_retries: std::env::var("ML_SERVICE_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            retry_backoff: defaults.retry_backoff,
        }
    }
}

/// Client for the ML sidecar.
#[derive(Debug, Clone)]
pub struct MlClient {
    http: Client,
    config: MlClientConfig,
}

impl MlClient {
    pub fn new(config: MlClientConfig) -> MlResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(MlError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> MlResult<Self> {
        Self::new(MlClientConfig::from_env())
    }

    pub fn config(&self) -> &MlClientConfig {
        &self.config
    }

    /// Check if ML service is healthy.
    pub async fn health_check(&self) -> MlResult<bool> {
        let url = format!("{}/health", self.config.base_url);

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                let health: HealthResponse = response.json().await?;
                Ok(health.status == "healthy" || health.status == "ok")
            }
            Ok(response) => {
                warn!("ML service health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("ML service health check error: {}", e);
                Ok(false)
            }
        }
    }

    /// Transcribe the audio track of a media file.
    pub async fn transcribe(&self, input_path: &str, model_size: &str) -> MlResult<Transcript> {
        let request = TranscribeRequest {
            input_path: input_path.to_string(),
            model_size: model_size.to_string(),
        };
        let response: TranscribeResponse = self.post_json("/transcribe", &request).await?;

        if let Some(seg) = response.segments.iter().find(|s| s.end < s.start) {
            return Err(MlError::InvalidResponse(format!(
                "segment ends before it starts ({} > {})",
                seg.start, seg.end
            )));
        }

        Ok(Transcript {
            segments: response.segments,
            text: response.text,
            language: response.language,
        })
    }

    /// Caption frames, one caption per path in request order.
    pub async fn caption(&self, frame_paths: Vec<String>) -> MlResult<Vec<String>> {
        if frame_paths.is_empty() {
            return Ok(Vec::new());
        }
        let expected = frame_paths.len();
        let response: CaptionResponse = self
            .post_json("/caption", &CaptionRequest { frame_paths })
            .await?;

        if response.captions.len() != expected {
            return Err(MlError::InvalidResponse(format!(
                "expected {} captions, got {}",
                expected,
                response.captions.len()
            )));
        }
        Ok(response.captions)
    }

    /// Classify the dominant facial emotion of one image.
    pub async fn classify_emotion(&self, image_path: &str) -> MlResult<EmotionReading> {
        let request = EmotionRequest {
            image_path: image_path.to_string(),
        };
        self.post_json("/emotion", &request).await
    }

    async fn post_json<Req, Resp>(&self, path: &str, body: &Req) -> MlResult<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.config.base_url, path);
        debug!("Sending ML request to {}", url);

        let response = self
            .with_retry(|| async {
                let response = self
                    .http
                    .post(&url)
                    .json(body)
                    .send()
                    .await
                    .map_err(MlError::Network)?;

                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(MlError::from_status(status, &body));
                }
                Ok(response)
            })
            .await?;

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> MlResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = MlResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = backoff_delay(self.config.retry_backoff, attempt);
                    warn!(
                        "ML request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
