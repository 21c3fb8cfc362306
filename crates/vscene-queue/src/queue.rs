//! Job queue using Redis Streams.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::{debug, info, warn};
use vscene_models::JobId;

use crate::error::{QueueError, QueueResult};
use crate::job::AnalyzeVideoJob;

/// Releases a dedup key only if it still names the given job.
/// Claim the idempotency key for ARGV[1], or return the job that holds it.
///
/// Runs as one script so the key cannot expire between the check and the
/// read. Returns nil when the claim succeeded.
const CLAIM_DEDUP_SCRIPT: &str = r#"
local owner = redis.call('GET', KEYS[1])
if owner then
    return owner
end
redis.call('SET', KEYS[1], ARGV[1], 'EX', ARGV[2])
return false
"#;

const RELEASE_DEDUP_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
"#;

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Stream name for jobs
    pub stream_name: String,
    /// Consumer group name
    pub consumer_group: String,
    /// How long an idempotency key blocks duplicate submissions
    pub dedup_ttl: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            stream_name: "vscene:jobs".to_string(),
            consumer_group: "vscene:workers".to_string(),
            dedup_ttl: Duration::from_secs(3600),
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            stream_name: std::env::var("QUEUE_STREAM").unwrap_or(defaults.stream_name),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP")
                .unwrap_or(defaults.consumer_group),
            dedup_ttl: std::env::var("QUEUE_DEDUP_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.dedup_ttl),
        }
    }
}

/// Destination for newly submitted jobs.
#[async_trait]
pub trait JobSink: Send + Sync {
    /// Enqueue a job, returning the broker's message ID.
    ///
    /// Fails with [`QueueError::Duplicate`] while another job holds the same
    /// idempotency key.
    async fn enqueue(&self, job: &AnalyzeVideoJob) -> QueueResult<String>;
}

/// Job queue client.
#[derive(Clone)]
pub struct JobQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl JobQueue {
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    fn dedup_key(idempotency_key: &str) -> String {
        format!("vscene:dedup:{}", idempotency_key)
    }

    /// Initialize the queue (create consumer group if not exists).
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!("Created consumer group: {}", self.config.consumer_group),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!("Consumer group already exists: {}", self.config.consumer_group);
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    /// Ping the server.
    pub async fn check_connectivity(&self) -> QueueResult<()> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::connection_failed(e.to_string()))?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }

    /// Enqueue a job.
    pub async fn enqueue(&self, job: &AnalyzeVideoJob) -> QueueResult<String> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let payload = serde_json::to_string(job)?;
        let idempotency_key = job.idempotency_key();
        let dedup_key = Self::dedup_key(&idempotency_key);

        let owner: Option<String> = redis::Script::new(CLAIM_DEDUP_SCRIPT)
            .key(&dedup_key)
            .arg(job.job_id.as_str())
            .arg(self.config.dedup_ttl.as_secs().max(1))
            .invoke_async(&mut conn)
            .await?;

        if let Some(existing) = owner {
            warn!("Duplicate job rejected: {}", idempotency_key);
            return Err(QueueError::Duplicate {
                existing: JobId::from(existing),
            });
        }

        let added: Result<String, redis::RedisError> = redis::cmd("XADD")
            .arg(&self.config.stream_name)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .arg("key")
            .arg(&idempotency_key)
            .query_async(&mut conn)
            .await;

        let message_id = match added {
            Ok(id) => id,
            Err(e) => {
                // Give the key back so the caller can resubmit.
                conn.del::<_, ()>(&dedup_key).await.ok();
                return Err(QueueError::enqueue_failed(e.to_string()));
            }
        };

        info!("Enqueued job {} with message ID {}", job.job_id, message_id);
        Ok(message_id)
    }

    /// Drop the job's idempotency key once the job is finished.
    pub async fn release_dedup(&self, job: &AnalyzeVideoJob) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let released: i64 = redis::Script::new(RELEASE_DEDUP_SCRIPT)
            .key(Self::dedup_key(&job.idempotency_key()))
            .arg(job.job_id.as_str())
            .invoke_async(&mut conn)
            .await?;
        debug!("Released dedup key for job {} ({})", job.job_id, released);
        Ok(())
    }

    /// Acknowledge a job and drop it from the stream.
    pub async fn ack(&self, message_id: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        redis::cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        redis::cmd("XDEL")
            .arg(&self.config.stream_name)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        debug!("Acknowledged job: {}", message_id);
        Ok(())
    }

    /// Get queue length.
    pub async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = conn.xlen(&self.config.stream_name).await?;
        Ok(len)
    }

    /// Read new jobs for this consumer, blocking up to `block_ms`.
    pub async fn consume(
        &self,
        consumer_name: &str,
        block_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, AnalyzeVideoJob)>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: Option<redis::streams::StreamReadReply> = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(">")
            .query_async(&mut conn)
            .await?;

        let mut jobs = Vec::new();

        for stream_key in result.map(|r| r.keys).unwrap_or_default() {
            for entry in stream_key.ids {
                let message_id = entry.id.clone();
                let payload: Option<String> = entry.get("job");

                match payload.as_deref().map(serde_json::from_str::<AnalyzeVideoJob>) {
                    Some(Ok(job)) => {
                        debug!("Consumed job {} from stream", job.job_id);
                        jobs.push((message_id, job));
                    }
                    Some(Err(e)) => {
                        warn!("Failed to parse job payload: {}", e);
                        // Ack the malformed message to prevent redelivery
                        self.ack(&message_id).await.ok();
                    }
                    None => {
                        warn!("Stream entry {} has no job field", message_id);
                        self.ack(&message_id).await.ok();
                    }
                }
            }
        }

        Ok(jobs)
    }
}

#[async_trait]
impl JobSink for JobQueue {
    async fn enqueue(&self, job: &AnalyzeVideoJob) -> QueueResult<String> {
        JobQueue::enqueue(self, job).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = QueueConfig::default();
        assert_eq!(config.stream_name, "vscene:jobs");
        assert_eq!(config.consumer_group, "vscene:workers");
        assert_eq!(config.dedup_ttl, Duration::from_secs(3600));
    }

    #[test]
    fn test_dedup_key_namespace() {
        assert_eq!(JobQueue::dedup_key("analyze:clip.mp4"), "vscene:dedup:analyze:clip.mp4");
    }

    #[test]
    fn test_client_open_is_lazy() {
        // Opening a client only parses the URL.
        assert!(JobQueue::new(QueueConfig::default()).is_ok());
        let bad = QueueConfig {
            redis_url: "not a url".into(),
            ..QueueConfig::default()
        };
        assert!(JobQueue::new(bad).is_err());
    }
}
