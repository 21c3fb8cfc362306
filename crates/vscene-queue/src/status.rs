//! Per-job progress event streams.
//!
//! Each job owns an append-only list of [`JobEvent`]s. The status query
//! reads the latest event; readers never see a stream shrink or reorder.

use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use redis::AsyncCommands;
use tokio::sync::RwLock;
use tracing::debug;
use vscene_models::{JobEvent, JobId};

use crate::error::QueueResult;

/// TTL for job event streams (7 days).
pub const JOB_STATUS_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Store of per-job progress events.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Append an event to the job's stream, returning it with its sequence
    /// number assigned.
    async fn append(&self, job_id: &JobId, event: JobEvent) -> QueueResult<JobEvent>;

    /// Most recent event, if the job has any.
    async fn latest(&self, job_id: &JobId) -> QueueResult<Option<JobEvent>>;

    /// Full event history in append order.
    async fn events(&self, job_id: &JobId) -> QueueResult<Vec<JobEvent>>;

    /// Drop a job's stream entirely. Only for ids that never reached a
    /// worker, such as a submission that lost to a duplicate.
    async fn discard(&self, job_id: &JobId) -> QueueResult<()>;
}

/// Redis-backed event store.
///
/// Events live in a list at `vscene:job:{id}:events`; an event's sequence
/// number is its list index. Appends are also published on `progress:{id}`.
#[derive(Clone)]
pub struct RedisStatusStore {
    client: redis::Client,
    ttl_secs: u64,
}

impl RedisStatusStore {
    pub fn new(redis_url: &str) -> QueueResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            ttl_secs: JOB_STATUS_TTL_SECS,
        })
    }

    /// Create from `REDIS_URL` and `JOB_STATUS_TTL_SECS`.
    pub fn from_env() -> QueueResult<Self> {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let mut store = Self::new(&url)?;
        if let Some(ttl) = std::env::var("JOB_STATUS_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            store.ttl_secs = ttl;
        }
        Ok(store)
    }

    pub fn events_key(job_id: &JobId) -> String {
        format!("vscene:job:{}:events", job_id)
    }

    pub fn channel_name(job_id: &JobId) -> String {
        format!("progress:{}", job_id)
    }

    /// Live events for a job, as they are appended.
    ///
    /// Subscribe before reading [`StatusStore::latest`] to avoid missing an
    /// event between the two calls.
    pub async fn subscribe(
        &self,
        job_id: &JobId,
    ) -> QueueResult<Pin<Box<dyn Stream<Item = JobEvent> + Send>>> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(Self::channel_name(job_id)).await?;

        let stream = pubsub.into_on_message().filter_map(|msg| async move {
            let payload: String = msg.get_payload().ok()?;
            serde_json::from_str(&payload).ok()
        });

        Ok(Box::pin(stream))
    }
}

fn decode(index: usize, payload: &str) -> QueueResult<JobEvent> {
    let mut event: JobEvent = serde_json::from_str(payload)?;
    event.seq = index as u64;
    Ok(event)
}

#[async_trait]
impl StatusStore for RedisStatusStore {
    async fn append(&self, job_id: &JobId, mut event: JobEvent) -> QueueResult<JobEvent> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = Self::events_key(job_id);
        let payload = serde_json::to_string(&event)?;

        let (len,): (u64,) = redis::pipe()
            .atomic()
            .rpush(&key, &payload)
            .expire(&key, self.ttl_secs as i64)
            .ignore()
            .query_async(&mut conn)
            .await?;
        event.seq = len.saturating_sub(1);

        let message = serde_json::to_string(&event)?;
        conn.publish::<_, _, ()>(Self::channel_name(job_id), message)
            .await?;

        debug!(
            "Appended event {} for job {} ({}% {})",
            event.seq, job_id, event.progress.percent, event.progress.step
        );
        Ok(event)
    }

    async fn latest(&self, job_id: &JobId) -> QueueResult<Option<JobEvent>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = Self::events_key(job_id);

        let (len, last): (usize, Option<String>) = redis::pipe()
            .atomic()
            .llen(&key)
            .lindex(&key, -1)
            .query_async(&mut conn)
            .await?;

        match last {
            Some(payload) if len > 0 => Ok(Some(decode(len - 1, &payload)?)),
            _ => Ok(None),
        }
    }

    async fn events(&self, job_id: &JobId) -> QueueResult<Vec<JobEvent>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payloads: Vec<String> = conn.lrange(Self::events_key(job_id), 0, -1).await?;
        payloads
            .iter()
            .enumerate()
            .map(|(i, p)| decode(i, p))
            .collect()
    }

    async fn discard(&self, job_id: &JobId) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.del::<_, ()>(Self::events_key(job_id)).await?;
        Ok(())
    }
}

/// In-process event store for single-process runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStatusStore {
    jobs: RwLock<HashMap<JobId, Vec<JobEvent>>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn append(&self, job_id: &JobId, mut event: JobEvent) -> QueueResult<JobEvent> {
        let mut jobs = self.jobs.write().await;
        let stream = jobs.entry(job_id.clone()).or_default();
        event.seq = stream.len() as u64;
        stream.push(event.clone());
        Ok(event)
    }

    async fn latest(&self, job_id: &JobId) -> QueueResult<Option<JobEvent>> {
        let jobs = self.jobs.read().await;
        Ok(jobs.get(job_id).and_then(|events| events.last().cloned()))
    }

    async fn events(&self, job_id: &JobId) -> QueueResult<Vec<JobEvent>> {
        let jobs = self.jobs.read().await;
        Ok(jobs.get(job_id).cloned().unwrap_or_default())
    }

    async fn discard(&self, job_id: &JobId) -> QueueResult<()> {
        self.jobs.write().await.remove(job_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vscene_models::{JobStatus, PipelineStage};

    #[tokio::test]
    async fn test_memory_store_assigns_sequence_numbers() {
        let store = MemoryStatusStore::new();
        let job_id = JobId::new();

        assert!(store.latest(&job_id).await.unwrap().is_none());

        let first = store
            .append(&job_id, JobEvent::stage(PipelineStage::Queued))
            .await
            .unwrap();
        let second = store
            .append(&job_id, JobEvent::stage(PipelineStage::Starting))
            .await
            .unwrap();
        assert_eq!(first.seq, 0);
        assert_eq!(second.seq, 1);

        let latest = store.latest(&job_id).await.unwrap().unwrap();
        assert_eq!(latest.seq, 1);
        assert!(matches!(latest.to_status(), JobStatus::Processing { .. }));
        assert_eq!(store.events(&job_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_memory_store_isolates_jobs() {
        let store = MemoryStatusStore::new();
        let (a, b) = (JobId::new(), JobId::new());
        store.append(&a, JobEvent::stage(PipelineStage::Queued)).await.unwrap();
        assert!(store.events(&b).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_discard() {
        let store = MemoryStatusStore::new();
        let (a, b) = (JobId::new(), JobId::new());
        store.append(&a, JobEvent::stage(PipelineStage::Queued)).await.unwrap();
        store.append(&b, JobEvent::stage(PipelineStage::Queued)).await.unwrap();

        store.discard(&a).await.unwrap();
        assert!(store.latest(&a).await.unwrap().is_none());
        assert_eq!(store.events(&b).await.unwrap().len(), 1);
        // Discarding an unknown id is a no-op.
        store.discard(&JobId::new()).await.unwrap();
    }

    #[test]
    fn test_decode_uses_list_index() {
        let payload = serde_json::to_string(&JobEvent::stage(PipelineStage::Captioning)).unwrap();
        let event = decode(7, &payload).unwrap();
        assert_eq!(event.seq, 7);
        assert_eq!(event.progress.percent, 60);
    }

    #[test]
    fn test_key_names() {
        let id = JobId::from_string("abc");
        assert_eq!(RedisStatusStore::events_key(&id), "vscene:job:abc:events");
        assert_eq!(RedisStatusStore::channel_name(&id), "progress:abc");
    }
}
