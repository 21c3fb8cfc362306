//! Redis Streams job queue and job status store.
//!
//! This crate provides:
//! - Job enqueueing via Redis Streams with idempotency-key deduplication
//! - Worker consumption through a consumer group
//! - An append-only progress event stream per job, with Pub/Sub fan-out

pub mod error;
pub mod job;
pub mod queue;
pub mod status;

pub use error::{QueueError, QueueResult};
pub use job::AnalyzeVideoJob;
pub use queue::{JobQueue, JobSink, QueueConfig};
pub use status::{MemoryStatusStore, RedisStatusStore, StatusStore, JOB_STATUS_TTL_SECS};
