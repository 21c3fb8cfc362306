//! Scene-timeline analysis worker binary.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use vscene_ml_client::MlClient;
use vscene_queue::{JobQueue, RedisStatusStore};
use vscene_storage::{open_store, StoreConfig};
use vscene_worker::{
    init_tracing, metrics, AnalysisPipeline, Collaborators, JobExecutor, WorkerConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for TLS to Redis and S3)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();
    init_tracing("vscene=info");

    info!("Starting vscene-worker");

    let config = WorkerConfig::from_env();
    config.validate()?;
    info!("Worker config: {:?}", config);

    if let Some(port) = config.metrics_port {
        metrics::init_metrics(port)?;
        info!("Serving Prometheus metrics on port {}", port);
    }

    let queue = JobQueue::from_env().context("failed to create job queue")?;
    let status = Arc::new(RedisStatusStore::from_env().context("failed to create status store")?);
    let store = open_store(StoreConfig::from_env()?)
        .await
        .context("failed to open artifact store")?;

    let ml = MlClient::from_env().context("failed to create ML client")?;
    if !ml.health_check().await.unwrap_or(false) {
        tracing::warn!("ML service at {} is not healthy yet", ml.config().base_url);
    }

    let pipeline = AnalysisPipeline::new(
        Collaborators::production(ml),
        store,
        status,
        config.work_dir.clone(),
    );
    let executor = Arc::new(JobExecutor::new(config, queue, pipeline));

    let signal_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            signal_executor.shutdown();
        }
    });

    executor.run().await?;

    info!("Worker shutdown complete");
    Ok(())
}
