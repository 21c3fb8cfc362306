use std::path::Path;
use std::process::Command;

use vscene_media::{check_ffmpeg, check_ffprobe};
use vscene_ml_client::MlClient;
use vscene_queue::JobQueue;
use vscene_storage::{open_store, StoreConfig};
use vscene_worker::WorkerConfig;

/// Usage: `worker-selfcheck [--offline]`
///
/// `--offline` skips the Redis, artifact store and ML service probes.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;
    dotenvy::dotenv().ok();

    let offline = std::env::args().any(|a| a == "--offline");
    let config = WorkerConfig::from_env();
    config.validate()?;

    println!(
        "worker-selfcheck: starting with work_dir={}",
        config.work_dir.display()
    );
    ensure_workdir(&config.work_dir).await?;
    ensure_ffmpeg()?;
    ensure_env_present(&["REDIS_URL"])?;

    if !offline {
        let queue = JobQueue::from_env()?;
        queue
            .check_connectivity()
            .await
            .map_err(|e| anyhow::anyhow!("redis unreachable: {}", e))?;
        // A missing stream reads as length zero.
        let depth = queue.len().await?;
        println!(
            "worker-selfcheck: stream {} holds {} entries",
            queue.config().stream_name,
            depth
        );

        let store = open_store(StoreConfig::from_env()?).await?;
        store
            .check_connectivity()
            .await
            .map_err(|e| anyhow::anyhow!("{} artifact store unreachable: {}", store.backend(), e))?;

        let ml = MlClient::from_env()?;
        if !ml.health_check().await? {
            return Err(anyhow::anyhow!(
                "ML service at {} is not healthy",
                ml.config().base_url
            ));
        }
    }

    println!("worker-selfcheck: ok");
    Ok(())
}

async fn ensure_workdir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    tokio::fs::create_dir_all(path).await?;
    // Scratch directories are created per job; make sure that works here.
    tempfile::tempdir_in(path)
        .map_err(|e| anyhow::anyhow!("work dir {} not writable: {}", path.display(), e))?;
    Ok(())
}

fn ensure_ffmpeg() -> anyhow::Result<()> {
    check_ffmpeg()?;
    check_ffprobe()?;

    let output = Command::new("ffmpeg")
        .arg("-version")
        .output()
        .map_err(|e| anyhow::anyhow!("ffmpeg not available: {}", e))?;

    if !output.status.success() {
        return Err(anyhow::anyhow!(
            "ffmpeg -version failed: {:?}",
            output.status
        ));
    }
    Ok(())
}

fn ensure_env_present(vars: &[&str]) -> anyhow::Result<()> {
    for var in vars {
        if std::env::var(var).is_err() {
            return Err(anyhow::anyhow!("missing required env var {}", var));
        }
    }
    Ok(())
}
