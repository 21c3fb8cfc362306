//! Command-line front end for the analysis service.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use clap::{Args, Parser, Subcommand};
use futures::StreamExt;

use vscene_ml_client::MlClient;
use vscene_models::{AnalysisSettings, ArtifactKey, JobId, JobStatus};
use vscene_queue::{AnalyzeVideoJob, JobQueue, MemoryStatusStore, RedisStatusStore, StatusStore};
use vscene_storage::{open_store, ArtifactStore, LocalArtifactStore, StoreConfig};
use vscene_worker::{
    analysis_settings_from_env, init_tracing, AnalysisPipeline, Collaborators, JobService,
};

/// Scene-timeline analysis from the command line
#[derive(Parser, Debug)]
#[command(name = "vscene-cli")]
#[command(about = "Analyze videos locally or through the job queue")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the whole analysis in-process on a local video
    Analyze {
        /// Video file to analyze
        video: PathBuf,

        #[command(flatten)]
        settings: SettingsArgs,

        /// Write the JSON result here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Queue an already-uploaded artifact for analysis
    Submit {
        /// Artifact key in the upload store
        key: String,

        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// Show a job's status
    Status {
        job_id: String,

        /// Keep printing updates until the job finishes
        #[arg(long, conflicts_with = "history")]
        follow: bool,

        /// Print every recorded event
        #[arg(long)]
        history: bool,
    },
}

/// Overrides on top of the environment's analysis settings.
#[derive(Args, Debug, Default)]
struct SettingsArgs {
    /// Frames sampled per second for captioning
    #[arg(long)]
    fps: Option<f64>,

    /// Caption similarity needed to stay in a scene
    #[arg(long)]
    threshold: Option<f64>,

    /// Dissimilar captions tolerated inside a scene
    #[arg(long)]
    max_gap: Option<u32>,

    /// Seconds between emotion samples
    #[arg(long)]
    emotion_rate: Option<f64>,

    /// Speech model size
    #[arg(long)]
    model: Option<String>,
}

impl SettingsArgs {
    fn apply(self, mut settings: AnalysisSettings) -> AnalysisSettings {
        if let Some(fps) = self.fps {
            settings.frame_fps = fps;
        }
        if let Some(threshold) = self.threshold {
            settings.scene_threshold = threshold;
        }
        if let Some(max_gap) = self.max_gap {
            settings.scene_max_gap = max_gap;
        }
        if let Some(rate) = self.emotion_rate {
            settings.emotion_sample_rate = rate;
        }
        if let Some(model) = self.model {
            settings.whisper_model_size = model;
        }
        settings
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("failed to install rustls crypto provider"))?;
    dotenvy::dotenv().ok();
    init_tracing("vscene=warn");

    match cli.command {
        Command::Analyze {
            video,
            settings,
            out,
        } => analyze(video, settings.apply(analysis_settings_from_env()), out).await,
        Command::Submit { key, settings } => {
            submit(key, settings.apply(analysis_settings_from_env())).await
        }
        Command::Status {
            job_id,
            follow,
            history,
        } => status(JobId::from_string(job_id), follow, history).await,
    }
}

/// Run the whole pipeline in-process on a local file.
///
/// The file is copied into a scratch store first, since a run deletes its
/// input artifact when it ends.
async fn analyze(
    video: PathBuf,
    settings: AnalysisSettings,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    if !video.is_file() {
        bail!("{} is not a file", video.display());
    }

    let scratch = tempfile::tempdir()?;
    let store = Arc::new(LocalArtifactStore::new(scratch.path().join("uploads")).await?);
    let key = ArtifactKey::new(
        video
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input".to_string()),
    );
    store.put_file(&video, &key).await?;

    let status = Arc::new(MemoryStatusStore::new());
    let ml = MlClient::from_env().context("failed to create ML client")?;
    let pipeline = AnalysisPipeline::new(
        Collaborators::production(ml),
        store,
        status.clone(),
        scratch.path().join("work"),
    );

    let job = AnalyzeVideoJob::new(key, settings);
    let outcome = pipeline.run(&job).await;

    for event in status.events(&job.job_id).await? {
        eprintln!("[{:>3}%] {}", event.progress.percent, event.progress.step);
    }
    let result = outcome?;

    let json = serde_json::to_string_pretty(&result)?;
    match out {
        Some(path) => {
            tokio::fs::write(&path, json).await?;
            eprintln!("Wrote {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

async fn submit(key: String, settings: AnalysisSettings) -> anyhow::Result<()> {
    let queue = JobQueue::from_env()?;
    // The consumer group must exist before the first job lands on the stream.
    queue.init().await?;

    let store: Arc<dyn ArtifactStore> = open_store(StoreConfig::from_env()?).await?;
    let status = Arc::new(RedisStatusStore::from_env()?);
    let service = JobService::new(store, status, Arc::new(queue), AnalysisSettings::default());

    let job_id = service
        .submit(ArtifactKey::new(key), Some(settings))
        .await?;
    println!("{}", job_id);
    Ok(())
}

async fn status(job_id: JobId, follow: bool, history: bool) -> anyhow::Result<()> {
    let store = RedisStatusStore::from_env()?;

    if history {
        for event in store.events(&job_id).await? {
            println!("{}", serde_json::to_string(&event)?);
        }
        return Ok(());
    }

    // Subscribe before reading so no event slips in between.
    let mut live = if follow {
        Some(store.subscribe(&job_id).await?)
    } else {
        None
    };

    let current = store
        .latest(&job_id)
        .await?
        .map(|e| e.to_status())
        .unwrap_or(JobStatus::Pending);
    print_status(&current)?;

    if let Some(events) = live.as_mut() {
        if current.is_terminal() {
            return Ok(());
        }
        while let Some(event) = events.next().await {
            let status = event.to_status();
            print_status(&status)?;
            if status.is_terminal() {
                break;
            }
        }
    }
    Ok(())
}

fn print_status(status: &JobStatus) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(status)?);
    Ok(())
}
