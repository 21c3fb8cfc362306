//! Artifact store abstraction and backend selection.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use vscene_models::ArtifactKey;

use crate::error::{StorageError, StorageResult};
use crate::local::LocalArtifactStore;
use crate::s3::{S3ArtifactStore, S3Config};

/// Storage holding uploaded input videos.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    async fn exists(&self, key: &ArtifactKey) -> StorageResult<bool>;

    /// Make the artifact readable at a local path.
    ///
    /// Backends that already keep artifacts on the local filesystem return
    /// the stored path; remote backends download into `work_dir`.
    async fn fetch(&self, key: &ArtifactKey, work_dir: &Path) -> StorageResult<PathBuf>;

    /// Store a local file under `key`.
    async fn put_file(&self, path: &Path, key: &ArtifactKey) -> StorageResult<()>;

    /// Remove the artifact. Deleting a missing artifact succeeds.
    async fn delete(&self, key: &ArtifactKey) -> StorageResult<()>;

    async fn check_connectivity(&self) -> StorageResult<()>;
}

/// Which backend to open.
#[derive(Debug, Clone)]
pub enum StoreConfig {
    Local { root: PathBuf },
    S3(S3Config),
}

impl StoreConfig {
    /// Read `ARTIFACT_BACKEND` (`local` or `s3`) and the backend's settings.
    pub fn from_env() -> StorageResult<Self> {
        let backend = std::env::var("ARTIFACT_BACKEND").unwrap_or_else(|_| "local".to_string());
        match backend.as_str() {
            "local" => Ok(StoreConfig::Local {
                root: std::env::var("ARTIFACT_DIR")
                    .unwrap_or_else(|_| "./uploaded_videos".to_string())
                    .into(),
            }),
            "s3" => Ok(StoreConfig::S3(S3Config::from_env()?)),
            other => Err(StorageError::config_error(format!(
                "unknown ARTIFACT_BACKEND '{}', expected 'local' or 's3'",
                other
            ))),
        }
    }
}

pub async fn open_store(config: StoreConfig) -> StorageResult<Arc<dyn ArtifactStore>> {
    let store: Arc<dyn ArtifactStore> = match config {
        StoreConfig::Local { root } => Arc::new(LocalArtifactStore::new(root).await?),
        StoreConfig::S3(config) => Arc::new(S3ArtifactStore::new(config).await?),
    };
    info!("Opened {} artifact store", store.backend());
    Ok(store)
}
