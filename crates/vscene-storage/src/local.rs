//! Artifact store backed by a local upload directory.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info};
use vscene_models::ArtifactKey;

use crate::error::{StorageError, StorageResult};
use crate::store::ArtifactStore;

/// Keys are relative paths under `root`.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    /// Open the store, creating `root` if needed.
    pub async fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key to its path, refusing anything that escapes `root`.
    pub fn resolve(&self, key: &ArtifactKey) -> StorageResult<PathBuf> {
        let relative = Path::new(key.as_str());
        if key.as_str().is_empty() {
            return Err(StorageError::invalid_key("empty key"));
        }
        if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(StorageError::invalid_key(key.as_str()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    fn backend(&self) -> &'static str {
        "local"
    }

    async fn exists(&self, key: &ArtifactKey) -> StorageResult<bool> {
        let path = self.resolve(key)?;
        Ok(fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false))
    }

    async fn fetch(&self, key: &ArtifactKey, _work_dir: &Path) -> StorageResult<PathBuf> {
        let path = self.resolve(key)?;
        if !self.exists(key).await? {
            return Err(StorageError::not_found(key.as_str()));
        }
        debug!("Artifact {} available at {}", key, path.display());
        Ok(path)
    }

    async fn put_file(&self, path: &Path, key: &ArtifactKey) -> StorageResult<()> {
        let dest = self.resolve(key)?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::copy(path, &dest).await?;
        info!("Stored {} as {}", path.display(), key);
        Ok(())
    }

    async fn delete(&self, key: &ArtifactKey) -> StorageResult<()> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted artifact {}", key);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Artifact {} already absent", key);
                Ok(())
            }
            Err(e) => Err(StorageError::delete_failed(format!("{}: {}", key, e))),
        }
    }

    async fn check_connectivity(&self) -> StorageResult<()> {
        let meta = fs::metadata(&self.root).await?;
        if !meta.is_dir() {
            return Err(StorageError::config_error(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> (tempfile::TempDir, LocalArtifactStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path().join("uploads")).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_put_fetch_delete() {
        let (dir, store) = store().await;
        let src = dir.path().join("clip.mp4");
        fs::write(&src, b"not really a video").await.unwrap();

        let key = ArtifactKey::new("user/clip.mp4");
        assert!(!store.exists(&key).await.unwrap());

        store.put_file(&src, &key).await.unwrap();
        assert!(store.exists(&key).await.unwrap());

        let path = store.fetch(&key, dir.path()).await.unwrap();
        assert_eq!(fs::read(&path).await.unwrap(), b"not really a video");

        store.delete(&key).await.unwrap();
        assert!(!store.exists(&key).await.unwrap());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let (_dir, store) = store().await;
        store.delete(&ArtifactKey::new("never-there.mp4")).await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_missing_is_not_found() {
        let (dir, store) = store().await;
        let err = store
            .fetch(&ArtifactKey::new("missing.mp4"), dir.path())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_escaping_keys_are_rejected() {
        let (_dir, store) = store().await;
        for key in ["../secret.mp4", "/etc/passwd", "a/../../b.mp4", ""] {
            assert!(
                matches!(store.resolve(&ArtifactKey::new(key)), Err(StorageError::InvalidKey(_))),
                "key {key:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_directory_is_not_an_artifact() {
        let (_dir, store) = store().await;
        fs::create_dir_all(store.root().join("nested")).await.unwrap();
        assert!(!store.exists(&ArtifactKey::new("nested")).await.unwrap());
    }
}
