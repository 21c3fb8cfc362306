//! Artifact store backed by an S3-compatible bucket.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use vscene_models::ArtifactKey;

use crate::error::{StorageError, StorageResult};
use crate::store::ArtifactStore;

/// Configuration for the S3 store.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// S3 API endpoint URL
    pub endpoint_url: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket_name: String,
    /// Region ("auto" for R2-style endpoints)
    pub region: String,
}

impl S3Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("S3_ENDPOINT_URL")
                .map_err(|_| StorageError::config_error("S3_ENDPOINT_URL not set"))?,
            access_key_id: std::env::var("S3_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("S3_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("S3_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("S3_SECRET_ACCESS_KEY not set"))?,
            bucket_name: std::env::var("S3_BUCKET_NAME")
                .map_err(|_| StorageError::config_error("S3_BUCKET_NAME not set"))?,
            region: std::env::var("S3_REGION").unwrap_or_else(|_| "auto".to_string()),
        })
    }
}

/// Object-storage artifact store.
#[derive(Clone)]
pub struct S3ArtifactStore {
    client: Client,
    bucket: String,
}

impl S3ArtifactStore {
    pub async fn new(config: S3Config) -> StorageResult<Self> {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "vscene",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket_name,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

fn is_missing(message: &str) -> bool {
    message.contains("NotFound") || message.contains("NoSuchKey")
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    fn backend(&self) -> &'static str {
        "s3"
    }

    async fn exists(&self, key: &ArtifactKey) -> StorageResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let message = e.to_string();
                if is_missing(&message) {
                    Ok(false)
                } else {
                    Err(StorageError::AwsSdk(message))
                }
            }
        }
    }

    async fn fetch(&self, key: &ArtifactKey, work_dir: &Path) -> StorageResult<PathBuf> {
        let dest = work_dir.join(key.file_name());
        debug!("Downloading {} to {}", key, dest.display());

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .send()
            .await
            .map_err(|e| {
                let message = e.to_string();
                if is_missing(&message) {
                    StorageError::not_found(key.as_str())
                } else {
                    StorageError::DownloadFailed(message)
                }
            })?;

        tokio::fs::create_dir_all(work_dir).await?;
        let mut file = tokio::fs::File::create(&dest).await?;
        let mut body = response.body.into_async_read();
        tokio::io::copy(&mut body, &mut file)
            .await
            .map_err(|e| StorageError::DownloadFailed(format!("{}: {}", key, e)))?;
        file.flush().await?;

        info!("Downloaded {} to {}", key, dest.display());
        Ok(dest)
    }

    async fn put_file(&self, path: &Path, key: &ArtifactKey) -> StorageResult<()> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .body(body)
            .content_type("video/mp4")
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;

        info!("Uploaded {} to {}", path.display(), key);
        Ok(())
    }

    async fn delete(&self, key: &ArtifactKey) -> StorageResult<()> {
        // S3 DeleteObject succeeds for absent keys.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .send()
            .await
            .map_err(|e| StorageError::delete_failed(e.to_string()))?;
        info!("Deleted artifact {}", key);
        Ok(())
    }

    async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StorageError::AwsSdk(format!("S3 connectivity check failed: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_detection() {
        assert!(is_missing("service error: NoSuchKey"));
        assert!(is_missing("NotFound"));
        assert!(!is_missing("AccessDenied"));
    }

    #[tokio::test]
    async fn test_client_construction_is_offline() {
        let store = S3ArtifactStore::new(S3Config {
            endpoint_url: "http://127.0.0.1:9000".into(),
            access_key_id: "key".into(),
            secret_access_key: "secret".into(),
            bucket_name: "uploads".into(),
            region: "auto".into(),
        })
        .await
        .unwrap();
        assert_eq!(store.bucket(), "uploads");
        assert_eq!(store.backend(), "s3");
    }
}
