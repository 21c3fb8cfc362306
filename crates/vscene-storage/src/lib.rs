//! Input artifact storage.
//!
//! An artifact is an uploaded video referenced by an [`ArtifactKey`]. Stores
//! can check for it, materialize it on the local filesystem for the media
//! tools, and delete it once a job is done with it.
//!
//! [`ArtifactKey`]: vscene_models::ArtifactKey

pub mod error;
pub mod local;
pub mod s3;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use local::LocalArtifactStore;
pub use s3::{S3ArtifactStore, S3Config};
pub use store::{open_store, ArtifactStore, StoreConfig};
