use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

pub mod s3;
pub mod sigv4;

pub use s3::S3Store;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("object store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid endpoint: {0}")]
    Endpoint(String),
}

/// Durable storage for archived menus.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// All object keys currently in `bucket`.
    async fn list_keys(&self, bucket: &str) -> Result<HashSet<String>, StoreError>;

    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<(), StoreError>;

    /// Public link to an object, used in alerts.
    fn object_url(&self, bucket: &str, key: &str) -> String;
}
