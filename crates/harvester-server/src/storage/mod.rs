//! Blob storage capability
//!
//! S3-compatible object storage scoped to a single bucket. Uploads stream
//! from a local file and return the object name, sha256 checksum, and size;
//! downloads come back as an async byte reader for response streaming.

use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    primitives::ByteStream,
    Client,
};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, instrument};

pub mod config;

pub use config::StorageConfig;

/// Boxed async reader handed back by [`BlobStore::get`]
pub type BlobReader = Pin<Box<dyn AsyncRead + Send>>;

/// Errors surfaced by blob storage
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of a successful upload
#[derive(Debug, Clone)]
pub struct UploadResult {
    pub object_name: String,
    pub checksum: String,
    pub size: i64,
}

/// Bucket-scoped object storage capability.
///
/// Injected into the orchestrator as a trait object; tests substitute an
/// in-memory implementation.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Create the bucket if it does not exist yet. Never recreates or
    /// touches an existing bucket; safe to call on every startup.
    async fn ensure_bucket(&self) -> Result<(), BlobError>;

    /// Upload a local file under the given object name.
    async fn put(
        &self,
        object_name: &str,
        local_path: &Path,
        content_type: Option<&str>,
    ) -> Result<UploadResult, BlobError>;

    /// Stream an object's bytes back.
    async fn get(&self, object_name: &str) -> Result<BlobReader, BlobError>;
}

/// Build the storage object name for an uploaded file:
/// a UTC `YYYYMMDD_HHMMSS` ingestion-timestamp prefix plus the original
/// filename, so repeated ingests of differently-named files never collide.
pub fn object_name_for(filename: &str) -> String {
    format!("{}_{}", Utc::now().format("%Y%m%d_%H%M%S"), filename)
}

/// S3/MinIO-backed blob store
#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

impl S3BlobStore {
    pub fn new(config: StorageConfig) -> Self {
        debug!("Initializing blob storage with config: {:?}", config);

        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "harvester-storage",
        );

        let mut s3_config_builder = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .force_path_style(config.path_style);

        if let Some(endpoint) = &config.endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(s3_config_builder.build());

        info!("Blob storage client initialized for bucket: {}", config.bucket);

        Self {
            client,
            bucket: config.bucket,
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    #[instrument(skip(self))]
    async fn ensure_bucket(&self) -> Result<(), BlobError> {
        match self.client.create_bucket().bucket(&self.bucket).send().await {
            Ok(_) => {
                info!("Created bucket: {}", self.bucket);
                Ok(())
            },
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_bucket_already_owned_by_you()
                    || service_err.is_bucket_already_exists()
                {
                    debug!("Bucket already present: {}", self.bucket);
                    Ok(())
                } else {
                    Err(BlobError::Backend(format!(
                        "failed to ensure bucket {}: {}",
                        self.bucket, service_err
                    )))
                }
            },
        }
    }

    #[instrument(skip(self, local_path))]
    async fn put(
        &self,
        object_name: &str,
        local_path: &Path,
        content_type: Option<&str>,
    ) -> Result<UploadResult, BlobError> {
        let checksum = checksum_file(local_path).await?;
        let size = tokio::fs::metadata(local_path).await?.len() as i64;

        debug!(
            "Uploading {} bytes to s3://{}/{}",
            size, self.bucket, object_name
        );

        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| BlobError::Upload(e.to_string()))?;

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(object_name)
            .content_length(size)
            .body(body);

        if let Some(ct) = content_type {
            request = request.content_type(ct);
        }

        request
            .send()
            .await
            .map_err(|e| BlobError::Upload(e.to_string()))?;

        info!("Successfully uploaded to s3://{}/{}", self.bucket, object_name);

        Ok(UploadResult {
            object_name: object_name.to_string(),
            checksum,
            size,
        })
    }

    #[instrument(skip(self))]
    async fn get(&self, object_name: &str) -> Result<BlobReader, BlobError> {
        debug!("Getting stream from s3://{}/{}", self.bucket, object_name);

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(object_name)
            .send()
            .await
            .map_err(|err| {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    BlobError::NotFound(object_name.to_string())
                } else {
                    BlobError::Backend(service_err.to_string())
                }
            })?;

        Ok(Box::pin(response.body.into_async_read()))
    }
}

/// Sha256 of a file, streamed in 8 KiB reads
async fn checksum_file(path: &Path) -> Result<String, BlobError> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_name_for_keeps_original_filename() {
        let name = object_name_for("report.pdf");
        assert!(name.ends_with("_report.pdf"));

        // Timestamp prefix is YYYYMMDD_HHMMSS
        let prefix = &name[..15];
        assert_eq!(prefix.len(), 15);
        assert_eq!(&prefix[8..9], "_");
        assert!(prefix[..8].chars().all(|c| c.is_ascii_digit()));
        assert!(prefix[9..].chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn test_checksum_file() {
        let dir = std::env::temp_dir();
        let path = dir.join("harvester-checksum-test.bin");
        tokio::fs::write(&path, b"Hello, World!").await.unwrap();

        let checksum = checksum_file(&path).await.unwrap();
        assert_eq!(
            checksum,
            "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f"
        );

        tokio::fs::remove_file(&path).await.ok();
    }
}
