//! Per-URL video ingest
//!
//! Drives one video from resolution through download, upload, and
//! persistence. The format ladder degrades until an option resolves; an
//! upload failure after a successful download is fatal for the item (no
//! further fallback); a persistence failure still reports the transfer but
//! carries the error distinctly. The whole operation runs on its own task
//! under a hard wall-clock budget; when the budget fires the task is
//! abandoned, never joined, so a wedged resolver cannot stall the caller.

use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::db::{Attributes, MetadataStore, NewMediaRecord};
use crate::storage::{object_name_for, BlobStore};

use super::resolver::{FormatOption, MediaResolver, ProgressEvent, ProgressSink};
use super::IngestError;

/// Outcome of a single video ingest, reported to the caller
#[derive(Debug, Clone, Serialize)]
pub struct DownloadOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<Uuid>,
}

impl DownloadOutcome {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            filename: None,
            record_id: None,
        }
    }
}

/// Runs video ingests against the injected capabilities
#[derive(Clone)]
pub struct VideoIngestor {
    resolver: Arc<dyn MediaResolver>,
    blobs: Arc<dyn BlobStore>,
    records: Arc<dyn MetadataStore>,
    spool_dir: PathBuf,
    budget: Duration,
}

impl VideoIngestor {
    pub fn new(
        resolver: Arc<dyn MediaResolver>,
        blobs: Arc<dyn BlobStore>,
        records: Arc<dyn MetadataStore>,
        spool_dir: PathBuf,
        budget: Duration,
    ) -> Self {
        Self {
            resolver,
            blobs,
            records,
            spool_dir,
            budget,
        }
    }

    /// Ingest one video URL, bounded by the configured wall-clock budget.
    ///
    /// The work runs on a dedicated task. If the budget fires first the
    /// task is left to its fate (detached, reaped at runtime shutdown) and
    /// the caller gets a timeout outcome immediately.
    pub async fn ingest(&self, url: String) -> DownloadOutcome {
        let worker = {
            let resolver = Arc::clone(&self.resolver);
            let blobs = Arc::clone(&self.blobs);
            let records = Arc::clone(&self.records);
            let spool_dir = self.spool_dir.clone();
            let url = url.clone();
            tokio::spawn(async move {
                ingest_inner(resolver, blobs, records, spool_dir, url).await
            })
        };

        match tokio::time::timeout(self.budget, worker).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(join_err)) => {
                error!(url = %url, error = %join_err, "Video ingest worker died");
                DownloadOutcome::failure(format!("video ingest worker failed: {join_err}"))
            },
            Err(_) => {
                warn!(
                    url = %url,
                    budget_secs = self.budget.as_secs(),
                    "Video ingest timed out, abandoning worker"
                );
                let err = IngestError::Timeout(self.budget.as_secs());
                DownloadOutcome::failure(format!("video download {err}"))
            },
        }
    }
}

async fn ingest_inner(
    resolver: Arc<dyn MediaResolver>,
    blobs: Arc<dyn BlobStore>,
    records: Arc<dyn MetadataStore>,
    spool_dir: PathBuf,
    url: String,
) -> DownloadOutcome {
    if let Err(e) = tokio::fs::create_dir_all(&spool_dir).await {
        return DownloadOutcome::failure(format!("failed to prepare spool directory: {e}"));
    }

    // Scoped working directory: the resolver writes exactly one file here,
    // and the directory disappears with this guard.
    let work_dir = match tempfile::Builder::new()
        .prefix("video-")
        .tempdir_in(&spool_dir)
    {
        Ok(dir) => dir,
        Err(e) => {
            return DownloadOutcome::failure(format!("failed to create working directory: {e}"))
        },
    };

    let mut last_error: Option<String> = None;

    for format in FormatOption::DEGRADE_ORDER {
        info!(url = %url, format = format.selector(), "Resolving media");

        let info = match resolver.inspect(&url, format).await {
            Ok(Some(info)) => info,
            Ok(None) => {
                // No extraction info for this option; not a hard failure
                debug!(url = %url, format = format.selector(), "No extraction info, degrading");
                continue;
            },
            Err(e) => {
                warn!(url = %url, format = format.selector(), error = %e, "Resolution failed");
                last_error = Some(e.to_string());
                continue;
            },
        };

        info!(
            url = %url,
            title = %info.title,
            duration = ?info.duration_seconds,
            "Extracted media info"
        );

        let progress: ProgressSink = Arc::new(|event: ProgressEvent| {
            debug!(percent = event.percent, rate = %event.rate, "Downloading media");
        });

        let media = match resolver
            .download(&url, work_dir.path(), format, Some(progress))
            .await
        {
            Ok(media) => media,
            Err(e) => {
                // A failed download degrades to the next option, it never
                // retries the same one
                warn!(url = %url, format = format.selector(), error = %e, "Download failed");
                last_error = Some(e.to_string());
                continue;
            },
        };

        let object_name = object_name_for(&media.filename);
        let upload = match blobs.put(&object_name, &media.path, Some("video/mp4")).await {
            Ok(upload) => upload,
            Err(e) => {
                // The file transferred, so further format fallback would
                // only re-download what we already have; fail the item.
                error!(url = %url, object = %object_name, error = %e, "Upload failed");
                let err = IngestError::StorageUploadFailed(e.to_string());
                return DownloadOutcome::failure(err.to_string());
            },
        };

        let mut attributes = Attributes::new();
        attributes.insert("format_used".to_string(), json!(format.selector()));
        attributes.insert("sha256".to_string(), json!(upload.checksum));
        if let Some(uploader) = &info.uploader {
            attributes.insert("uploader".to_string(), json!(uploader));
        }
        if let Some(upload_date) = &info.upload_date {
            attributes.insert("publish_date".to_string(), json!(upload_date));
        }
        if let Some(source_site) = &info.source_site {
            attributes.insert("source_site".to_string(), json!(source_site));
        }
        if let Some(canonical_url) = &info.canonical_url {
            attributes.insert("canonical_url".to_string(), json!(canonical_url));
        }

        let record = NewMediaRecord {
            source_url: url.clone(),
            title: info.title.clone(),
            duration_seconds: info.duration_seconds,
            filename: media.filename.clone(),
            byte_size: upload.size,
            blob_object_name: object_name,
            attributes,
        };

        return match records.upsert_media(record).await {
            Ok(record_id) => {
                info!(url = %url, record_id = %record_id, "Video ingest complete");
                DownloadOutcome {
                    success: true,
                    message: format!("Successfully downloaded: {}", info.title),
                    filename: Some(media.filename),
                    record_id: Some(record_id),
                }
            },
            Err(e) => {
                // The transfer succeeded; surface the persistence failure
                // distinctly instead of hiding it behind a success message
                error!(url = %url, error = %e, "Metadata persistence failed after upload");
                DownloadOutcome {
                    success: true,
                    message: format!(
                        "Downloaded and stored {}, but metadata persistence failed: {e}",
                        media.filename
                    ),
                    filename: Some(media.filename),
                    record_id: None,
                }
            },
        };
    }

    let exhausted = IngestError::AllFormatsExhausted { url: url.clone() };
    let message = match last_error {
        Some(cause) => format!("{exhausted}, last error: {cause}"),
        None => exhausted.to_string(),
    };
    warn!(url = %url, "{message}");
    DownloadOutcome::failure(message)
}
