//! Scrape-and-ingest pipeline
//!
//! Turns seed URLs and search keywords into a deduplicated,
//! concurrency-limited stream of fetch-and-store operations:
//!
//! - [`discovery`] extracts candidate document links from a page
//! - [`fetch`] streams a single document to a scoped spool file
//! - [`resolver`] is the external media-extraction capability
//! - [`video`] drives the per-URL video ingest state machine
//! - [`orchestrator`] coordinates classification, scheduling, and bounds

pub mod discovery;
pub mod fetch;
pub mod orchestrator;
pub mod resolver;
pub mod video;

pub use orchestrator::{BatchStatus, ScrapeBatch, ScrapeOrchestrator, ScrapeStatus};
pub use video::{DownloadOutcome, VideoIngestor};

use reqwest::Url;
use thiserror::Error;

/// Suffix identifying document URLs
pub const DOCUMENT_SUFFIX: &str = ".pdf";

/// Mime type accepted for document responses
pub const DOCUMENT_MIME: &str = "application/pdf";

/// Per-item ingest failures.
///
/// Every variant is caught at the item boundary and converted into a logged
/// outcome; none of them aborts a batch.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("network error: {0}")]
    Network(String),

    #[error("content type mismatch: {0}")]
    ContentTypeMismatch(String),

    #[error("all format options exhausted for {url}")]
    AllFormatsExhausted { url: String },

    #[error("storage upload failed: {0}")]
    StorageUploadFailed(String),

    #[error("metadata persistence failed: {0}")]
    Persistence(String),

    #[error("timed out after {0}s")]
    Timeout(u64),
}

impl From<fetch::FetchError> for IngestError {
    fn from(err: fetch::FetchError) -> Self {
        match err {
            fetch::FetchError::ContentTypeMismatch { .. } => {
                IngestError::ContentTypeMismatch(err.to_string())
            },
            other => IngestError::Network(other.to_string()),
        }
    }
}

/// Whether a URL is document-typed: its path ends with the document suffix.
pub fn is_document_url(url: &Url) -> bool {
    url.path().to_ascii_lowercase().ends_with(DOCUMENT_SUFFIX)
}

/// Whether a host matches one of the configured host patterns, either
/// exactly or as a subdomain (`www.youtube.com` matches `youtube.com`).
pub fn host_matches(host: &str, patterns: &[String]) -> bool {
    patterns
        .iter()
        .any(|p| host == p || host.ends_with(&format!(".{p}")))
}

/// Derive the stored filename for a document URL: the last path segment,
/// with the document suffix appended when missing.
pub fn filename_from_url(url: &Url) -> String {
    let basename = url
        .path_segments()
        .and_then(|segments| segments.last().map(|s| s.to_string()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string());

    if basename.to_ascii_lowercase().ends_with(DOCUMENT_SUFFIX) {
        basename
    } else {
        format!("{basename}{DOCUMENT_SUFFIX}")
    }
}
