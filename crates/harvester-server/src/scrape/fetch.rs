//! Streaming document fetch
//!
//! Downloads a single document over HTTP into a scoped spool file. The
//! response must either declare the document mime type or come from a URL
//! carrying the document suffix; anything else is rejected before a byte is
//! written. Spool files are temp files that disappear on drop, so no exit
//! path can leak one.

use futures::StreamExt;
use reqwest::{
    header::{ACCEPT, CONTENT_TYPE},
    redirect, Client, StatusCode, Url,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};

use super::{filename_from_url, is_document_url, DOCUMENT_MIME};

/// Spool write chunk size
pub const FETCH_CHUNK_SIZE: usize = 8 * 1024;

/// Connection establishment budget
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Budget for each read off the response body
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Idle connection pool timeout
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors surfaced by the fetch engine
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("request for {url} failed with status {status}")]
    HttpStatus { status: StatusCode, url: String },

    #[error("content type mismatch for {url}: got {content_type:?}")]
    ContentTypeMismatch {
        url: String,
        content_type: Option<String>,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Handle to a fetched document sitting in the spool.
///
/// The underlying temp file is removed when this handle drops, whether or
/// not the caller got around to uploading it.
#[derive(Debug)]
pub struct FetchedDocument {
    spool: NamedTempFile,
    pub byte_size: u64,
    pub filename: String,
}

impl FetchedDocument {
    /// Path of the spooled bytes, valid for the lifetime of the handle
    pub fn path(&self) -> &Path {
        self.spool.path()
    }
}

/// Streaming HTTP fetcher for documents
#[derive(Clone)]
pub struct FetchEngine {
    client: Client,
    spool_dir: PathBuf,
}

impl FetchEngine {
    pub fn new(spool_dir: PathBuf) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&spool_dir)?;

        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(READ_TIMEOUT)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .redirect(redirect::Policy::limited(10))
            .build()?;

        Ok(Self { client, spool_dir })
    }

    /// Download a document into the spool and return its handle.
    #[instrument(skip(self))]
    pub async fn fetch(&self, url: &Url) -> Result<FetchedDocument, FetchError> {
        self.probe(url).await;

        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, DOCUMENT_MIME)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status,
                url: url.to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let type_ok = content_type
            .as_deref()
            .map(|ct| ct.contains(DOCUMENT_MIME))
            .unwrap_or(false);

        if !type_ok && !is_document_url(url) {
            return Err(FetchError::ContentTypeMismatch {
                url: url.to_string(),
                content_type,
            });
        }

        let spool = tempfile::Builder::new()
            .prefix("harvester-")
            .suffix(".part")
            .tempfile_in(&self.spool_dir)?;

        let file = tokio::fs::File::create(spool.path()).await?;
        let mut writer = BufWriter::with_capacity(FETCH_CHUNK_SIZE, file);

        let mut stream = response.bytes_stream();
        let mut byte_size: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            byte_size += chunk.len() as u64;
            writer.write_all(&chunk).await?;
        }

        writer.flush().await?;

        debug!(url = %url, bytes = byte_size, "Spooled document");

        Ok(FetchedDocument {
            spool,
            byte_size,
            filename: filename_from_url(url),
        })
    }

    /// Best-effort existence/type probe. Failures are logged and ignored;
    /// the full request decides.
    async fn probe(&self, url: &Url) {
        match self.client.head(url.clone()).send().await {
            Ok(response) => {
                debug!(
                    url = %url,
                    status = %response.status(),
                    content_type = ?response
                        .headers()
                        .get(CONTENT_TYPE)
                        .and_then(|value| value.to_str().ok()),
                    "Probe response"
                );
            },
            Err(e) => {
                debug!(url = %url, error = %e, "Probe failed, continuing with full fetch");
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn engine() -> FetchEngine {
        FetchEngine::new(std::env::temp_dir().join("harvester-fetch-tests")).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_streams_pdf_to_spool() {
        let server = MockServer::start().await;
        let body = vec![0x25u8; 20_000]; // larger than one chunk

        Mock::given(method("GET"))
            .and(path("/files/report.pdf"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/pdf")
                    .set_body_bytes(body.clone()),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/files/report.pdf", server.uri())).unwrap();
        let doc = engine().fetch(&url).await.unwrap();

        assert_eq!(doc.byte_size, body.len() as u64);
        assert_eq!(doc.filename, "report.pdf");
        let spooled = std::fs::read(doc.path()).unwrap();
        assert_eq!(spooled, body);
    }

    #[tokio::test]
    async fn test_fetch_accepts_pdf_suffix_without_content_type() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/odd/server.pdf"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/octet-stream")
                    .set_body_bytes(b"%PDF-1.4".to_vec()),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/odd/server.pdf", server.uri())).unwrap();
        let doc = engine().fetch(&url).await.unwrap();
        assert_eq!(doc.byte_size, 8);
    }

    #[tokio::test]
    async fn test_fetch_rejects_html_for_non_pdf_url() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/not-a-document"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<html>nope</html>"),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/not-a-document", server.uri())).unwrap();
        let err = engine().fetch(&url).await.unwrap_err();

        assert!(matches!(err, FetchError::ContentTypeMismatch { .. }));
    }

    #[tokio::test]
    async fn test_fetch_rejects_error_status() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/gone.pdf"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/gone.pdf", server.uri())).unwrap();
        let err = engine().fetch(&url).await.unwrap_err();

        match err {
            FetchError::HttpStatus { status, .. } => assert_eq!(status, StatusCode::NOT_FOUND),
            other => panic!("expected HttpStatus error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_spool_file_removed_on_drop() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/cleanup.pdf"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/pdf")
                    .set_body_bytes(b"%PDF-1.4".to_vec()),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/cleanup.pdf", server.uri())).unwrap();
        let doc = engine().fetch(&url).await.unwrap();
        let spool_path = doc.path().to_path_buf();

        assert!(spool_path.exists());
        drop(doc);
        assert!(!spool_path.exists());
    }
}
