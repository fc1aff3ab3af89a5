//! Ingest orchestration
//!
//! Takes a batch of seed URLs and keywords, classifies each seed, and runs
//! the resulting work as independent background units: video ingests go
//! through the resolver ladder, document seeds are fetched directly, and
//! everything else goes through link discovery followed by a capped,
//! concurrency-bounded download fan-out. One seed's failure never touches
//! its siblings; completion is observable through the metadata store.

use futures::stream::{self, StreamExt};
use std::future::Future;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ScrapeConfig;
use crate::db::{Attributes, MetadataStore, NewDocumentRecord};
use crate::storage::{object_name_for, BlobStore};

use super::discovery::LinkDiscoverer;
use super::fetch::FetchEngine;
use super::resolver::MediaResolver;
use super::video::{DownloadOutcome, VideoIngestor};
use super::{host_matches, is_document_url, IngestError, DOCUMENT_MIME, DOCUMENT_SUFFIX};

/// Search endpoint used for keyword seeds
const SEARCH_BASE_URL: &str = "https://www.google.com/search";

/// A scrape request: seed URLs plus search keywords
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScrapeBatch {
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Synchronous answer to a batch submission; the work itself continues in
/// the background.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeStatus {
    pub status: BatchStatus,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Started,
    Error,
}

/// What a seed URL is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeedKind {
    /// Path already carries the document suffix: fetched directly,
    /// discovery skipped
    Document,
    /// Host is on the media allowlist: video ingest
    Video,
    /// Anything else: page discovery, then document fan-out
    Page,
}

fn classify(url: &Url, media_hosts: &[String]) -> SeedKind {
    if is_document_url(url) {
        return SeedKind::Document;
    }
    let video_host = url
        .host_str()
        .map(|host| host_matches(host, media_hosts))
        .unwrap_or(false);
    if video_host {
        SeedKind::Video
    } else {
        SeedKind::Page
    }
}

/// Top-level coordinator for scrape batches
#[derive(Clone)]
pub struct ScrapeOrchestrator {
    discoverer: LinkDiscoverer,
    fetcher: FetchEngine,
    videos: VideoIngestor,
    blobs: Arc<dyn BlobStore>,
    records: Arc<dyn MetadataStore>,
    config: ScrapeConfig,
}

impl ScrapeOrchestrator {
    pub fn new(
        config: ScrapeConfig,
        resolver: Arc<dyn MediaResolver>,
        blobs: Arc<dyn BlobStore>,
        records: Arc<dyn MetadataStore>,
    ) -> anyhow::Result<Self> {
        let discoverer = LinkDiscoverer::new(config.blocked_hosts.clone())?;
        let fetcher = FetchEngine::new(config.spool_dir.clone())?;
        let videos = VideoIngestor::new(
            resolver,
            Arc::clone(&blobs),
            Arc::clone(&records),
            config.spool_dir.clone(),
            Duration::from_secs(config.video_timeout_secs),
        );

        Ok(Self {
            discoverer,
            fetcher,
            videos,
            blobs,
            records,
            config,
        })
    }

    /// Submit a batch. Returns immediately; each seed runs as its own
    /// background unit and failures stay local to the unit.
    pub fn submit(&self, batch: ScrapeBatch) -> ScrapeStatus {
        let mut seeds = Vec::new();
        for raw in &batch.urls {
            match Url::parse(raw) {
                Ok(url) => {
                    let kind = classify(&url, &self.config.media_hosts);
                    seeds.push((url, kind));
                },
                Err(e) => {
                    warn!(url = %raw, error = %e, "Ignoring unparseable seed URL");
                },
            }
        }

        let keywords: Vec<String> = batch
            .keywords
            .iter()
            .map(|kw| kw.trim().to_string())
            .filter(|kw| !kw.is_empty())
            .collect();

        if seeds.is_empty() && keywords.is_empty() {
            return ScrapeStatus {
                status: BatchStatus::Error,
                message: "No URLs or keywords provided".to_string(),
            };
        }

        let mut videos = 0usize;
        let mut documents = 0usize;
        let mut pages = 0usize;

        for (url, kind) in seeds {
            let this = self.clone();
            match kind {
                SeedKind::Video => {
                    videos += 1;
                    tokio::spawn(async move {
                        let outcome = this.videos.ingest(url.to_string()).await;
                        if outcome.success {
                            info!(url = %url, "Video seed complete: {}", outcome.message);
                        } else {
                            warn!(url = %url, "Video seed failed: {}", outcome.message);
                        }
                    });
                },
                SeedKind::Document => {
                    documents += 1;
                    tokio::spawn(async move {
                        this.run_direct_document_unit(url).await;
                    });
                },
                SeedKind::Page => {
                    pages += 1;
                    tokio::spawn(async move {
                        this.run_page_unit(url).await;
                    });
                },
            }
        }

        let keyword_count = keywords.len();
        for keyword in keywords {
            let this = self.clone();
            tokio::spawn(async move {
                this.run_keyword_unit(&keyword).await;
            });
        }

        let mut parts = Vec::new();
        if videos > 0 {
            parts.push(format!("{videos} video(s)"));
        }
        if documents > 0 {
            parts.push(format!("{documents} document(s)"));
        }
        if pages > 0 {
            parts.push(format!("{pages} page(s)"));
        }
        if keyword_count > 0 {
            parts.push(format!("{keyword_count} keyword search(es)"));
        }

        ScrapeStatus {
            status: BatchStatus::Started,
            message: format!("Started scraping: {}", parts.join(", ")),
        }
    }

    /// Synchronous single-video entry point, bounded by the per-video
    /// wall-clock budget.
    pub async fn download_video(&self, url: String) -> DownloadOutcome {
        self.videos.ingest(url).await
    }

    /// A seed whose path already names a document: no discovery, direct
    /// fetch under the per-link budget.
    async fn run_direct_document_unit(&self, url: Url) {
        let budget = Duration::from_secs(self.config.link_timeout_secs);
        self.ingest_link_bounded(url, "direct", budget).await;
    }

    /// Discovery followed by the capped, bounded download fan-out.
    async fn run_page_unit(&self, page_url: Url) {
        let links = self.discoverer.discover(&page_url).await;
        self.ingest_links(links, page_url.as_str()).await;
    }

    /// A keyword becomes a search-engine query URL and flows through the
    /// same discovery path as a page seed.
    async fn run_keyword_unit(&self, keyword: &str) {
        let query = format!(
            "filetype:{} {}",
            DOCUMENT_SUFFIX.trim_start_matches('.'),
            keyword
        );
        let search_url = match Url::parse_with_params(SEARCH_BASE_URL, &[("q", query.as_str())]) {
            Ok(url) => url,
            Err(e) => {
                warn!(keyword = %keyword, error = %e, "Failed to build search URL");
                return;
            },
        };

        info!(keyword = %keyword, url = %search_url, "Searching for documents");
        let links = self.discoverer.discover(&search_url).await;
        self.ingest_links(links, search_url.as_str()).await;
    }

    /// Deduplicate (order-preserving), cap, and download the candidates
    /// under the batch's concurrency bound. Each link gets its own
    /// wall-clock budget layered over the fetch engine's timeouts; one bad
    /// link only costs itself.
    async fn ingest_links(&self, links: Vec<Url>, discovery_source: &str) {
        let discovered = links.len();

        let mut seen = HashSet::new();
        let links: Vec<Url> = links
            .into_iter()
            .filter(|url| seen.insert(url.clone()))
            .take(self.config.max_links_per_page)
            .collect();

        if links.is_empty() {
            debug!(source = %discovery_source, "No candidate document links");
            return;
        }

        info!(
            source = %discovery_source,
            discovered,
            scheduled = links.len(),
            "Scheduling document downloads"
        );

        let budget = Duration::from_secs(self.config.link_timeout_secs);
        let results = run_bounded(links, self.config.download_concurrency, |link| {
            let this = self.clone();
            let source = discovery_source.to_string();
            async move { this.ingest_link_bounded(link, &source, budget).await }
        })
        .await;

        let succeeded = results.iter().filter(|ok| **ok).count();
        info!(
            source = %discovery_source,
            succeeded,
            attempted = results.len(),
            "Document batch complete"
        );
    }

    /// One link, one budget, one logged outcome. Never propagates.
    async fn ingest_link_bounded(&self, link: Url, discovery_source: &str, budget: Duration) -> bool {
        match tokio::time::timeout(budget, self.ingest_document(&link, discovery_source)).await {
            Ok(Ok(record_id)) => {
                info!(url = %link, record_id = %record_id, "Document ingested");
                true
            },
            Ok(Err(e)) => {
                warn!(url = %link, error = %e, "Document ingest failed");
                false
            },
            Err(_) => {
                let e = IngestError::Timeout(budget.as_secs());
                warn!(url = %link, error = %e, "Document ingest timed out");
                false
            },
        }
    }

    /// Fetch, upload, persist one document.
    pub async fn ingest_document(
        &self,
        url: &Url,
        discovery_source: &str,
    ) -> Result<Uuid, IngestError> {
        let doc = self.fetcher.fetch(url).await?;

        let object_name = object_name_for(&doc.filename);
        let upload = self
            .blobs
            .put(&object_name, doc.path(), Some(DOCUMENT_MIME))
            .await
            .map_err(|e| IngestError::StorageUploadFailed(e.to_string()))?;

        let mut attributes = Attributes::new();
        attributes.insert("downloaded".to_string(), json!(true));
        attributes.insert("discovery_source".to_string(), json!(discovery_source));
        attributes.insert("sha256".to_string(), json!(upload.checksum));

        let record = NewDocumentRecord {
            source_url: url.to_string(),
            filename: doc.filename.clone(),
            byte_size: upload.size,
            blob_object_name: object_name,
            attributes,
        };

        self.records
            .upsert_document(record)
            .await
            .map_err(|e| IngestError::Persistence(e.to_string()))
    }
}

/// Run `op` over the items with at most `concurrency` operations in flight
/// at any instant. The whole fan-out is one fresh stream per call, so
/// separate batches never throttle each other.
async fn run_bounded<T, F, Fut, R>(items: Vec<T>, concurrency: usize, op: F) -> Vec<R>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
{
    stream::iter(items)
        .map(op)
        .buffer_unordered(concurrency)
        .collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn media_hosts() -> Vec<String> {
        vec![
            "youtube.com".to_string(),
            "youtu.be".to_string(),
            "vimeo.com".to_string(),
        ]
    }

    #[test]
    fn test_classify_document_by_suffix() {
        let url = Url::parse("https://example.com/paper.pdf").unwrap();
        assert_eq!(classify(&url, &media_hosts()), SeedKind::Document);

        // Suffix beats host: a PDF on a media host is still a document
        let url = Url::parse("https://youtube.com/slides.pdf").unwrap();
        assert_eq!(classify(&url, &media_hosts()), SeedKind::Document);
    }

    #[test]
    fn test_classify_video_by_allowlisted_host() {
        let url = Url::parse("https://www.youtube.com/watch?v=abc").unwrap();
        assert_eq!(classify(&url, &media_hosts()), SeedKind::Video);

        let url = Url::parse("https://youtu.be/abc").unwrap();
        assert_eq!(classify(&url, &media_hosts()), SeedKind::Video);
    }

    #[test]
    fn test_classify_everything_else_is_a_page() {
        let url = Url::parse("https://example.com/library").unwrap();
        assert_eq!(classify(&url, &media_hosts()), SeedKind::Page);

        let url = Url::parse("https://dailymotion.com/video/xyz").unwrap();
        assert_eq!(classify(&url, &media_hosts()), SeedKind::Page);
    }

    #[test]
    fn test_keyword_search_url_is_percent_encoded() {
        let query = format!("filetype:{} {}", "pdf", "rust async");
        let url = Url::parse_with_params(SEARCH_BASE_URL, &[("q", query.as_str())]).unwrap();

        assert_eq!(url.host_str(), Some("www.google.com"));
        assert!(url.as_str().contains("filetype%3Apdf+rust+async")
            || url.as_str().contains("filetype%3Apdf%20rust%20async"));
    }

    #[tokio::test]
    async fn test_run_bounded_never_exceeds_concurrency() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let items: Vec<usize> = (0..10).collect();
        let results = run_bounded(items, 3, |i| {
            let in_flight = Arc::clone(&in_flight);
            let max_seen = Arc::clone(&max_seen);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(30)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                i
            }
        })
        .await;

        assert_eq!(results.len(), 10);
        let max = max_seen.load(Ordering::SeqCst);
        assert!(max <= 3, "saw {max} operations in flight");
        assert_eq!(max, 3, "the bound should actually be reached");
    }
}
