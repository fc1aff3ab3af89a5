//! API request types

use serde::Deserialize;

use crate::scrape::ScrapeBatch;

/// Body of `POST /api/scrape`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScrapeRequest {
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl ScrapeRequest {
    pub fn into_batch(self) -> ScrapeBatch {
        ScrapeBatch {
            urls: self.urls,
            keywords: self.keywords,
        }
    }
}

/// Body of `POST /api/download`
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadRequest {
    pub url: String,
}
