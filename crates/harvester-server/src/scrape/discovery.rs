//! Document link discovery
//!
//! Fetches a page and extracts candidate document URLs from its anchors.
//! Discovery is deliberately forgiving: a denylisted host or any fetch
//! failure yields an empty candidate list with a log line, never an error.
//! Candidates follow document order and are not deduplicated here; the
//! orchestrator deduplicates and caps downstream.

use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT},
    Client, Url,
};
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{host_matches, DOCUMENT_SUFFIX};

/// Request timeout for page fetches
const PAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Browser-like identity presented to scraped pages
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Hosts treated as search-result pages, where candidate links are wrapped
/// in a redirect URL and carried in a query parameter.
const SEARCH_HOST_MARKERS: &[&str] = &["google."];

/// Extracts candidate document links from web pages
#[derive(Clone)]
pub struct LinkDiscoverer {
    client: Client,
    blocked_hosts: Vec<String>,
}

impl LinkDiscoverer {
    pub fn new(blocked_hosts: Vec<String>) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));

        let client = Client::builder()
            .timeout(PAGE_TIMEOUT)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            blocked_hosts,
        })
    }

    /// Fetch a page and return its candidate document URLs.
    ///
    /// A fresh fetch and parse on every call; the sequence is finite and
    /// follows the document order of the page's anchors.
    pub async fn discover(&self, page_url: &Url) -> Vec<Url> {
        if let Some(host) = page_url.host_str() {
            if host_matches(host, &self.blocked_hosts) {
                info!(url = %page_url, "Skipping link discovery on blocked host");
                return Vec::new();
            }
        }

        let response = match self.client.get(page_url.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %page_url, error = %e, "Failed to fetch page for discovery");
                return Vec::new();
            },
        };

        let response = match response.error_for_status() {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %page_url, error = %e, "Discovery page returned error status");
                return Vec::new();
            },
        };

        let html = match response.text().await {
            Ok(html) => html,
            Err(e) => {
                warn!(url = %page_url, error = %e, "Failed to read discovery page body");
                return Vec::new();
            },
        };

        let candidates = extract_candidates(&html, page_url);
        debug!(
            url = %page_url,
            count = candidates.len(),
            "Extracted candidate document links"
        );

        candidates
    }
}

/// Walk the page's anchors and collect candidate document URLs.
///
/// On search-result hosts the real target is unwrapped from the redirect
/// link's `q` query parameter; elsewhere the href is resolved against the
/// page URL directly. Only http/https candidates whose decoded form contains
/// the document suffix are kept.
fn extract_candidates(html: &str, page_url: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    let link_selector = Selector::parse("a[href]").unwrap();

    let search_host = page_url
        .host_str()
        .map(is_search_host)
        .unwrap_or(false);

    let mut candidates = Vec::new();

    for element in document.select(&link_selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };

        let Ok(resolved) = page_url.join(href) else {
            continue;
        };

        let candidate = if search_host {
            match unwrap_redirect_target(&resolved) {
                Some(target) => target,
                None => continue,
            }
        } else {
            resolved
        };

        if !matches!(candidate.scheme(), "http" | "https") {
            continue;
        }

        if !candidate
            .as_str()
            .to_ascii_lowercase()
            .contains(DOCUMENT_SUFFIX)
        {
            continue;
        }

        candidates.push(candidate);
    }

    candidates
}

fn is_search_host(host: &str) -> bool {
    SEARCH_HOST_MARKERS.iter().any(|marker| host.contains(marker))
}

/// Decode the target of a search-result redirect wrapper (`/url?q=<target>`).
/// Query-pair iteration percent-decodes the value.
fn unwrap_redirect_target(wrapper: &Url) -> Option<Url> {
    let target = wrapper
        .query_pairs()
        .find(|(key, _)| key == "q")
        .map(|(_, value)| value.into_owned())?;

    Url::parse(&target).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_candidates_generic_host() {
        let html = r#"
            <html><body>
                <a href="/papers/first.pdf">First</a>
                <a href="https://cdn.example.org/second.PDF">Second</a>
                <a href="/about.html">About</a>
                <a href="ftp://example.com/third.pdf">FTP</a>
            </body></html>
        "#;
        let page = Url::parse("https://example.com/library").unwrap();

        let candidates = extract_candidates(html, &page);

        assert_eq!(
            candidates,
            vec![
                Url::parse("https://example.com/papers/first.pdf").unwrap(),
                Url::parse("https://cdn.example.org/second.PDF").unwrap(),
            ]
        );
    }

    #[test]
    fn test_extract_candidates_preserves_document_order_and_duplicates() {
        let html = r#"
            <html><body>
                <a href="/a.pdf">A</a>
                <a href="/b.pdf">B</a>
                <a href="/a.pdf">A again</a>
            </body></html>
        "#;
        let page = Url::parse("https://example.com/").unwrap();

        let candidates = extract_candidates(html, &page);

        // No dedup here; the orchestrator deduplicates downstream
        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].path(), "/a.pdf");
        assert_eq!(candidates[1].path(), "/b.pdf");
        assert_eq!(candidates[2].path(), "/a.pdf");
    }

    #[test]
    fn test_extract_candidates_search_host_unwraps_redirects() {
        let html = r#"
            <html><body>
                <a href="/url?q=https://papers.example.org/deep.pdf&sa=U">Result</a>
                <a href="/url?q=https://other.example.org/page.html&sa=U">Not a document</a>
                <a href="/search?q=more+results">More</a>
            </body></html>
        "#;
        let page = Url::parse("https://www.google.com/search?q=filetype%3Apdf+rust").unwrap();

        let candidates = extract_candidates(html, &page);

        assert_eq!(
            candidates,
            vec![Url::parse("https://papers.example.org/deep.pdf").unwrap()]
        );
    }

    #[test]
    fn test_extract_candidates_search_host_percent_decodes_target() {
        let html = r#"
            <a href="/url?q=https%3A%2F%2Fpapers.example.org%2Fencoded.pdf&sa=U">Result</a>
        "#;
        let page = Url::parse("https://www.google.com/search?q=test").unwrap();

        let candidates = extract_candidates(html, &page);

        assert_eq!(
            candidates,
            vec![Url::parse("https://papers.example.org/encoded.pdf").unwrap()]
        );
    }

    #[test]
    fn test_extract_candidates_rejects_non_http_schemes() {
        let html = r#"<a href="mailto:someone@example.com?subject=a.pdf">Mail</a>"#;
        let page = Url::parse("https://example.com/").unwrap();

        assert!(extract_candidates(html, &page).is_empty());
    }

    #[tokio::test]
    async fn test_discover_skips_blocked_host() {
        let discoverer = LinkDiscoverer::new(vec!["twitter.com".to_string()]).unwrap();
        let page = Url::parse("https://twitter.com/some/status").unwrap();

        // No fetch is attempted; the blocked host short-circuits to empty.
        let candidates = discoverer.discover(&page).await;
        assert!(candidates.is_empty());
    }
}
