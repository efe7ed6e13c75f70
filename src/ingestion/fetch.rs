//! Same-site crawling behind the [`SourceFetcher`] capability trait.
//!
//! [`HttpFetcher`] walks pages breadth-first from each seed URL, following
//! only links that stay on a seed host, and returns one [`Document`] per
//! distinct page. A page that fails to download is recorded in the report's
//! failure list and never aborts the rest of the crawl; whether to retry a
//! failed URL is the orchestrator's decision.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

use crate::ingestion::cache::DocumentCache;
use crate::types::RagError;

/// A fetched page: extracted text plus provenance. Immutable once created,
/// consumed by the chunker, never persisted.
#[derive(Clone, Debug)]
pub struct Document {
    pub url: Url,
    /// Link distance from the seed that reached this page.
    pub depth: u32,
    pub fetched_at: DateTime<Utc>,
    pub text: String,
}

impl Document {
    pub fn new(url: Url, depth: u32, text: impl Into<String>) -> Self {
        Self {
            url,
            depth,
            fetched_at: Utc::now(),
            text: text.into(),
        }
    }
}

/// A page that could not be fetched, kept alongside the successes.
#[derive(Clone, Debug)]
pub struct FetchFailure {
    pub url: Url,
    pub message: String,
}

/// Outcome of a crawl: successes and failures side by side.
#[derive(Debug, Default)]
pub struct FetchReport {
    pub documents: Vec<Document>,
    pub failures: Vec<FetchFailure>,
}

impl FetchReport {
    /// `true` when every attempted page failed.
    pub fn is_total_failure(&self) -> bool {
        self.documents.is_empty() && !self.failures.is_empty()
    }
}

/// Capability trait for page retrieval, so crawling can be swapped out in
/// tests or replaced by a hosted scraping service.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Fetches every page reachable from `seeds` within `max_depth` link
    /// hops, one document per distinct page.
    async fn fetch(&self, seeds: &[Url], max_depth: u32) -> Result<FetchReport, RagError>;
}

/// Breadth-first same-site crawler over plain HTTP.
pub struct HttpFetcher {
    client: Client,
    cache: Option<DocumentCache>,
}

impl HttpFetcher {
    /// Builds a fetcher with the given per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, RagError> {
        let client = Client::builder()
            .user_agent(concat!("ragloom/", env!("CARGO_PKG_VERSION")))
            .use_rustls_tls()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            cache: None,
        })
    }

    /// Reuses cached page payloads instead of re-downloading them.
    #[must_use]
    pub fn with_cache(mut self, cache: DocumentCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Fetches one page's raw HTML, consulting the cache first.
    async fn fetch_page(&self, url: &Url) -> Result<String, RagError> {
        if let Some(cache) = &self.cache {
            if let Some(payload) = cache.load(url).await? {
                debug!(%url, "using cached page");
                return Ok(payload);
            }
        }

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|err| RagError::fetch(url, err.to_string()))?
            .error_for_status()
            .map_err(|err| RagError::fetch(url, err.to_string()))?;
        let payload = response
            .text()
            .await
            .map_err(|err| RagError::fetch(url, err.to_string()))?;

        if let Some(cache) = &self.cache {
            cache.store(url, &payload).await?;
        }
        Ok(payload)
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, seeds: &[Url], max_depth: u32) -> Result<FetchReport, RagError> {
        let allowed_hosts: HashSet<String> = seeds
            .iter()
            .filter_map(|url| url.host_str())
            .map(str::to_string)
            .collect();

        let mut report = FetchReport::default();
        let mut visited: HashSet<Url> = HashSet::new();
        let mut queue: VecDeque<(Url, u32)> = VecDeque::new();

        for seed in seeds {
            let seed = strip_fragment(seed);
            if visited.insert(seed.clone()) {
                queue.push_back((seed, 0));
            }
        }

        while let Some((url, depth)) = queue.pop_front() {
            let payload = match self.fetch_page(&url).await {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(%url, error = %err, "page fetch failed");
                    report.failures.push(FetchFailure {
                        url,
                        message: err.to_string(),
                    });
                    continue;
                }
            };

            let (text, links) = scrape_page(&payload, &url)?;
            debug!(%url, depth, chars = text.chars().count(), "page fetched");
            report.documents.push(Document::new(url.clone(), depth, text));

            if depth < max_depth {
                for link in links {
                    let same_site = link
                        .host_str()
                        .is_some_and(|host| allowed_hosts.contains(host));
                    if same_site && visited.insert(link.clone()) {
                        queue.push_back((link, depth + 1));
                    }
                }
            }
        }

        Ok(report)
    }
}

fn strip_fragment(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);
    url
}

/// Parses a page once, returning its readable text and outgoing links.
///
/// Kept synchronous on purpose: `scraper::Html` is not `Send`, so it must
/// never live across an await point.
fn scrape_page(html: &str, base: &Url) -> Result<(String, Vec<Url>), RagError> {
    let document = Html::parse_document(html);
    let text = extract_text(&document)?;
    let links = extract_links(&document, base)?;
    Ok((text, links))
}

const BLOCK_SELECTOR: &str = "h1, h2, h3, h4, h5, h6, p, li, pre, blockquote, td, th";

fn is_block_tag(name: &str) -> bool {
    matches!(
        name,
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "p" | "li" | "pre" | "blockquote" | "td" | "th"
    )
}

/// Collects readable text as paragraph-ish blocks joined by blank lines.
///
/// An element nested inside another matching block (a `p` inside an `li`)
/// is skipped; its text already arrives through the ancestor.
fn extract_text(document: &Html) -> Result<String, RagError> {
    let selector = Selector::parse(BLOCK_SELECTOR)
        .map_err(|err| RagError::InvalidDocument(err.to_string()))?;

    let mut blocks = Vec::new();
    for element in document.select(&selector) {
        let nested = element.ancestors().any(|node| {
            ElementRef::wrap(node).is_some_and(|ancestor| is_block_tag(ancestor.value().name()))
        });
        if nested {
            continue;
        }
        let text = normalize_whitespace(element.text());
        if !text.is_empty() {
            blocks.push(text);
        }
    }

    Ok(blocks.join("\n\n"))
}

/// Resolves, deduplicates, and fragment-strips every `a[href]` on the page.
fn extract_links(document: &Html, base: &Url) -> Result<Vec<Url>, RagError> {
    let selector =
        Selector::parse("a[href]").map_err(|err| RagError::InvalidDocument(err.to_string()))?;

    let mut links = Vec::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if href.starts_with('#') {
            continue;
        }
        let Ok(mut url) = base.join(href) else {
            continue;
        };
        url.set_fragment(None);
        if !matches!(url.scheme(), "http" | "https") {
            continue;
        }
        if !links.contains(&url) {
            links.push(url);
        }
    }

    Ok(links)
}

fn normalize_whitespace<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    let joined: String = parts.collect();
    joined.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_text_skips_scripts_and_nested_blocks() {
        let html = r#"
            <html><head><script>ignored()</script></head><body>
                <h1>Title</h1>
                <p>First paragraph.</p>
                <ul><li>Item with <p>inner paragraph</p></li></ul>
                <style>.ignored {}</style>
            </body></html>
        "#;
        let document = Html::parse_document(html);
        let text = extract_text(&document).unwrap();
        assert_eq!(text, "Title\n\nFirst paragraph.\n\nItem with inner paragraph");
    }

    #[test]
    fn extract_links_resolves_and_deduplicates() {
        let base = Url::parse("https://example.com/docs/").unwrap();
        let html = r##"
            <body>
                <a href="intro">Intro</a>
                <a href="/docs/intro#section">Intro again</a>
                <a href="https://other.org/page">External</a>
                <a href="#top">Anchor</a>
                <a href="mailto:team@example.com">Mail</a>
            </body>
        "##;
        let document = Html::parse_document(html);
        let links = extract_links(&document, &base).unwrap();
        assert_eq!(
            links,
            vec![
                Url::parse("https://example.com/docs/intro").unwrap(),
                Url::parse("https://other.org/page").unwrap(),
            ]
        );
    }

    #[test]
    fn report_total_failure_requires_at_least_one_failure() {
        let report = FetchReport::default();
        assert!(!report.is_total_failure());

        let report = FetchReport {
            documents: vec![],
            failures: vec![FetchFailure {
                url: Url::parse("https://example.com").unwrap(),
                message: "boom".to_string(),
            }],
        };
        assert!(report.is_total_failure());
    }
}
