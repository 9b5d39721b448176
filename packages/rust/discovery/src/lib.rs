//! Seed discovery through a SearxNG instance.
//!
//! A crawl starts from the pages a metasearch engine returns for the task
//! query. [`SearxGate`] asks SearxNG for JSON results and keeps the
//! `http`/`https` result URLs, in ranking order and without duplicates.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use topicrawl_shared::{Result, SearchConfig, SearchGate, TopicrawlError};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Maximum number of redirects to follow when querying the search engine.
const MAX_REDIRECTS: usize = 3;

/// User-Agent string for search requests.
const USER_AGENT: &str = concat!("topicrawl/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Response DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    url: String,
}

// ---------------------------------------------------------------------------
// SearxGate
// ---------------------------------------------------------------------------

/// [`SearchGate`] backed by the SearxNG JSON API (`GET /search?q=..&format=json`).
#[derive(Debug, Clone)]
pub struct SearxGate {
    client: Client,
    search_url: Url,
}

impl SearxGate {
    /// Build a gate for the instance at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base = Url::parse(base_url).map_err(|e| {
            TopicrawlError::config(format!("invalid search base_url {base_url:?}: {e}"))
        })?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let search_url = base
            .join("search")
            .map_err(|e| TopicrawlError::config(format!("invalid search base_url: {e}")))?;

        Ok(Self {
            client: build_client(timeout)?,
            search_url,
        })
    }

    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        Self::new(&config.base_url, config.timeout())
    }
}

#[async_trait]
impl SearchGate for SearxGate {
    #[instrument(skip_all, fields(query = %query))]
    async fn search(&self, query: &str) -> Result<Vec<String>> {
        debug!(url = %self.search_url, "querying search engine");

        let response = self
            .client
            .get(self.search_url.clone())
            .query(&[("q", query), ("format", "json")])
            .send()
            .await
            .map_err(|e| search_error(query, format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(search_error(query, format!("HTTP {status}")));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| search_error(query, format!("invalid response body: {e}")))?;

        let urls = seed_urls(body.results.into_iter().map(|r| r.url));
        info!(seeds = urls.len(), "search complete");
        Ok(urls)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a reqwest client with appropriate settings.
fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(timeout)
        .build()
        .map_err(|e| TopicrawlError::Network(format!("failed to build HTTP client: {e}")))
}

fn search_error(query: &str, message: String) -> TopicrawlError {
    warn!(query, error = %message, "search failed");
    TopicrawlError::SearchSystem(message)
}

/// Keep absolute `http`/`https` URLs, first occurrence wins.
fn seed_urls(raw: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .filter(|u| {
            Url::parse(u)
                .map(|parsed| matches!(parsed.scheme(), "http" | "https"))
                .unwrap_or(false)
        })
        .filter(|u| seen.insert(u.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gate(server: &MockServer) -> SearxGate {
        SearxGate::new(&server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn seed_urls_filters_and_dedups() {
        let urls = seed_urls(vec![
            "https://go.dev/".to_string(),
            "ftp://files.example.com/".to_string(),
            "not a url".to_string(),
            "https://go.dev/".to_string(),
            "http://example.com/go".to_string(),
        ]);
        assert_eq!(urls, vec!["https://go.dev/", "http://example.com/go"]);
    }

    #[test]
    fn invalid_base_url_is_config_error() {
        let err = SearxGate::new("::nope", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, TopicrawlError::Config { .. }));
    }

    #[tokio::test]
    async fn search_returns_result_urls() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "go programming"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(search_body()))
            .mount(&server)
            .await;

        let urls = gate(&server).search("go programming").await.unwrap();
        assert_eq!(
            urls,
            vec!["https://go.dev/", "https://en.wikipedia.org/wiki/Go_(programming_language)"]
        );
    }

    #[tokio::test]
    async fn empty_results_are_not_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"results": []}"#))
            .mount(&server)
            .await;

        let urls = gate(&server).search("nothing").await.unwrap();
        assert!(urls.is_empty());
    }

    #[tokio::test]
    async fn server_error_maps_to_search_system() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = gate(&server).search("go").await.unwrap_err();
        assert!(matches!(err, TopicrawlError::SearchSystem(_)));
    }

    #[tokio::test]
    async fn malformed_body_maps_to_search_system() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>captcha</html>"))
            .mount(&server)
            .await;

        let err = gate(&server).search("go").await.unwrap_err();
        assert!(matches!(err, TopicrawlError::SearchSystem(_)));
    }

    fn search_body() -> &'static str {
        r#"{
            "query": "go programming",
            "results": [
                {"url": "https://go.dev/", "title": "The Go Programming Language"},
                {"url": "magnet:?xt=urn:btih:abc", "title": "torrent"},
                {"url": "https://en.wikipedia.org/wiki/Go_(programming_language)"},
                {"title": "no url"}
            ]
        }"#
    }
}
