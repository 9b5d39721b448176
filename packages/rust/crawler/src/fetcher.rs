//! HTTP page fetching and HTML parsing.
//!
//! [`HttpPageFetcher`] turns a URL into a [`Page`]: title, visible body
//! text and the absolute `http`/`https` links found in `a[href]`.

use std::collections::HashSet;
use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use topicrawl_shared::{FetchError, Page, PageFetcher, PageStatus, Result, TopicrawlError};
use tracing::debug;
use url::Url;

/// User-Agent string for crawl requests.
const USER_AGENT: &str = concat!("topicrawl/", env!("CARGO_PKG_VERSION"));

/// Maximum number of redirects followed per page.
const MAX_REDIRECTS: usize = 5;

/// Elements whose text is never part of the page content.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

struct Selectors {
    title: Selector,
    h1: Selector,
    body: Selector,
    links: Selector,
}

impl Selectors {
    fn new() -> Result<Self> {
        Ok(Self {
            title: parse_selector("title")?,
            h1: parse_selector("h1")?,
            body: parse_selector("body")?,
            links: parse_selector("a[href]")?,
        })
    }
}

fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| TopicrawlError::config(format!("invalid selector {css:?}: {e}")))
}

// ---------------------------------------------------------------------------
// HttpPageFetcher
// ---------------------------------------------------------------------------

/// [`PageFetcher`] backed by reqwest and scraper.
pub struct HttpPageFetcher {
    client: Client,
    selectors: Selectors,
    /// Allow localhost/private IPs (integration tests, intranet crawls).
    allow_private_hosts: bool,
}

impl HttpPageFetcher {
    /// Create a fetcher whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(timeout)
            .build()
            .map_err(|e| TopicrawlError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            selectors: Selectors::new()?,
            allow_private_hosts: false,
        })
    }

    /// Allow fetching loopback and private-network hosts.
    pub fn allow_private_hosts(mut self, allow: bool) -> Self {
        self.allow_private_hosts = allow;
        self
    }

    fn parse(&self, url: &str, final_url: &Url, body: &str) -> std::result::Result<Page, FetchError> {
        let doc = Html::parse_document(body);

        let title = first_text(&doc, &self.selectors.title)
            .or_else(|| first_text(&doc, &self.selectors.h1))
            .ok_or_else(|| FetchError::Parse {
                url: url.to_string(),
                message: "page has no title".into(),
            })?;

        let content = doc
            .select(&self.selectors.body)
            .next()
            .map(visible_text)
            .unwrap_or_else(|| visible_text(doc.root_element()));

        let links = extract_links(&doc, &self.selectors.links, final_url);

        Ok(Page {
            url: url.to_string(),
            status: PageStatus::Available,
            title,
            content,
            links,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn get_page(&self, url: &str) -> std::result::Result<Page, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::Parse {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        if !self.allow_private_hosts && is_private_target(&parsed) {
            return Err(FetchError::Blocked {
                url: url.to_string(),
            });
        }

        debug!(%url, "fetching page");

        let transport = |e: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = self.client.get(parsed).send().await.map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Unavailable {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(content_type) = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            if !content_type.to_ascii_lowercase().contains("html") {
                return Err(FetchError::Parse {
                    url: url.to_string(),
                    message: format!("unsupported content type {content_type}"),
                });
            }
        }

        let final_url = response.url().clone();
        // `text()` decodes using the charset from the Content-Type header.
        let body = response.text().await.map_err(transport)?;

        self.parse(url, &final_url, &body)
    }
}

// ---------------------------------------------------------------------------
// HTML helpers
// ---------------------------------------------------------------------------

/// Whitespace-normalised text of the first match, if non-empty.
fn first_text(doc: &Html, selector: &Selector) -> Option<String> {
    doc.select(selector)
        .map(|el| el.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" "))
        .find(|t| !t.is_empty())
}

/// Body text without script/style contents, words joined by single spaces.
fn visible_text(root: ElementRef<'_>) -> String {
    let mut words = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|el| SKIPPED_ELEMENTS.contains(&el.name()))
        });
        if !hidden {
            words.extend(text.split_whitespace());
        }
    }
    words.join(" ")
}

/// Extract `a[href]` links resolved against `base`, normalised and
/// deduplicated in document order.
fn extract_links(doc: &Html, selector: &Selector, base: &Url) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for el in doc.select(selector) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            continue;
        }
        let Some(link) = base.join(href).ok().and_then(normalize) else {
            continue;
        };
        if seen.insert(link.clone()) {
            links.push(link);
        }
    }

    links
}

/// Normalise a raw URL for crawling: `http`/`https` only, fragment stripped.
pub fn normalize_url(raw: &str) -> Option<String> {
    Url::parse(raw.trim()).ok().and_then(normalize)
}

fn normalize(mut url: Url) -> Option<String> {
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url.to_string())
}

// ---------------------------------------------------------------------------
// Private address protection
// ---------------------------------------------------------------------------

/// Check if a URL targets loopback, private or link-local hosts.
fn is_private_target(url: &Url) -> bool {
    match url.host() {
        Some(url::Host::Ipv4(v4)) => is_private_ip(&IpAddr::V4(v4)),
        Some(url::Host::Ipv6(v6)) => is_private_ip(&IpAddr::V6(v6)),
        Some(url::Host::Domain(host)) => {
            host == "localhost" || host.ends_with(".local") || host.ends_with(".internal")
        }
        None => true,
    }
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}
