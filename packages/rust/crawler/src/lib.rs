//! Page fetching and the bounded crawl engine.
//!
//! This crate provides:
//! - [`fetcher`]: [`HttpPageFetcher`], the reqwest + scraper page fetcher
//! - [`engine`]: [`CrawlEngine`], a fixed worker pool driven by one coordinator

pub mod engine;
pub mod fetcher;

pub use engine::{
    CRAWL_WORKERS, CrawlCounter, CrawlEngine, CrawlRequest, CrawledPage, FETCH_TIMEOUT, PageGraph,
};
pub use fetcher::{HttpPageFetcher, normalize_url};
