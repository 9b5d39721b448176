//! Relevance scoring of crawled pages against a task query.
//!
//! - [`Bm25Scorer`]: Okapi BM25 over the pages of a single launch
//! - [`Bm25Params`]: `k`/`b` tuning, usually taken from the `[scoring]` config

pub mod bm25;

pub use bm25::{Bm25Params, Bm25Scorer};
