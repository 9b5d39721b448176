//! Collaborator traits between the orchestration core and its gates/stores.
//!
//! Concrete implementations live in `topicrawl-discovery` (search),
//! `topicrawl-crawler` (page fetching) and `topicrawl-storage` (libSQL).
//! Tests swap them for in-memory fakes.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{
    ErrorSlug, Launch, NewSource, Page, Source, SourceUpdate, Task, TaskFilter, TaskParams,
    TaskSource, TaskSourceEdge, TaskStatus, TaskSummary,
};

/// URL → persisted source id, as returned by source create/update batches.
pub type SourceIds = HashMap<String, i64>;

// ---------------------------------------------------------------------------
// Gates
// ---------------------------------------------------------------------------

/// Finds seed URLs for a query.
#[async_trait]
pub trait SearchGate: Send + Sync {
    /// Seed URLs in ranking order. An empty vector is a valid answer.
    async fn search(&self, query: &str) -> Result<Vec<String>>;
}

/// Why a single page could not be turned into a [`Page`].
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The server answered with a non-success status.
    #[error("{url} answered HTTP {status}")]
    Unavailable { url: String, status: u16 },

    /// Connection, TLS, or body read failure.
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    /// The body could not be turned into a page (e.g. no title).
    #[error("could not parse {url}: {message}")]
    Parse { url: String, message: String },

    /// The URL points at a loopback/private address and was not requested.
    #[error("refusing to fetch private address {url}")]
    Blocked { url: String },
}

/// Fetches and parses one page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn get_page(&self, url: &str) -> std::result::Result<Page, FetchError>;
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Sources whose URL is in `urls`. Unknown URLs are simply absent.
    async fn get_by_urls(&self, urls: &[String]) -> Result<Vec<Source>>;

    /// Insert new sources in one transaction.
    async fn create(&self, sources: &[NewSource]) -> Result<SourceIds>;

    /// Update title/status of existing sources in one transaction.
    async fn update(&self, sources: &[SourceUpdate]) -> Result<SourceIds>;

    /// Sources attached to the task by its latest launch.
    async fn get_by_task_id(&self, task_id: i64) -> Result<Vec<TaskSource>>;
}

#[async_trait]
pub trait LaunchStore: Send + Sync {
    /// Open a new `in_progress` launch. Returns `(id, number)`.
    async fn create(&self, task_id: i64, started_at: DateTime<Utc>) -> Result<(i64, i64)>;

    /// Close a launch: `finished` when `error` is `None`, `failed` otherwise.
    async fn finish(
        &self,
        id: i64,
        finished_at: DateTime<Utc>,
        sources_viewed: i64,
        error: Option<ErrorSlug>,
    ) -> Result<()>;

    async fn get(&self, id: i64) -> Result<Launch>;

    /// Launches of a task, newest first.
    async fn list_by_task(&self, task_id: i64) -> Result<Vec<Launch>>;
}

#[async_trait]
pub trait TaskEdgeStore: Send + Sync {
    async fn create(&self, edges: &[TaskSourceEdge]) -> Result<()>;
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert a task in status `created`.
    async fn create(&self, query: &str, params: &TaskParams, at: DateTime<Utc>) -> Result<Task>;

    async fn get_by_id(&self, id: i64) -> Result<Task>;

    async fn list(&self, filter: &TaskFilter) -> Result<Vec<TaskSummary>>;

    async fn update_params(&self, id: i64, params: &TaskParams, at: DateTime<Utc>)
    -> Result<Task>;

    /// Move a task from `from` to `to`. Fails with `InvalidTransition` when
    /// the stored status is no longer `from`.
    async fn set_status(
        &self,
        id: i64,
        from: TaskStatus,
        to: TaskStatus,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Atomically move a `created`/`active` task to `in_processing`.
    /// Fails with `InvalidTaskState` for any other status.
    async fn process(&self, id: i64, at: DateTime<Utc>) -> Result<Task>;

    async fn find_in_statuses(&self, statuses: &[TaskStatus]) -> Result<Vec<Task>>;
}

/// Every store the launcher and task service need, behind one handle.
pub trait Store: TaskStore + SourceStore + LaunchStore + TaskEdgeStore {}

impl<T> Store for T where T: TaskStore + SourceStore + LaunchStore + TaskEdgeStore {}
