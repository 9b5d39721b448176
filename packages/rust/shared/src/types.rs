//! Core domain types: tasks, pages, sources, launches and task↔source edges.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TopicrawlError;

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// Lifecycle state of a crawl task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Created,
    Active,
    InProcessing,
    Stopped,
    StoppedWithError,
    Inactive,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Created => "created",
            TaskStatus::Active => "active",
            TaskStatus::InProcessing => "in_processing",
            TaskStatus::Stopped => "stopped",
            TaskStatus::StoppedWithError => "stopped_with_error",
            TaskStatus::Inactive => "inactive",
        }
    }

    /// Whether a launch may start from this status.
    pub fn is_launchable(&self) -> bool {
        matches!(self, TaskStatus::Created | TaskStatus::Active)
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    ///
    /// Nothing ever moves back to `created`; finished states can only be
    /// re-activated.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        match (self, next) {
            (_, Created) => false,
            (Created, Active | InProcessing | Stopped | Inactive) => true,
            (Active, InProcessing | Stopped | Inactive) => true,
            (InProcessing, Active | StoppedWithError | Stopped | Inactive) => true,
            (Stopped | StoppedWithError | Inactive, Active) => true,
            _ => false,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = TopicrawlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(TaskStatus::Created),
            "active" => Ok(TaskStatus::Active),
            "in_processing" => Ok(TaskStatus::InProcessing),
            "stopped" => Ok(TaskStatus::Stopped),
            "stopped_with_error" => Ok(TaskStatus::StoppedWithError),
            "inactive" => Ok(TaskStatus::Inactive),
            other => Err(TopicrawlError::validation(format!(
                "unknown task status: {other}"
            ))),
        }
    }
}

/// Crawl and selection parameters attached to a task.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaskParams {
    /// Hops followed from each seed (0 = seeds only).
    pub depth_level: u32,
    /// Pages scoring at or below this weight are dropped.
    pub min_weight: f64,
    /// Upper bound on fetched pages and on kept sources.
    pub max_sources: u32,
    /// Per-page cap on links followed.
    pub max_neighbours_per_source: u32,
}

/// Partial update of [`TaskParams`]; `None` keeps the stored value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TaskParamsUpdate {
    pub depth_level: Option<u32>,
    pub min_weight: Option<f64>,
    pub max_sources: Option<u32>,
    pub max_neighbours_per_source: Option<u32>,
}

impl TaskParams {
    /// Apply a partial update on top of these parameters.
    pub fn merged(&self, update: &TaskParamsUpdate) -> TaskParams {
        TaskParams {
            depth_level: update.depth_level.unwrap_or(self.depth_level),
            min_weight: update.min_weight.unwrap_or(self.min_weight),
            max_sources: update.max_sources.unwrap_or(self.max_sources),
            max_neighbours_per_source: update
                .max_neighbours_per_source
                .unwrap_or(self.max_neighbours_per_source),
        }
    }
}

/// A topic crawl task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub query: String,
    pub status: TaskStatus,
    #[serde(flatten)]
    pub params: TaskParams,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// When the task last entered `in_processing`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
}

/// Row of the task listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub id: i64,
    pub query: String,
    pub status: TaskStatus,
    /// Sources attached to the task by its latest launch.
    pub count_sources: i64,
}

/// Listing filter for tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    /// Case-insensitive substring of the query.
    pub query: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Message asking a consumer to run a launch for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskToProcessMessage {
    pub id: i64,
}

// ---------------------------------------------------------------------------
// Page
// ---------------------------------------------------------------------------

/// Fetch outcome of a single page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    Available,
    Unavailable,
}

/// A fetched and parsed page, held only for the duration of one launch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub url: String,
    pub status: PageStatus,
    pub title: String,
    /// Visible body text.
    pub content: String,
    /// Absolute outgoing link URLs in document order.
    pub links: Vec<String>,
}

impl Page {
    /// Placeholder for a page that could not be fetched.
    pub fn unavailable(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: PageStatus::Unavailable,
            title: String::new(),
            content: String::new(),
            links: Vec::new(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == PageStatus::Available
    }
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// Availability of a persisted source as of its last visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Available,
    Unavailable,
}

impl SourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceStatus::Available => "available",
            SourceStatus::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceStatus {
    type Err = TopicrawlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(SourceStatus::Available),
            "unavailable" => Ok(SourceStatus::Unavailable),
            other => Err(TopicrawlError::validation(format!(
                "unknown source status: {other}"
            ))),
        }
    }
}

impl From<PageStatus> for SourceStatus {
    fn from(status: PageStatus) -> Self {
        match status {
            PageStatus::Available => SourceStatus::Available,
            PageStatus::Unavailable => SourceStatus::Unavailable,
        }
    }
}

/// A persisted page record, unique by URL across all tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub status: SourceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A source as attached to a task by a specific launch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSource {
    #[serde(flatten)]
    pub source: Source,
    pub launch_id: i64,
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_source_id: Option<i64>,
}

/// Insert instruction for a source seen for the first time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSource {
    pub url: String,
    pub title: String,
    pub status: SourceStatus,
    pub created_at: DateTime<Utc>,
}

/// Update instruction for a source that already exists.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceUpdate {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub status: SourceStatus,
    pub updated_at: DateTime<Utc>,
}

/// Per-launch record of a source's weight and parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSourceEdge {
    pub task_id: i64,
    pub launch_id: i64,
    pub source_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_source_id: Option<i64>,
    pub weight: f64,
}

// ---------------------------------------------------------------------------
// Launch
// ---------------------------------------------------------------------------

/// State of one crawl execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchStatus {
    InProgress,
    Finished,
    Failed,
}

impl LaunchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LaunchStatus::InProgress => "in_progress",
            LaunchStatus::Finished => "finished",
            LaunchStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for LaunchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LaunchStatus {
    type Err = TopicrawlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(LaunchStatus::InProgress),
            "finished" => Ok(LaunchStatus::Finished),
            "failed" => Ok(LaunchStatus::Failed),
            other => Err(TopicrawlError::validation(format!(
                "unknown launch status: {other}"
            ))),
        }
    }
}

/// Reportable reason a launch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSlug {
    SearchSystemError,
    NoSeedSources,
    LaunchTimeout,
    IntegrityError,
    Unknown,
}

impl ErrorSlug {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSlug::SearchSystemError => "search_system_error",
            ErrorSlug::NoSeedSources => "no_seed_sources",
            ErrorSlug::LaunchTimeout => "launch_timeout",
            ErrorSlug::IntegrityError => "integrity_error",
            ErrorSlug::Unknown => "unknown",
        }
    }

    /// Human-readable message shown next to a failed launch.
    pub fn message(&self) -> &'static str {
        match self {
            ErrorSlug::SearchSystemError => "Search system error, try again later",
            ErrorSlug::NoSeedSources => {
                "No start sources were found for the query, try relaunching"
            }
            ErrorSlug::LaunchTimeout => "The launch took too long and was stopped",
            ErrorSlug::IntegrityError => "Crawl results could not be saved consistently",
            ErrorSlug::Unknown => "Unknown error, try again later",
        }
    }
}

impl fmt::Display for ErrorSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorSlug {
    type Err = TopicrawlError;

    /// Unrecognised slugs read back as [`ErrorSlug::Unknown`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "search_system_error" => ErrorSlug::SearchSystemError,
            "no_seed_sources" => ErrorSlug::NoSeedSources,
            "launch_timeout" => ErrorSlug::LaunchTimeout,
            "integrity_error" => ErrorSlug::IntegrityError,
            _ => ErrorSlug::Unknown,
        })
    }
}

/// One crawl execution of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Launch {
    pub id: i64,
    /// Monotonic per task, starting at 1.
    pub number: i64,
    pub task_id: i64,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub sources_viewed: i64,
    pub status: LaunchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorSlug>,
}
