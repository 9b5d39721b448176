//! Task management: creation, parameter updates, activation and reporting.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use topicrawl_shared::{
    Launch, Result, Store, Task, TaskFilter, TaskParams, TaskParamsUpdate, TaskSource,
    TaskStatus, TaskStore, TaskSummary, TaskToProcessMessage, TopicrawlError,
};

use crate::scheduler::TaskQueue;

/// Maximum words in a task query.
pub const MAX_QUERY_WORDS: usize = 10;

/// Maximum characters per query word.
pub const MAX_WORD_LEN: usize = 20;

/// A task together with its launches, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct TaskDetail {
    #[serde(flatten)]
    pub task: Task,
    pub launches: Vec<Launch>,
}

/// Reject empty queries, queries over [`MAX_QUERY_WORDS`] words and words
/// over [`MAX_WORD_LEN`] characters.
pub fn validate_query(query: &str) -> Result<()> {
    let words: Vec<&str> = query.split_whitespace().collect();
    if words.is_empty() {
        return Err(TopicrawlError::validation("query must not be empty"));
    }
    if words.len() > MAX_QUERY_WORDS {
        return Err(TopicrawlError::validation(format!(
            "query has {} words, at most {MAX_QUERY_WORDS} allowed",
            words.len()
        )));
    }
    if let Some(word) = words.iter().find(|w| w.chars().count() > MAX_WORD_LEN) {
        return Err(TopicrawlError::validation(format!(
            "query word {word:?} is longer than {MAX_WORD_LEN} characters"
        )));
    }
    Ok(())
}

pub fn validate_params(params: &TaskParams) -> Result<()> {
    if params.max_sources == 0 {
        return Err(TopicrawlError::validation("max_sources must be at least 1"));
    }
    if !params.min_weight.is_finite() || params.min_weight < 0.0 {
        return Err(TopicrawlError::validation(
            "min_weight must be a non-negative number",
        ));
    }
    Ok(())
}

/// Task operations exposed to the CLI and the scheduler.
pub struct TaskService {
    store: Arc<dyn Store>,
    defaults: TaskParams,
    queue: Option<TaskQueue>,
}

impl TaskService {
    pub fn new(store: Arc<dyn Store>, defaults: TaskParams) -> Self {
        Self {
            store,
            defaults,
            queue: None,
        }
    }

    /// Enqueue created and re-activated tasks for an immediate launch.
    pub fn with_queue(mut self, queue: TaskQueue) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Create a task in `created` with the default parameters, optionally
    /// overridden.
    pub async fn create(&self, query: &str, overrides: &TaskParamsUpdate) -> Result<Task> {
        let query = query.split_whitespace().collect::<Vec<_>>().join(" ");
        validate_query(&query)?;
        let params = self.defaults.merged(overrides);
        validate_params(&params)?;

        let task = TaskStore::create(&*self.store, &query, &params, Utc::now()).await?;
        info!(task_id = task.id, query = %task.query, "task created");
        self.enqueue(task.id);
        Ok(task)
    }

    pub async fn update(&self, id: i64, update: &TaskParamsUpdate) -> Result<Task> {
        let task = self.store.get_by_id(id).await?;
        let params = task.params.merged(update);
        validate_params(&params)?;
        self.store.update_params(id, &params, Utc::now()).await
    }

    /// Move a task to `active`. Already active tasks are left as they are.
    pub async fn activate(&self, id: i64) -> Result<Task> {
        let task = self.store.get_by_id(id).await?;
        match task.status {
            TaskStatus::Active => return Ok(task),
            TaskStatus::InProcessing => {
                return Err(TopicrawlError::InvalidTransition {
                    task_id: id,
                    from: task.status,
                    to: TaskStatus::Active,
                });
            }
            _ => {}
        }

        self.store
            .set_status(id, task.status, TaskStatus::Active, Utc::now())
            .await?;
        info!(task_id = id, from = %task.status, "task activated");
        self.enqueue(id);
        self.store.get_by_id(id).await
    }

    /// Move a task to `stopped`. A launch already running finishes, but the
    /// task keeps the stopped status.
    pub async fn stop(&self, id: i64) -> Result<Task> {
        let task = self.store.get_by_id(id).await?;
        if task.status == TaskStatus::Stopped {
            return Ok(task);
        }

        self.store
            .set_status(id, task.status, TaskStatus::Stopped, Utc::now())
            .await?;
        info!(task_id = id, from = %task.status, "task stopped");
        self.store.get_by_id(id).await
    }

    pub async fn list(&self, filter: &TaskFilter) -> Result<Vec<TaskSummary>> {
        self.store.list(filter).await
    }

    pub async fn show(&self, id: i64) -> Result<TaskDetail> {
        let task = self.store.get_by_id(id).await?;
        let launches = self.store.list_by_task(id).await?;
        Ok(TaskDetail { task, launches })
    }

    /// Sources attached by the task's latest finished launch, heaviest first.
    pub async fn protocol(&self, id: i64) -> Result<Vec<TaskSource>> {
        self.store.get_by_id(id).await?;
        self.store.get_by_task_id(id).await
    }

    fn enqueue(&self, id: i64) {
        let Some(queue) = &self.queue else {
            return;
        };
        if let Err(e) = queue.try_send(TaskToProcessMessage { id }) {
            warn!(task_id = id, error = %e, "task not enqueued, the scheduler will pick it up");
        }
    }
}
