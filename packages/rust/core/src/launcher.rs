//! Launch orchestration: crawl → score → reconcile → persist.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use topicrawl_crawler::{CrawlCounter, CrawlEngine, CrawlRequest};
use topicrawl_scoring::Bm25Params;
use topicrawl_shared::{
    ErrorSlug, LaunchStatus, LaunchStore, Result, SourceStore, Store, Task, TaskEdgeStore,
    TaskStatus, TaskStore, TopicrawlError,
};

use crate::reconcile::{
    build_edges, filter_by_weight, merge_source_ids, plan_sources, prune_disconnected,
    score_pages,
};

/// Outcome of one launch.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchReport {
    pub task_id: i64,
    pub launch_id: i64,
    /// Launch number within the task, starting at 1.
    pub number: i64,
    pub status: LaunchStatus,
    pub error: Option<ErrorSlug>,
    /// Pages fetched, available or not.
    pub pages_fetched: usize,
    pub pages_available: usize,
    /// Pages that survived weight filtering and pruning.
    pub sources_kept: usize,
    pub sources_created: usize,
    pub sources_updated: usize,
    pub elapsed: Duration,
}

/// Progress callback for reporting launch status.
pub trait LaunchProgress: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called once the launch has been recorded, successful or not.
    fn done(&self, report: &LaunchReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl LaunchProgress for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _report: &LaunchReport) {}
}

#[derive(Debug, Default)]
struct Counts {
    pages_fetched: usize,
    pages_available: usize,
    sources_kept: usize,
    sources_created: usize,
    sources_updated: usize,
}

/// Runs launches for tasks against a crawl engine and a store.
pub struct Launcher {
    store: Arc<dyn Store>,
    engine: CrawlEngine,
    scoring: Bm25Params,
    timeout: Duration,
}

impl Launcher {
    pub fn new(
        store: Arc<dyn Store>,
        engine: CrawlEngine,
        scoring: Bm25Params,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            engine,
            scoring,
            timeout,
        }
    }

    /// Run one launch for `task_id`.
    ///
    /// The task must be `created` or `active`; anything else fails with
    /// `InvalidTaskState` before a launch is recorded. Once the launch row
    /// exists every failure is recorded on it with its slug, the task moves
    /// to `stopped_with_error`, and the error is returned.
    #[instrument(skip_all, fields(task_id = task_id))]
    pub async fn run_launch(
        &self,
        task_id: i64,
        cancel: &CancellationToken,
        progress: &dyn LaunchProgress,
    ) -> Result<LaunchReport> {
        let started = Instant::now();

        let task = self.store.get_by_id(task_id).await?;
        if !task.status.is_launchable() {
            return Err(TopicrawlError::InvalidTaskState {
                task_id,
                status: task.status,
            });
        }
        let task = self.store.process(task_id, Utc::now()).await?;

        progress.phase("Starting launch");
        let (launch_id, number) = match LaunchStore::create(&*self.store, task_id, Utc::now()).await
        {
            Ok(created) => created,
            Err(e) => {
                self.settle_task(task_id, TaskStatus::StoppedWithError).await;
                return Err(e);
            }
        };
        info!(launch_id, number, query = %task.query, "launch started");

        let mut counts = Counts::default();
        let fetched = CrawlCounter::default();
        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(TopicrawlError::Cancelled),
            timed = tokio::time::timeout(
                self.timeout,
                self.execute(&task, launch_id, cancel, progress, &fetched, &mut counts),
            ) => timed.unwrap_or(Err(TopicrawlError::LaunchTimeout {
                timeout_ms: self.timeout.as_millis() as u64,
            })),
        };
        // Pages recorded before a timeout or cancellation still count as viewed.
        counts.pages_fetched = fetched.get();

        let error = outcome.as_ref().err().map(TopicrawlError::slug);
        let finished = self
            .store
            .finish(launch_id, Utc::now(), counts.pages_fetched as i64, error)
            .await;

        let next = match (&outcome, &finished) {
            (Ok(()), Ok(())) => TaskStatus::Active,
            _ => TaskStatus::StoppedWithError,
        };
        self.settle_task(task_id, next).await;

        let report = LaunchReport {
            task_id,
            launch_id,
            number,
            status: report_status(error, finished.is_ok()),
            error: error.or_else(|| finished.as_ref().err().map(TopicrawlError::slug)),
            pages_fetched: counts.pages_fetched,
            pages_available: counts.pages_available,
            sources_kept: counts.sources_kept,
            sources_created: counts.sources_created,
            sources_updated: counts.sources_updated,
            elapsed: started.elapsed(),
        };
        progress.done(&report);

        match (outcome, finished) {
            (Err(e), _) => {
                warn!(launch_id, slug = ?error, error = %e, "launch failed");
                Err(e)
            }
            (Ok(()), Err(e)) => Err(e),
            (Ok(()), Ok(())) => {
                info!(
                    launch_id,
                    pages = report.pages_fetched,
                    kept = report.sources_kept,
                    created = report.sources_created,
                    updated = report.sources_updated,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "launch finished"
                );
                Ok(report)
            }
        }
    }

    async fn execute(
        &self,
        task: &Task,
        launch_id: i64,
        cancel: &CancellationToken,
        progress: &dyn LaunchProgress,
        fetched: &CrawlCounter,
        counts: &mut Counts,
    ) -> Result<()> {
        progress.phase("Crawling");
        let graph = self
            .engine
            .start_counted(&CrawlRequest::for_task(task), cancel, fetched)
            .await?;
        counts.pages_available = graph.available_count();

        progress.phase("Scoring pages");
        let weights = score_pages(&graph, &task.query, self.scoring);
        let kept = prune_disconnected(
            filter_by_weight(&graph, &weights, task.params.min_weight),
            task.params.max_sources as usize,
        );
        counts.sources_kept = kept.len();

        progress.phase("Saving sources");
        let urls: Vec<String> = graph.iter().map(|p| p.page.url.clone()).collect();
        let existing = self.store.get_by_urls(&urls).await?;
        let plan = plan_sources(&graph, &kept, &existing, Utc::now());

        let (created, updated) = tokio::try_join!(
            SourceStore::create(&*self.store, &plan.to_create),
            SourceStore::update(&*self.store, &plan.to_update),
        )?;
        let ids = merge_source_ids(&plan, created, updated)?;
        counts.sources_created = plan.to_create.len();
        counts.sources_updated = plan.to_update.len();

        let edges = build_edges(task.id, launch_id, &kept, &ids)?;
        TaskEdgeStore::create(&*self.store, &edges).await?;
        Ok(())
    }

    /// Move the task out of `in_processing`. A status changed by someone
    /// else in the meantime (e.g. a stop) is left alone.
    async fn settle_task(&self, task_id: i64, next: TaskStatus) {
        if let Err(e) = self
            .store
            .set_status(task_id, TaskStatus::InProcessing, next, Utc::now())
            .await
        {
            warn!(task_id, to = %next, error = %e, "task status not updated after launch");
        }
    }
}

/// A launch only counts as finished when it succeeded and that outcome was
/// recorded.
fn report_status(error: Option<ErrorSlug>, recorded: bool) -> LaunchStatus {
    if error.is_none() && recorded {
        LaunchStatus::Finished
    } else {
        LaunchStatus::Failed
    }
}
