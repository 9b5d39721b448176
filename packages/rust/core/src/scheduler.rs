//! Periodic launches for active tasks.
//!
//! A producer enqueues a [`TaskToProcessMessage`] for every `active` task
//! once per period, skipping tasks still waiting in the queue. A consumer
//! drains up to `consume_batch_size` messages per round and runs their
//! launches concurrently. Both stop when the cancellation token fires.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use topicrawl_shared::{Result, SchedulerConfig, Store, TaskStatus, TaskToProcessMessage};

use crate::launcher::{Launcher, SilentProgress};

/// Sending half of the in-process task queue.
pub type TaskQueue = mpsc::Sender<TaskToProcessMessage>;

/// Capacity of the in-process task queue.
pub const QUEUE_CAPACITY: usize = 1024;

/// Ids the producer has enqueued that no consumer round has taken yet.
pub type QueuedTasks = Mutex<HashSet<i64>>;

pub fn task_queue() -> (TaskQueue, mpsc::Receiver<TaskToProcessMessage>) {
    mpsc::channel(QUEUE_CAPACITY)
}

/// Enqueue every active task that is not already queued. Never waits for
/// queue capacity: a full queue ends the pass. Returns how many were
/// enqueued.
pub async fn produce_active(
    store: &dyn Store,
    queue: &TaskQueue,
    queued: &QueuedTasks,
) -> Result<usize> {
    let tasks = store.find_in_statuses(&[TaskStatus::Active]).await?;
    let mut queued = queued.lock().await;
    let mut produced = 0;
    for task in tasks {
        if queued.contains(&task.id) {
            continue;
        }
        match queue.try_send(TaskToProcessMessage { id: task.id }) {
            Ok(()) => {
                queued.insert(task.id);
                produced += 1;
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(task_id = task.id, "task queue full, retrying next period");
                break;
            }
            Err(mpsc::error::TrySendError::Closed(_)) => break,
        }
    }
    Ok(produced)
}

/// Take one round of up to `batch_size` messages and launch them
/// concurrently. Waits for the first message; returns `None` once the queue
/// is closed or `cancel` fires.
pub async fn consume_round(
    launcher: &Arc<Launcher>,
    queue: &mut mpsc::Receiver<TaskToProcessMessage>,
    queued: &QueuedTasks,
    batch_size: usize,
    cancel: &CancellationToken,
) -> Option<usize> {
    let first = tokio::select! {
        _ = cancel.cancelled() => return None,
        msg = queue.recv() => msg?,
    };

    let mut ids = vec![first.id];
    while ids.len() < batch_size {
        match queue.try_recv() {
            Ok(msg) => ids.push(msg.id),
            Err(_) => break,
        }
    }
    let mut seen = HashSet::new();
    ids.retain(|id| seen.insert(*id));
    {
        let mut queued = queued.lock().await;
        for id in &ids {
            queued.remove(id);
        }
    }

    let mut launches = JoinSet::new();
    for id in &ids {
        let launcher = launcher.clone();
        let cancel = cancel.child_token();
        let id = *id;
        launches.spawn(async move {
            (id, launcher.run_launch(id, &cancel, &SilentProgress).await)
        });
    }

    while let Some(joined) = launches.join_next().await {
        match joined {
            Ok((id, Ok(report))) => {
                debug!(task_id = id, launch = report.number, "scheduled launch done");
            }
            Ok((id, Err(e))) => warn!(task_id = id, error = %e, "scheduled launch failed"),
            Err(e) => warn!(error = %e, "launch task panicked"),
        }
    }

    Some(ids.len())
}

/// Producer and consumer loops for `topicrawl serve`.
pub struct Scheduler {
    store: Arc<dyn Store>,
    launcher: Arc<Launcher>,
    period: Duration,
    batch_size: usize,
    queued: QueuedTasks,
}

impl Scheduler {
    pub fn new(store: Arc<dyn Store>, launcher: Arc<Launcher>, config: &SchedulerConfig) -> Self {
        Self {
            store,
            launcher,
            period: Duration::from_secs(config.period_secs),
            batch_size: config.consume_batch_size.max(1),
            queued: Mutex::new(HashSet::new()),
        }
    }

    /// Run until `cancel` fires. `queue` is the sending half paired with
    /// `receiver`; task commands may hold clones of it.
    pub async fn run(
        &self,
        queue: TaskQueue,
        mut receiver: mpsc::Receiver<TaskToProcessMessage>,
        cancel: CancellationToken,
    ) {
        info!(
            period_secs = self.period.as_secs(),
            batch_size = self.batch_size,
            "scheduler started"
        );

        let producer = async {
            let mut ticker = tokio::time::interval(self.period);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                match produce_active(&*self.store, &queue, &self.queued).await {
                    Ok(n) => debug!(enqueued = n, "active tasks enqueued"),
                    Err(e) => warn!(error = %e, "failed to enqueue active tasks"),
                }
            }
        };

        let consumer = async {
            while consume_round(
                &self.launcher,
                &mut receiver,
                &self.queued,
                self.batch_size,
                &cancel,
            )
            .await
            .is_some()
            {}
        };

        tokio::join!(producer, consumer);
        info!("scheduler stopped");
    }
}
