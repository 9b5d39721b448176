//! Launch orchestration and task management for topicrawl.
//!
//! This crate ties the crawl engine, the BM25 scorer and storage together:
//! - [`launcher`]: one launch, from crawl to persisted sources and edges
//! - [`reconcile`]: pure scoring, pruning and create/update planning
//! - [`tasks`]: task creation, updates and reporting
//! - [`scheduler`]: periodic launches over an in-process queue

pub mod launcher;
pub mod reconcile;
pub mod scheduler;
pub mod tasks;

pub use launcher::{LaunchProgress, LaunchReport, Launcher, SilentProgress};
pub use scheduler::{Scheduler, TaskQueue, task_queue};
pub use tasks::{TaskDetail, TaskService};
