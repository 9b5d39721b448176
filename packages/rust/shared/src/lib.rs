//! Shared types, error model, configuration and collaborator traits for topicrawl.
//!
//! This crate is the foundation depended on by all other topicrawl crates.
//! It provides:
//! - [`TopicrawlError`], the unified error type
//! - Domain types ([`Task`], [`Page`], [`Source`], [`Launch`], [`TaskSourceEdge`])
//! - Configuration ([`AppConfig`], config loading)
//! - Gate and store traits in [`ports`]

pub mod config;
pub mod error;
pub mod ports;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CrawlerConfig, DatabaseConfig, LaunchConfig, SchedulerConfig, ScoringConfig, SearchConfig,
    TaskDefaultsConfig, config_dir, config_file_path, expand_home, init_config, load_config,
    load_config_from, validate_config,
};
pub use error::{Result, TopicrawlError};
pub use ports::{
    FetchError, LaunchStore, PageFetcher, SearchGate, SourceIds, SourceStore, Store,
    TaskEdgeStore, TaskStore,
};
pub use types::{
    ErrorSlug, Launch, LaunchStatus, NewSource, Page, PageStatus, Source, SourceStatus,
    SourceUpdate, Task, TaskFilter, TaskParams, TaskParamsUpdate, TaskSource, TaskSourceEdge,
    TaskStatus, TaskSummary, TaskToProcessMessage,
};
