//! Application configuration for topicrawl.
//!
//! User config lives at `~/.topicrawl/topicrawl.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TopicrawlError};
use crate::types::TaskParams;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "topicrawl.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".topicrawl";

// ---------------------------------------------------------------------------
// Config structs (matching topicrawl.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Search gateway (SearxNG) settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Parameters given to newly created tasks.
    #[serde(default)]
    pub task_defaults: TaskDefaultsConfig,

    /// BM25 tuning.
    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub launch: LaunchConfig,

    /// Periodic launch scheduling used by `topicrawl serve`.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub crawler: CrawlerConfig,
}

/// `[database]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the libSQL database file. A leading `~/` expands to home.
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "~/.topicrawl/topicrawl.db".into()
}

impl DatabaseConfig {
    /// The database path with `~/` expanded.
    pub fn resolved_path(&self) -> Result<PathBuf> {
        expand_home(&self.path)
    }
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Base URL of the SearxNG instance.
    #[serde(default = "default_search_base_url")]
    pub base_url: String,

    /// Request timeout for a single search call.
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: default_search_base_url(),
            timeout_secs: default_search_timeout(),
        }
    }
}

fn default_search_base_url() -> String {
    "http://localhost:8888".into()
}
fn default_search_timeout() -> u64 {
    10
}

impl SearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// `[task_defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDefaultsConfig {
    #[serde(default = "default_depth_level")]
    pub depth_level: u32,

    #[serde(default)]
    pub min_weight: f64,

    #[serde(default = "default_max_sources")]
    pub max_sources: u32,

    #[serde(default = "default_max_neighbours")]
    pub max_neighbours_per_source: u32,
}

impl Default for TaskDefaultsConfig {
    fn default() -> Self {
        Self {
            depth_level: default_depth_level(),
            min_weight: 0.0,
            max_sources: default_max_sources(),
            max_neighbours_per_source: default_max_neighbours(),
        }
    }
}

fn default_depth_level() -> u32 {
    3
}
fn default_max_sources() -> u32 {
    20
}
fn default_max_neighbours() -> u32 {
    20
}

impl From<&TaskDefaultsConfig> for TaskParams {
    fn from(defaults: &TaskDefaultsConfig) -> Self {
        Self {
            depth_level: defaults.depth_level,
            min_weight: defaults.min_weight,
            max_sources: defaults.max_sources,
            max_neighbours_per_source: defaults.max_neighbours_per_source,
        }
    }
}

/// `[scoring]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Term-frequency saturation.
    #[serde(default = "default_bm25_k")]
    pub k: f64,

    /// Length normalisation.
    #[serde(default = "default_bm25_b")]
    pub b: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            k: default_bm25_k(),
            b: default_bm25_b(),
        }
    }
}

fn default_bm25_k() -> f64 {
    1.2
}
fn default_bm25_b() -> f64 {
    0.75
}

/// `[launch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchConfig {
    /// Upper bound on a whole launch, search and storage included.
    #[serde(default = "default_launch_timeout")]
    pub timeout_secs: u64,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_launch_timeout(),
        }
    }
}

fn default_launch_timeout() -> u64 {
    300
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between two rounds of enqueuing active tasks.
    #[serde(default = "default_period")]
    pub period_secs: u64,

    /// Maximum launches run concurrently per consumer round.
    #[serde(default = "default_consume_batch_size")]
    pub consume_batch_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            period_secs: default_period(),
            consume_batch_size: default_consume_batch_size(),
        }
    }
}

fn default_period() -> u64 {
    60
}
fn default_consume_batch_size() -> usize {
    4
}

/// `[crawler]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Follow links to loopback and private-network hosts. Off by default.
    #[serde(default)]
    pub allow_private_hosts: bool,
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.topicrawl/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| TopicrawlError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.topicrawl/topicrawl.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| TopicrawlError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        TopicrawlError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| TopicrawlError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| TopicrawlError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| TopicrawlError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject values the crawler and scheduler cannot work with.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.task_defaults.max_sources == 0 {
        return Err(TopicrawlError::config(
            "task_defaults.max_sources must be at least 1",
        ));
    }
    if config.scheduler.consume_batch_size == 0 {
        return Err(TopicrawlError::config(
            "scheduler.consume_batch_size must be at least 1",
        ));
    }
    if config.scheduler.period_secs == 0 {
        return Err(TopicrawlError::config(
            "scheduler.period_secs must be at least 1",
        ));
    }
    if config.launch.timeout_secs == 0 {
        return Err(TopicrawlError::config(
            "launch.timeout_secs must be at least 1",
        ));
    }
    let k = config.scoring.k;
    if k.is_nan() || k < 0.0 || !(0.0..=1.0).contains(&config.scoring.b) {
        return Err(TopicrawlError::config(
            "scoring.k must be >= 0 and scoring.b within [0, 1]",
        ));
    }
    Ok(())
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| TopicrawlError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(path)),
    }
}
