//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::info;

use topicrawl_core::{
    LaunchProgress, LaunchReport, Launcher, Scheduler, TaskDetail, TaskService, task_queue,
};
use topicrawl_crawler::{CrawlEngine, FETCH_TIMEOUT, HttpPageFetcher};
use topicrawl_discovery::SearxGate;
use topicrawl_scoring::Bm25Params;
use topicrawl_shared::{
    AppConfig, Store, TaskFilter, TaskParams, TaskParamsUpdate, TaskSource, TaskStatus,
    TaskSummary, init_config, load_config, load_config_from,
};
use topicrawl_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// topicrawl: topic-directed web crawling.
#[derive(Parser)]
#[command(
    name = "topicrawl",
    version,
    about = "Discover, crawl and rank web pages for a topic query.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.topicrawl/topicrawl.toml).
    #[arg(long, global = true, env = "TOPICRAWL_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Manage crawl tasks.
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },

    /// Run one launch for a task now.
    Launch {
        /// Task ID.
        task_id: i64,
    },

    /// Show the sources found by a task's latest launch.
    Sources {
        /// Task ID.
        task_id: i64,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Run the scheduler: relaunch active tasks periodically until Ctrl-C.
    Serve,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Task subcommands.
#[derive(Subcommand)]
pub(crate) enum TaskAction {
    /// Create a task for a query.
    Create {
        /// Query words (at most 10, each at most 20 characters).
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        #[command(flatten)]
        params: ParamArgs,
    },

    /// List tasks.
    List {
        /// Only tasks in this status.
        #[arg(long)]
        status: Option<String>,

        /// Only tasks whose query contains this text.
        #[arg(long)]
        query: Option<String>,

        #[arg(long)]
        limit: Option<u32>,

        #[arg(long)]
        offset: Option<u32>,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Show a task and its launches.
    Show {
        /// Task ID.
        id: i64,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Change crawl parameters of a task.
    Update {
        /// Task ID.
        id: i64,

        #[command(flatten)]
        params: ParamArgs,
    },

    /// Activate a task so the scheduler relaunches it.
    Activate {
        /// Task ID.
        id: i64,
    },

    /// Stop a task.
    Stop {
        /// Task ID.
        id: i64,
    },
}

/// Optional crawl parameter overrides.
#[derive(Args, Debug, Default)]
pub(crate) struct ParamArgs {
    /// Hops followed from each seed (0 = seeds only).
    #[arg(long)]
    pub depth_level: Option<u32>,

    /// Pages scoring at or below this weight are dropped.
    #[arg(long)]
    pub min_weight: Option<f64>,

    /// Maximum pages fetched and sources kept per launch.
    #[arg(long)]
    pub max_sources: Option<u32>,

    /// Maximum links followed per page.
    #[arg(long)]
    pub max_neighbours: Option<u32>,
}

impl From<&ParamArgs> for TaskParamsUpdate {
    fn from(args: &ParamArgs) -> Self {
        Self {
            depth_level: args.depth_level,
            min_weight: args.min_weight,
            max_sources: args.max_sources,
            max_neighbours_per_source: args.max_neighbours,
        }
    }
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "topicrawl=info",
        1 => "topicrawl=debug",
        _ => "topicrawl=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    if let Command::Config {
        action: ConfigAction::Init,
    } = cli.command
    {
        return cmd_config_init().await;
    }

    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    match cli.command {
        Command::Task { action } => {
            let app = App::open(config).await?;
            match action {
                TaskAction::Create { query, params } => {
                    cmd_task_create(&app, &query.join(" "), &params).await
                }
                TaskAction::List {
                    status,
                    query,
                    limit,
                    offset,
                    json,
                } => {
                    let filter = TaskFilter {
                        status: status.as_deref().map(str::parse::<TaskStatus>).transpose()?,
                        query,
                        limit,
                        offset,
                    };
                    cmd_task_list(&app, &filter, json).await
                }
                TaskAction::Show { id, json } => cmd_task_show(&app, id, json).await,
                TaskAction::Update { id, params } => cmd_task_update(&app, id, &params).await,
                TaskAction::Activate { id } => {
                    let task = app.tasks().activate(id).await?;
                    println!("Task {} is {}", task.id, task.status);
                    Ok(())
                }
                TaskAction::Stop { id } => {
                    let task = app.tasks().stop(id).await?;
                    println!("Task {} is {}", task.id, task.status);
                    Ok(())
                }
            }
        }
        Command::Launch { task_id } => cmd_launch(&App::open(config).await?, task_id).await,
        Command::Sources { task_id, json } => {
            cmd_sources(&App::open(config).await?, task_id, json).await
        }
        Command::Serve => cmd_serve(&App::open(config).await?).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(&config).await,
        },
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// Storage and services built from the resolved config.
struct App {
    config: AppConfig,
    store: Arc<dyn Store>,
}

impl App {
    async fn open(config: AppConfig) -> Result<Self> {
        let path = config.database.resolved_path()?;
        info!(path = %path.display(), "opening database");
        let storage = Storage::open(&path).await?;
        Ok(Self {
            config,
            store: Arc::new(storage),
        })
    }

    fn tasks(&self) -> TaskService {
        TaskService::new(
            self.store.clone(),
            TaskParams::from(&self.config.task_defaults),
        )
    }

    fn launcher(&self) -> Result<Launcher> {
        let search = SearxGate::from_config(&self.config.search)?;
        let fetcher = HttpPageFetcher::new(FETCH_TIMEOUT)?
            .allow_private_hosts(self.config.crawler.allow_private_hosts);
        let engine = CrawlEngine::new(Arc::new(search), Arc::new(fetcher));

        Ok(Launcher::new(
            self.store.clone(),
            engine,
            Bm25Params::from(&self.config.scoring),
            Duration::from_secs(self.config.launch.timeout_secs),
        ))
    }
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_ctrl_c(token: &CancellationToken) {
    let token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, cancelling");
            token.cancel();
        }
    });
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_task_create(app: &App, query: &str, params: &ParamArgs) -> Result<()> {
    let task = app.tasks().create(query, &params.into()).await?;
    println!("Created task {} for {:?}", task.id, task.query);
    println!(
        "  depth {}, min weight {}, max sources {}, max neighbours {}",
        task.params.depth_level,
        task.params.min_weight,
        task.params.max_sources,
        task.params.max_neighbours_per_source
    );
    println!("Run `topicrawl launch {}` to crawl it now.", task.id);
    Ok(())
}

async fn cmd_task_list(app: &App, filter: &TaskFilter, json: bool) -> Result<()> {
    let tasks = app.tasks().list(filter).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&tasks)?);
        return Ok(());
    }
    if tasks.is_empty() {
        println!("No tasks.");
        return Ok(());
    }

    println!("{:>6}  {:<20}  {:>7}  QUERY", "ID", "STATUS", "SOURCES");
    for TaskSummary {
        id,
        query,
        status,
        count_sources,
    } in &tasks
    {
        println!("{id:>6}  {:<20}  {count_sources:>7}  {query}", status.as_str());
    }
    Ok(())
}

async fn cmd_task_show(app: &App, id: i64, json: bool) -> Result<()> {
    let TaskDetail { task, launches } = app.tasks().show(id).await?;
    if json {
        let detail = TaskDetail { task, launches };
        println!("{}", serde_json::to_string_pretty(&detail)?);
        return Ok(());
    }

    println!();
    println!("  Task:       {}", task.id);
    println!("  Query:      {}", task.query);
    println!("  Status:     {}", task.status);
    println!(
        "  Params:     depth {}, min weight {}, max sources {}, max neighbours {}",
        task.params.depth_level,
        task.params.min_weight,
        task.params.max_sources,
        task.params.max_neighbours_per_source
    );
    println!("  Created:    {}", task.created_at.to_rfc3339());
    if let Some(at) = task.processed_at {
        println!("  Processed:  {}", at.to_rfc3339());
    }
    println!();

    if launches.is_empty() {
        println!("  No launches yet.");
    }
    for launch in &launches {
        let outcome = match launch.error {
            Some(slug) => format!("{} ({})", launch.status.as_str(), slug.message()),
            None => launch.status.as_str().to_string(),
        };
        println!(
            "  #{:<4} {}  viewed {:>4}  {outcome}",
            launch.number,
            launch.started_at.format("%Y-%m-%d %H:%M:%S"),
            launch.sources_viewed,
        );
    }
    println!();
    Ok(())
}

async fn cmd_task_update(app: &App, id: i64, params: &ParamArgs) -> Result<()> {
    let update = TaskParamsUpdate::from(params);
    if update == TaskParamsUpdate::default() {
        return Err(eyre!("nothing to update: pass at least one parameter flag"));
    }
    let task = app.tasks().update(id, &update).await?;
    println!(
        "Task {}: depth {}, min weight {}, max sources {}, max neighbours {}",
        task.id,
        task.params.depth_level,
        task.params.min_weight,
        task.params.max_sources,
        task.params.max_neighbours_per_source
    );
    Ok(())
}

async fn cmd_launch(app: &App, task_id: i64) -> Result<()> {
    let launcher = app.launcher()?;
    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(&cancel);

    let reporter = CliProgress::new();
    let outcome = launcher.run_launch(task_id, &cancel, &reporter).await;
    reporter.finish();
    let report = outcome?;

    println!();
    println!("  Launch #{} finished for task {}", report.number, report.task_id);
    println!(
        "  Pages:    {} fetched, {} available",
        report.pages_fetched, report.pages_available
    );
    println!(
        "  Sources:  {} kept ({} new, {} updated)",
        report.sources_kept, report.sources_created, report.sources_updated
    );
    println!("  Time:     {:.1}s", report.elapsed.as_secs_f64());
    println!();
    Ok(())
}

async fn cmd_sources(app: &App, task_id: i64, json: bool) -> Result<()> {
    let sources = app.tasks().protocol(task_id).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&sources)?);
        return Ok(());
    }
    if sources.is_empty() {
        println!("No sources for task {task_id}.");
        return Ok(());
    }

    println!("{:>6}  {:>8}  {:>6}  URL / TITLE", "ID", "WEIGHT", "PARENT");
    for TaskSource {
        source,
        weight,
        parent_source_id,
        ..
    } in &sources
    {
        let parent = parent_source_id.map(|p| p.to_string()).unwrap_or_default();
        println!("{:>6}  {weight:>8.4}  {parent:>6}  {}", source.id, source.url);
        if !source.title.is_empty() {
            println!("{:>26}{}", "", source.title);
        }
    }
    Ok(())
}

async fn cmd_serve(app: &App) -> Result<()> {
    let launcher = Arc::new(app.launcher()?);
    let scheduler = Scheduler::new(app.store.clone(), launcher, &app.config.scheduler);
    let (queue, receiver) = task_queue();

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(&cancel);

    println!("Scheduler running, press Ctrl-C to stop.");
    scheduler.run(queue, receiver, cancel).await;
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl LaunchProgress for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, report: &LaunchReport) {
        self.spinner
            .set_message(format!("Launch #{} recorded", report.number));
    }
}
