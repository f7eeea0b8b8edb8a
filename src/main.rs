//! url-scout main entry point
//!
//! This is the command-line interface for url-scout: the scheduler daemon
//! plus one-shot management commands over the same store.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use url_scout::audit::HttpAuditor;
use url_scout::classifier::LlmClassifier;
use url_scout::config::load_config_with_hash;
use url_scout::render::build_renderer;
use url_scout::scheduler::{Pipeline, SchedulerSettings};
use url_scout::service::{CrawlAuditRequest, CrawlRequest, ScoutService};
use url_scout::storage::open_store;
use url_scout::task::default_exclude_suffixes;
use url_scout::{Config, NewTask, Scheduler, TaskPatch, TraversalLimits};

/// url-scout: recurring same-origin URL discovery
///
/// url-scout discovers the URLs reachable under an origin by rendering
/// pages and merging every channel a browser can observe, keeps them with
/// first/last-seen freshness, and re-runs discovery per task on a schedule,
/// handing the stored URLs to an audit service.
#[derive(Parser, Debug)]
#[command(name = "url-scout")]
#[command(version = "1.0.0")]
#[command(about = "Recurring same-origin URL discovery", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the scheduler until interrupted
    Serve,

    /// Crawl a site once
    Crawl(CrawlArgs),

    /// Classify URLs by extension, or semantically with --llm
    Classify {
        /// Base URL the URLs were found under
        base_url: String,
        /// URLs to classify
        #[arg(required = true)]
        urls: Vec<String>,
        /// Use the semantic classifier
        #[arg(long)]
        llm: bool,
    },

    /// Discover, store and audit a site once, without a stored task
    Audit(AuditArgs),

    /// Manage recurring tasks
    #[command(subcommand)]
    Task(TaskCommand),

    /// Query stored URLs
    #[command(subcommand)]
    Urls(UrlsCommand),
}

#[derive(Args, Debug)]
struct CrawlArgs {
    /// Start URL
    url: String,
    /// Maximum link depth (default from [crawler])
    #[arg(long)]
    max_depth: Option<u32>,
    /// Maximum pages visited (default from [crawler])
    #[arg(long)]
    max_pages: Option<usize>,
    /// Store the discovered URLs
    #[arg(long)]
    persist: bool,
    #[arg(long)]
    source_type: Option<String>,
    #[arg(long)]
    tags: Option<String>,
    /// Classify the discovered URLs
    #[arg(long)]
    classify: bool,
    /// Classify with the semantic classifier
    #[arg(long, requires = "classify")]
    llm: bool,
}

#[derive(Args, Debug)]
struct AuditArgs {
    /// Start URL
    url: String,
    #[arg(long)]
    source_type: Option<String>,
    #[arg(long)]
    tags: Option<String>,
    /// Depth forwarded to the audit service
    #[arg(long, default_value_t = 1)]
    depth: u32,
    #[arg(long, default_value = "")]
    strategy_type: String,
    #[arg(long, default_value = "")]
    strategy_contents: String,
    /// Path suffix to leave out of the audit (repeatable; default .js and .css)
    #[arg(long = "exclude-suffix")]
    exclude_suffixes: Vec<String>,
    /// Traverse with the [crawler] bounds instead of visiting one page
    #[arg(long)]
    traverse: bool,
}

#[derive(Subcommand, Debug)]
enum TaskCommand {
    /// Create a task
    Create(TaskCreateArgs),
    /// List tasks, newest first
    List {
        #[arg(long, default_value_t = 0)]
        skip: usize,
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
    /// Show one task
    Show { id: i64 },
    /// Change a task's configuration
    Update(TaskUpdateArgs),
    /// Delete a task
    Delete { id: i64 },
    /// Activate a task and make it due now
    Start { id: i64 },
    /// Deactivate a task
    Stop { id: i64 },
    /// Show a task's scheduling state and counters
    Status { id: i64 },
}

#[derive(Args, Debug)]
struct TaskCreateArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    base_url: String,
    #[arg(long)]
    source_type: String,
    /// Seconds between executions
    #[arg(long)]
    interval: u64,
    #[arg(long)]
    tags: Option<String>,
    #[arg(long, default_value_t = 1)]
    depth: u32,
    #[arg(long, default_value = "")]
    strategy_type: String,
    #[arg(long, default_value = "")]
    strategy_contents: String,
    /// Path suffix to leave out of audits (repeatable; default .js and .css)
    #[arg(long = "exclude-suffix")]
    exclude_suffixes: Vec<String>,
    #[arg(long)]
    use_llm: bool,
    /// Execute the new task once before exiting
    #[arg(long)]
    run_now: bool,
}

#[derive(Args, Debug)]
struct TaskUpdateArgs {
    id: i64,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    base_url: Option<String>,
    #[arg(long)]
    source_type: Option<String>,
    #[arg(long, conflicts_with = "clear_tags")]
    tags: Option<String>,
    /// Remove the task's tags
    #[arg(long)]
    clear_tags: bool,
    #[arg(long)]
    depth: Option<u32>,
    #[arg(long)]
    strategy_type: Option<String>,
    #[arg(long)]
    strategy_contents: Option<String>,
    /// Replaces the whole suffix list (repeatable)
    #[arg(long = "exclude-suffix")]
    exclude_suffixes: Vec<String>,
    #[arg(long)]
    interval: Option<u64>,
    #[arg(long)]
    use_llm: Option<bool>,
}

#[derive(Subcommand, Debug)]
enum UrlsCommand {
    /// Every stored URL of a source type
    All { source_type: String },
    /// URLs first and last seen within the recent window
    Recent {
        source_type: String,
        /// Window in seconds (default from [urls])
        #[arg(long)]
        window_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let app = build_app(&config)?;

    match cli.command {
        Command::Serve => handle_serve(app, &config).await,
        Command::Crawl(args) => handle_crawl(&app, &config, args).await,
        Command::Classify {
            base_url,
            urls,
            llm,
        } => print_json(&app.service.classify(&base_url, &urls, llm).await),
        Command::Audit(args) => handle_audit(&app, &config, args).await,
        Command::Task(command) => handle_task(app, command).await,
        Command::Urls(command) => handle_urls(&app, command).await,
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("url_scout=info,warn"),
            1 => EnvFilter::new("url_scout=debug,info"),
            2 => EnvFilter::new("url_scout=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    // Logs go to stderr so command output stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// The wired-up service and its (not yet running) scheduler
struct App {
    service: ScoutService,
    scheduler: Scheduler,
}

fn build_app(config: &Config) -> anyhow::Result<App> {
    let store = Arc::new(
        open_store(Path::new(&config.database.path))
            .with_context(|| format!("failed to open database {}", config.database.path))?,
    );
    let renderer = build_renderer(&config.render).context("failed to build renderer")?;
    let auditor = Arc::new(HttpAuditor::new(&config.audit).context("failed to build audit client")?);

    let pipeline = Pipeline::new(
        store.clone(),
        renderer,
        auditor,
        config.scheduler.persist_concurrency,
    );
    let scheduler = Scheduler::new(
        store.clone(),
        pipeline.clone(),
        SchedulerSettings::from_config(config),
    );

    let mut service = ScoutService::new(store, pipeline)
        .with_recent_window(Duration::from_secs(config.urls.recent_window_secs));
    if let Some(classifier) = &config.classifier {
        let llm = LlmClassifier::new(classifier).context("failed to build classifier client")?;
        service = service.with_semantic_classifier(Arc::new(llm));
    }

    Ok(App { service, scheduler })
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn crawl_limits(config: &Config) -> TraversalLimits {
    TraversalLimits::new(config.crawler.max_depth, config.crawler.max_pages)
}

fn or_default_suffixes(suffixes: Vec<String>) -> Vec<String> {
    if suffixes.is_empty() {
        default_exclude_suffixes()
    } else {
        suffixes
    }
}

/// Runs the scheduler until Ctrl-C, then drains it
async fn handle_serve(app: App, config: &Config) -> anyhow::Result<()> {
    let scheduler = app.scheduler;
    let poll_loop = tokio::spawn({
        let scheduler = scheduler.clone();
        async move { scheduler.run().await }
    });

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    tracing::info!("Interrupt received, shutting down");

    scheduler.shutdown(config.scheduler.shutdown_grace()).await;
    poll_loop.await.context("scheduler loop panicked")?;
    Ok(())
}

async fn handle_crawl(app: &App, config: &Config, args: CrawlArgs) -> anyhow::Result<()> {
    let mut request = CrawlRequest::new(args.url, crawl_limits(config));
    if let Some(max_depth) = args.max_depth {
        request.max_depth = max_depth;
    }
    if let Some(max_pages) = args.max_pages {
        request.max_pages = max_pages;
    }
    request.persist = args.persist;
    request.source_type = args.source_type;
    request.tags = args.tags;
    request.classify = args.classify;
    request.use_llm = args.llm;

    print_json(&app.service.submit_crawl(&request).await?)
}

async fn handle_audit(app: &App, config: &Config, args: AuditArgs) -> anyhow::Result<()> {
    let limits = if args.traverse {
        crawl_limits(config)
    } else {
        TraversalLimits::single_page()
    };
    let request = CrawlAuditRequest {
        base_url: args.url,
        source_type: args.source_type,
        tags: args.tags,
        depth: args.depth,
        strategy_type: args.strategy_type,
        strategy_contents: args.strategy_contents,
        exclude_suffixes: or_default_suffixes(args.exclude_suffixes),
    };

    print_json(&app.service.crawl_and_audit(&request, limits).await?)
}

async fn handle_task(app: App, command: TaskCommand) -> anyhow::Result<()> {
    let service = app.service;

    match command {
        TaskCommand::Create(args) => {
            let run_now = args.run_now;
            let mut task = NewTask::new(args.name, args.base_url, args.source_type, args.interval);
            task.tags = args.tags;
            task.depth = args.depth;
            task.strategy_type = args.strategy_type;
            task.strategy_contents = args.strategy_contents;
            task.exclude_suffixes = or_default_suffixes(args.exclude_suffixes);
            task.use_llm = args.use_llm;

            if run_now {
                // Creation dispatches the first execution; wait for it here
                let service = service.with_scheduler(app.scheduler.clone());
                let created = service.create_task(&task).await?;
                app.scheduler.wait_idle().await;
                print_json(&service.get_task(created.id).await?)
            } else {
                print_json(&service.create_task(&task).await?)
            }
        }
        TaskCommand::List { skip, limit } => print_json(&service.list_tasks(skip, limit).await?),
        TaskCommand::Show { id } => print_json(&service.get_task(id).await?),
        TaskCommand::Update(args) => {
            let patch = TaskPatch {
                task_name: args.name,
                base_url: args.base_url,
                source_type: args.source_type,
                tags: if args.clear_tags {
                    Some(None)
                } else {
                    args.tags.map(Some)
                },
                depth: args.depth,
                strategy_type: args.strategy_type,
                strategy_contents: args.strategy_contents,
                exclude_suffixes: (!args.exclude_suffixes.is_empty())
                    .then_some(args.exclude_suffixes),
                execution_interval_seconds: args.interval,
                use_llm: args.use_llm,
            };
            print_json(&service.update_task(args.id, &patch).await?)
        }
        TaskCommand::Delete { id } => {
            service.delete_task(id).await?;
            println!("Deleted task {}", id);
            Ok(())
        }
        TaskCommand::Start { id } => print_json(&service.start_task(id).await?),
        TaskCommand::Stop { id } => print_json(&service.stop_task(id).await?),
        TaskCommand::Status { id } => print_json(&service.task_status(id).await?),
    }
}

async fn handle_urls(app: &App, command: UrlsCommand) -> anyhow::Result<()> {
    match command {
        UrlsCommand::All { source_type } => {
            print_json(&app.service.urls_for_source_type(&source_type).await?)
        }
        UrlsCommand::Recent {
            source_type,
            window_secs,
        } => {
            let window = window_secs.map(Duration::from_secs);
            print_json(
                &app.service
                    .recent_urls_for_source_type(&source_type, window)
                    .await?,
            )
        }
    }
}
