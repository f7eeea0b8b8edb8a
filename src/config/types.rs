use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for url-scout
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub render: RenderConfig,
    pub audit: AuditConfig,
    #[serde(default)]
    pub classifier: Option<ClassifierConfig>,
    #[serde(default)]
    pub urls: UrlsConfig,
}

/// SQLite store location
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub path: String,
}

/// Bounds for traversal-mode discovery and ad-hoc crawls
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum depth to crawl from the start URL
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    /// Maximum number of pages visited per traversal
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_pages: default_max_pages(),
        }
    }
}

/// How a scheduled task discovers URLs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiscoveryMode {
    /// Visit only the task's base URL
    #[default]
    SinglePage,
    /// Breadth-first traversal bounded by `[crawler]`
    Traversal,
}

/// Recurring scheduler settings
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between scans for due tasks
    #[serde(rename = "poll-interval-secs", default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Seconds to back off after a failed scan
    #[serde(rename = "error-backoff-secs", default = "default_error_backoff_secs")]
    pub error_backoff_secs: u64,

    /// Maximum concurrent URL writes per task execution
    #[serde(rename = "persist-concurrency", default = "default_persist_concurrency")]
    pub persist_concurrency: usize,

    /// Seconds to wait for running tasks on shutdown
    #[serde(rename = "shutdown-grace-secs", default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    #[serde(default)]
    pub discovery: DiscoveryMode,
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            error_backoff_secs: default_error_backoff_secs(),
            persist_concurrency: default_persist_concurrency(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            discovery: DiscoveryMode::default(),
        }
    }
}

/// Which renderer backs page discovery
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenderMode {
    /// Remote headless-browser render service, all channels
    #[default]
    Remote,
    /// Direct HTTP fetch and HTML parsing, no browser
    Static,
}

/// Render collaborator settings
#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    #[serde(default)]
    pub mode: RenderMode,

    /// Base URL of the render service (remote mode)
    #[serde(rename = "service-url", default = "default_render_service_url")]
    pub service_url: String,

    /// Page timeout passed to the render service, in milliseconds
    #[serde(rename = "timeout-ms", default = "default_render_timeout_ms")]
    pub timeout_ms: u64,

    /// Load state the render service waits for
    #[serde(rename = "wait-policy", default = "default_wait_policy")]
    pub wait_policy: String,

    /// Client-side timeout of one render call, in seconds
    #[serde(
        rename = "request-timeout-secs",
        default = "default_render_request_timeout_secs"
    )]
    pub request_timeout_secs: u64,

    /// User agent sent by the static renderer
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            mode: RenderMode::default(),
            service_url: default_render_service_url(),
            timeout_ms: default_render_timeout_ms(),
            wait_policy: default_wait_policy(),
            request_timeout_secs: default_render_request_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

/// Audit collaborator settings
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Full URL the audit batch is POSTed to
    pub endpoint: String,

    #[serde(rename = "timeout-secs", default = "default_audit_timeout_secs")]
    pub timeout_secs: u64,
}

/// Semantic (LLM) classifier settings
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    /// Chat-completions endpoint
    pub endpoint: String,

    /// Bearer token
    #[serde(rename = "api-key")]
    pub api_key: String,

    pub model: String,

    #[serde(rename = "timeout-secs", default = "default_classifier_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(rename = "max-retries", default = "default_classifier_max_retries")]
    pub max_retries: u32,
}

/// Stored-URL query settings
#[derive(Debug, Clone, Deserialize)]
pub struct UrlsConfig {
    /// Trailing window for "recent" URL queries, in seconds
    #[serde(rename = "recent-window-secs", default = "default_recent_window_secs")]
    pub recent_window_secs: u64,
}

impl Default for UrlsConfig {
    fn default() -> Self {
        Self {
            recent_window_secs: default_recent_window_secs(),
        }
    }
}

fn default_max_depth() -> u32 {
    3
}

fn default_max_pages() -> usize {
    1000
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_error_backoff_secs() -> u64 {
    30
}

fn default_persist_concurrency() -> usize {
    10
}

fn default_shutdown_grace_secs() -> u64 {
    5
}

fn default_render_service_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_render_timeout_ms() -> u64 {
    30_000
}

fn default_wait_policy() -> String {
    "networkidle".to_string()
}

fn default_render_request_timeout_secs() -> u64 {
    60
}

fn default_user_agent() -> String {
    format!("url-scout/{}", env!("CARGO_PKG_VERSION"))
}

fn default_audit_timeout_secs() -> u64 {
    300
}

fn default_classifier_timeout_secs() -> u64 {
    60
}

fn default_classifier_max_retries() -> u32 {
    3
}

fn default_recent_window_secs() -> u64 {
    300
}
