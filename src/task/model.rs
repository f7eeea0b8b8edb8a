use crate::url::normalize;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length of a task name
const MAX_TASK_NAME_LEN: usize = 255;

/// Maximum audit depth accepted for a task
const MAX_TASK_DEPTH: u32 = 100;

/// Longest accepted execution interval (10 years)
const MAX_INTERVAL_SECS: u64 = 10 * 365 * 24 * 3600;

/// Rejections of invalid task fields
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskValidationError {
    #[error("task_name cannot be empty")]
    EmptyName,

    #[error("task_name must be at most 255 characters, got {0}")]
    NameTooLong(usize),

    #[error("base_url must be an absolute http(s) URL, got '{0}'")]
    InvalidBaseUrl(String),

    #[error("source_type cannot be empty")]
    EmptySourceType,

    #[error("depth must be at most 100, got {0}")]
    DepthTooLarge(u32),

    #[error("exclude_suffixes cannot contain blank entries")]
    BlankSuffix,

    #[error("execution_interval_seconds must be greater than 0")]
    ZeroInterval,

    #[error("execution_interval_seconds must be at most 315360000 (10 years), got {0}")]
    IntervalTooLarge(u64),

    #[error("update contains no fields")]
    EmptyPatch,
}

/// A persisted recurring discovery task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryTask {
    pub id: i64,
    pub task_name: String,
    pub base_url: String,
    pub source_type: String,
    pub tags: Option<String>,
    /// Depth forwarded to the audit service
    pub depth: u32,
    pub strategy_type: String,
    pub strategy_contents: String,
    pub exclude_suffixes: Vec<String>,
    pub execution_interval_seconds: u64,
    pub use_llm: bool,
    pub next_execution_time: Option<DateTime<Utc>>,
    pub last_execution_time: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub success_counts: u64,
    pub fail_counts: u64,
    pub create_time: DateTime<Utc>,
}

impl DiscoveryTask {
    /// Next run time one interval after `from`
    pub fn next_run_after(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        from + interval_duration(self.execution_interval_seconds)
    }

    /// Whether the scheduler should pick this task up at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.next_execution_time.map_or(true, |next| next <= now)
    }
}

/// Converts an interval in seconds to a chrono duration, clamped to the
/// longest accepted interval
pub(crate) fn interval_duration(seconds: u64) -> chrono::Duration {
    let clamped = seconds.min(MAX_INTERVAL_SECS) as i64;
    chrono::Duration::seconds(clamped)
}

/// Request to create a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub task_name: String,
    pub base_url: String,
    pub source_type: String,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default = "default_depth")]
    pub depth: u32,
    #[serde(default)]
    pub strategy_type: String,
    #[serde(default)]
    pub strategy_contents: String,
    #[serde(default = "default_exclude_suffixes")]
    pub exclude_suffixes: Vec<String>,
    pub execution_interval_seconds: u64,
    #[serde(default)]
    pub use_llm: bool,
}

fn default_depth() -> u32 {
    1
}

/// Scripts and stylesheets are never worth auditing
pub fn default_exclude_suffixes() -> Vec<String> {
    vec![".js".to_string(), ".css".to_string()]
}

impl NewTask {
    /// Creates a request with every optional field at its default
    pub fn new(
        task_name: impl Into<String>,
        base_url: impl Into<String>,
        source_type: impl Into<String>,
        execution_interval_seconds: u64,
    ) -> Self {
        Self {
            task_name: task_name.into(),
            base_url: base_url.into(),
            source_type: source_type.into(),
            tags: None,
            depth: default_depth(),
            strategy_type: String::new(),
            strategy_contents: String::new(),
            exclude_suffixes: default_exclude_suffixes(),
            execution_interval_seconds,
            use_llm: false,
        }
    }

    /// Checks every field
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        validate_name(&self.task_name)?;
        validate_base_url(&self.base_url)?;
        validate_source_type(&self.source_type)?;
        validate_depth(self.depth)?;
        validate_suffixes(&self.exclude_suffixes)?;
        validate_interval(self.execution_interval_seconds)?;
        Ok(())
    }
}

/// Partial update of a task's configuration
///
/// Only these fields are updatable; scheduling state (timestamps, counters,
/// activation) changes through dedicated operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    pub task_name: Option<String>,
    pub base_url: Option<String>,
    pub source_type: Option<String>,
    /// `Some(None)` clears the tags
    pub tags: Option<Option<String>>,
    pub depth: Option<u32>,
    pub strategy_type: Option<String>,
    pub strategy_contents: Option<String>,
    pub exclude_suffixes: Option<Vec<String>>,
    pub execution_interval_seconds: Option<u64>,
    pub use_llm: Option<bool>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Checks every present field; an empty patch is rejected
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if self.is_empty() {
            return Err(TaskValidationError::EmptyPatch);
        }
        if let Some(name) = &self.task_name {
            validate_name(name)?;
        }
        if let Some(base_url) = &self.base_url {
            validate_base_url(base_url)?;
        }
        if let Some(source_type) = &self.source_type {
            validate_source_type(source_type)?;
        }
        if let Some(depth) = self.depth {
            validate_depth(depth)?;
        }
        if let Some(suffixes) = &self.exclude_suffixes {
            validate_suffixes(suffixes)?;
        }
        if let Some(interval) = self.execution_interval_seconds {
            validate_interval(interval)?;
        }
        Ok(())
    }

    /// Applies the present fields to `task`
    pub fn apply_to(&self, task: &mut DiscoveryTask) {
        if let Some(name) = &self.task_name {
            task.task_name = name.trim().to_string();
        }
        if let Some(base_url) = &self.base_url {
            task.base_url = base_url.trim().to_string();
        }
        if let Some(source_type) = &self.source_type {
            task.source_type = source_type.clone();
        }
        if let Some(tags) = &self.tags {
            task.tags = tags.clone();
        }
        if let Some(depth) = self.depth {
            task.depth = depth;
        }
        if let Some(strategy_type) = &self.strategy_type {
            task.strategy_type = strategy_type.clone();
        }
        if let Some(strategy_contents) = &self.strategy_contents {
            task.strategy_contents = strategy_contents.clone();
        }
        if let Some(suffixes) = &self.exclude_suffixes {
            task.exclude_suffixes = suffixes.clone();
        }
        if let Some(interval) = self.execution_interval_seconds {
            task.execution_interval_seconds = interval;
        }
        if let Some(use_llm) = self.use_llm {
            task.use_llm = use_llm;
        }
    }
}

fn validate_name(name: &str) -> Result<(), TaskValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TaskValidationError::EmptyName);
    }
    let len = name.chars().count();
    if len > MAX_TASK_NAME_LEN {
        return Err(TaskValidationError::NameTooLong(len));
    }
    Ok(())
}

fn validate_base_url(base_url: &str) -> Result<(), TaskValidationError> {
    match normalize(base_url, base_url) {
        Some(_) => Ok(()),
        None => Err(TaskValidationError::InvalidBaseUrl(base_url.to_string())),
    }
}

fn validate_source_type(source_type: &str) -> Result<(), TaskValidationError> {
    if source_type.trim().is_empty() {
        return Err(TaskValidationError::EmptySourceType);
    }
    Ok(())
}

fn validate_depth(depth: u32) -> Result<(), TaskValidationError> {
    if depth > MAX_TASK_DEPTH {
        return Err(TaskValidationError::DepthTooLarge(depth));
    }
    Ok(())
}

fn validate_suffixes(suffixes: &[String]) -> Result<(), TaskValidationError> {
    if suffixes.iter().any(|s| s.trim().is_empty()) {
        return Err(TaskValidationError::BlankSuffix);
    }
    Ok(())
}

fn validate_interval(seconds: u64) -> Result<(), TaskValidationError> {
    if seconds == 0 {
        return Err(TaskValidationError::ZeroInterval);
    }
    if seconds > MAX_INTERVAL_SECS {
        return Err(TaskValidationError::IntervalTooLarge(seconds));
    }
    Ok(())
}
