//! Storage traits and error types
//!
//! This module defines the trait interfaces consumed by the scheduler and the
//! management service, and their error type.

use crate::discovery::TraversalLimits;
use crate::storage::{CrawlRun, CrawlRunStatus, StoredUrl, UrlRecord};
use crate::task::{DiscoveryTask, NewTask, TaskPatch};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Task not found: {0}")]
    TaskNotFound(i64),

    #[error("Task name already exists: {0}")]
    DuplicateTaskName(String),

    #[error("Crawl run not found: {0}")]
    CrawlRunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persisted schedule records
///
/// Implementations must be safe to share across tasks; every method takes
/// `&self`.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Inserts a task created at `now`
    ///
    /// The task starts active with zero counters and its first scheduled run
    /// one interval after `now`.
    ///
    /// # Errors
    ///
    /// * `StorageError::DuplicateTaskName` - Another task has the same name
    async fn create_task(&self, task: &NewTask, now: DateTime<Utc>) -> StorageResult<DiscoveryTask>;

    /// Gets a task by ID, `TaskNotFound` if absent
    async fn get_task(&self, id: i64) -> StorageResult<DiscoveryTask>;

    /// Lists tasks newest first
    async fn list_tasks(&self, skip: usize, limit: usize) -> StorageResult<Vec<DiscoveryTask>>;

    /// Applies a validated patch and returns the updated task
    ///
    /// # Errors
    ///
    /// * `StorageError::TaskNotFound` - Unknown ID
    /// * `StorageError::DuplicateTaskName` - The new name belongs to another task
    async fn update_task(&self, id: i64, patch: &TaskPatch) -> StorageResult<DiscoveryTask>;

    /// Deletes a task, `TaskNotFound` if absent
    async fn delete_task(&self, id: i64) -> StorageResult<()>;

    /// Sets the activation flag, and the next run time when given
    async fn set_active(
        &self,
        id: i64,
        is_active: bool,
        next_execution_time: Option<DateTime<Utc>>,
    ) -> StorageResult<()>;

    /// Active tasks with no next run time or one at or before `now`
    async fn due_tasks(&self, now: DateTime<Utc>) -> StorageResult<Vec<DiscoveryTask>>;

    /// Records the start of an execution
    async fn touch_last_execution(&self, id: i64, at: DateTime<Utc>) -> StorageResult<()>;

    /// Adds audit counts and sets the next run time
    async fn record_execution(
        &self,
        id: i64,
        success_count: u64,
        fail_count: u64,
        next_execution_time: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// Sets only the next run time
    async fn reschedule(&self, id: i64, next_execution_time: DateTime<Utc>) -> StorageResult<()>;
}

/// Discovered-URL records and ad-hoc crawl runs
#[async_trait]
pub trait UrlStore: Send + Sync {
    /// Inserts the URL if `(origin, url)` is new, then touches `last_seen_at`
    ///
    /// Idempotent: repeated calls leave one row whose `last_seen_at` never
    /// moves backwards. Descriptive columns keep their first-seen values.
    async fn upsert_url(&self, record: &UrlRecord) -> StorageResult<()>;

    /// Gets one stored URL
    async fn get_url(&self, origin: &str, url: &str) -> StorageResult<Option<StoredUrl>>;

    /// All URLs of a source type, oldest first
    async fn urls_for_source_type(&self, source_type: &str) -> StorageResult<Vec<StoredUrl>>;

    /// URLs of a source type whose `last_seen_at - first_seen_at` is within
    /// `window`
    async fn recent_urls_for_source_type(
        &self,
        source_type: &str,
        window: Duration,
    ) -> StorageResult<Vec<StoredUrl>>;

    /// URLs of an origin whose path does not end with an excluded suffix,
    /// ordered by `first_seen_at` then insertion order
    async fn audit_candidates(
        &self,
        origin: &str,
        exclude_suffixes: &[String],
    ) -> StorageResult<Vec<String>>;

    /// Records the start of an ad-hoc crawl
    async fn start_crawl_run(
        &self,
        origin: &str,
        start_url: &str,
        limits: TraversalLimits,
    ) -> StorageResult<i64>;

    /// Records the outcome of an ad-hoc crawl
    async fn finish_crawl_run(
        &self,
        id: i64,
        status: CrawlRunStatus,
        total_urls: usize,
    ) -> StorageResult<()>;

    /// Gets an ad-hoc crawl record, `CrawlRunNotFound` if absent
    async fn get_crawl_run(&self, id: i64) -> StorageResult<CrawlRun>;
}
