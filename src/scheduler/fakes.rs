//! In-process collaborators for scheduler and service tests

use crate::audit::{AuditOutcome, AuditRequest, Auditor};
use crate::discovery::{ChannelBatch, DiscoveryType, PageDiscovery, TraversalLimits};
use crate::storage::{
    CrawlRun, CrawlRunStatus, SqliteStore, StorageError, StorageResult, StoredUrl, TaskStore,
    UrlRecord, UrlStore,
};
use crate::task::{DiscoveryTask, NewTask, TaskPatch};
use crate::CollaboratorError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A site whose pages report fixed DOM anchors
#[derive(Default)]
pub(crate) struct StaticSite {
    pages: HashMap<String, Vec<String>>,
    delay: Duration,
    renders: AtomicUsize,
}

impl StaticSite {
    pub(crate) fn page(mut self, url: &str, anchors: &[&str]) -> Self {
        self.pages.insert(
            url.to_string(),
            anchors.iter().map(|a| a.to_string()).collect(),
        );
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageDiscovery for StaticSite {
    async fn discover(&self, url: &str) -> Result<ChannelBatch, CollaboratorError> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let mut batch = ChannelBatch::new();
        if let Some(anchors) = self.pages.get(url) {
            batch.extend(DiscoveryType::Dom, anchors.iter().map(String::as_str));
        }
        Ok(batch)
    }
}

/// An auditor that records requests and answers with a fixed outcome
pub(crate) struct FakeAuditor {
    outcome: Option<AuditOutcome>,
    requests: Mutex<Vec<AuditRequest>>,
}

impl FakeAuditor {
    pub(crate) fn succeeding(success_count: u64, fail_count: u64) -> Self {
        Self {
            outcome: Some(AuditOutcome {
                success_count,
                fail_count,
            }),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Fails every call, as an auditor that propagates errors would
    pub(crate) fn failing() -> Self {
        Self {
            outcome: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<AuditRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Auditor for FakeAuditor {
    async fn audit(&self, request: &AuditRequest) -> Result<AuditOutcome, CollaboratorError> {
        self.requests.lock().unwrap().push(request.clone());
        self.outcome.ok_or(CollaboratorError::Status {
            service: "audit",
            status: 500,
        })
    }
}

fn disk_full() -> StorageError {
    StorageError::Database("disk full".to_string())
}

/// Which URL-store call fails for the broken origin
#[derive(Debug, Clone, Copy)]
pub(crate) enum BrokenStage {
    Upsert,
    AuditCandidates,
}

/// SQLite URL store whose writes or candidate reads fail for one origin
pub(crate) struct BrokenOriginStore {
    inner: Arc<SqliteStore>,
    origin: String,
    stage: BrokenStage,
}

impl BrokenOriginStore {
    pub(crate) fn new(inner: Arc<SqliteStore>, origin: &str, stage: BrokenStage) -> Self {
        Self {
            inner,
            origin: origin.to_string(),
            stage,
        }
    }
}

#[async_trait]
impl UrlStore for BrokenOriginStore {
    async fn upsert_url(&self, record: &UrlRecord) -> StorageResult<()> {
        if matches!(self.stage, BrokenStage::Upsert) && record.origin == self.origin {
            return Err(disk_full());
        }
        self.inner.upsert_url(record).await
    }

    async fn get_url(&self, origin: &str, url: &str) -> StorageResult<Option<StoredUrl>> {
        self.inner.get_url(origin, url).await
    }

    async fn urls_for_source_type(&self, source_type: &str) -> StorageResult<Vec<StoredUrl>> {
        self.inner.urls_for_source_type(source_type).await
    }

    async fn recent_urls_for_source_type(
        &self,
        source_type: &str,
        window: Duration,
    ) -> StorageResult<Vec<StoredUrl>> {
        self.inner
            .recent_urls_for_source_type(source_type, window)
            .await
    }

    async fn audit_candidates(
        &self,
        origin: &str,
        exclude_suffixes: &[String],
    ) -> StorageResult<Vec<String>> {
        if matches!(self.stage, BrokenStage::AuditCandidates) && origin == self.origin {
            return Err(disk_full());
        }
        self.inner.audit_candidates(origin, exclude_suffixes).await
    }

    async fn start_crawl_run(
        &self,
        origin: &str,
        start_url: &str,
        limits: TraversalLimits,
    ) -> StorageResult<i64> {
        self.inner.start_crawl_run(origin, start_url, limits).await
    }

    async fn finish_crawl_run(
        &self,
        id: i64,
        status: CrawlRunStatus,
        total_urls: usize,
    ) -> StorageResult<()> {
        self.inner.finish_crawl_run(id, status, total_urls).await
    }

    async fn get_crawl_run(&self, id: i64) -> StorageResult<CrawlRun> {
        self.inner.get_crawl_run(id).await
    }
}

/// SQLite task store whose first `failures` due-task queries fail
pub(crate) struct FlakyTaskStore {
    inner: Arc<SqliteStore>,
    failures: usize,
    polls: AtomicUsize,
}

impl FlakyTaskStore {
    pub(crate) fn new(inner: Arc<SqliteStore>, failures: usize) -> Self {
        Self {
            inner,
            failures,
            polls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskStore for FlakyTaskStore {
    async fn create_task(&self, task: &NewTask, now: DateTime<Utc>) -> StorageResult<DiscoveryTask> {
        self.inner.create_task(task, now).await
    }

    async fn get_task(&self, id: i64) -> StorageResult<DiscoveryTask> {
        self.inner.get_task(id).await
    }

    async fn list_tasks(&self, skip: usize, limit: usize) -> StorageResult<Vec<DiscoveryTask>> {
        self.inner.list_tasks(skip, limit).await
    }

    async fn update_task(&self, id: i64, patch: &TaskPatch) -> StorageResult<DiscoveryTask> {
        self.inner.update_task(id, patch).await
    }

    async fn delete_task(&self, id: i64) -> StorageResult<()> {
        self.inner.delete_task(id).await
    }

    async fn set_active(
        &self,
        id: i64,
        is_active: bool,
        next_execution_time: Option<DateTime<Utc>>,
    ) -> StorageResult<()> {
        self.inner
            .set_active(id, is_active, next_execution_time)
            .await
    }

    async fn due_tasks(&self, now: DateTime<Utc>) -> StorageResult<Vec<DiscoveryTask>> {
        let poll = self.polls.fetch_add(1, Ordering::SeqCst);
        if poll < self.failures {
            return Err(disk_full());
        }
        self.inner.due_tasks(now).await
    }

    async fn touch_last_execution(&self, id: i64, at: DateTime<Utc>) -> StorageResult<()> {
        self.inner.touch_last_execution(id, at).await
    }

    async fn record_execution(
        &self,
        id: i64,
        success_count: u64,
        fail_count: u64,
        next_execution_time: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.inner
            .record_execution(id, success_count, fail_count, next_execution_time)
            .await
    }

    async fn reschedule(&self, id: i64, next_execution_time: DateTime<Utc>) -> StorageResult<()> {
        self.inner.reschedule(id, next_execution_time).await
    }
}
