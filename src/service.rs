//! Management operations
//!
//! This module provides the operations behind the command-line surface:
//! - Task CRUD, activation and status
//! - Queries over stored URLs
//! - Ad-hoc crawls, optionally persisted and classified
//! - One-shot crawl-and-audit without a stored task

use crate::audit::AuditOutcome;
use crate::classifier::{classify_urls, ClassificationResult, UrlClassifier};
use crate::discovery::{DiscoveredUrl, TraversalLimits};
use crate::scheduler::{AuditTarget, Pipeline, Scheduler};
use crate::storage::{CrawlRunStatus, StoredUrl, TaskStore};
use crate::task::{default_exclude_suffixes, DiscoveryTask, NewTask, TaskPatch};
use crate::url::origin_of;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Default trailing window of [`ScoutService::recent_urls_for_source_type`]
pub const DEFAULT_RECENT_WINDOW: Duration = Duration::from_secs(300);

/// Status report of one task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskStatus {
    pub id: i64,
    pub task_name: String,
    pub is_active: bool,
    /// Whether an execution is in flight right now
    pub is_running: bool,
    pub success_counts: u64,
    pub fail_counts: u64,
    pub last_execution_time: Option<DateTime<Utc>>,
    pub next_execution_time: Option<DateTime<Utc>>,
    pub create_time: DateTime<Utc>,
}

/// An ad-hoc crawl
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CrawlRequest {
    pub base_url: String,
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    /// Store the discovered URLs
    #[serde(default)]
    pub persist: bool,
    #[serde(default)]
    pub source_type: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
    /// Classify the discovered URLs
    #[serde(default)]
    pub classify: bool,
    /// Prefer the semantic classifier when one is configured
    #[serde(default)]
    pub use_llm: bool,
}

fn default_max_depth() -> u32 {
    3
}

fn default_max_pages() -> usize {
    1000
}

impl CrawlRequest {
    /// A non-persisted, unclassified crawl
    pub fn new(base_url: impl Into<String>, limits: TraversalLimits) -> Self {
        Self {
            base_url: base_url.into(),
            max_depth: limits.max_depth,
            max_pages: limits.max_pages,
            persist: false,
            source_type: None,
            tags: None,
            classify: false,
            use_llm: false,
        }
    }

    pub fn limits(&self) -> TraversalLimits {
        TraversalLimits::new(self.max_depth, self.max_pages)
    }
}

/// Result of an ad-hoc crawl
#[derive(Debug, Clone, Serialize)]
pub struct CrawlResponse {
    /// Discovered URLs in discovery order
    pub urls: Vec<DiscoveredUrl>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<ClassificationResult>,
    /// Number of URLs written to the store
    pub persisted: usize,
    /// Crawl run record, present when the crawl was persisted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<i64>,
}

/// A discovery-and-audit pass without a stored task
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CrawlAuditRequest {
    pub base_url: String,
    #[serde(default)]
    pub source_type: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
    /// Depth forwarded to the audit service
    #[serde(default = "default_audit_depth")]
    pub depth: u32,
    #[serde(default)]
    pub strategy_type: String,
    #[serde(default)]
    pub strategy_contents: String,
    #[serde(default = "default_exclude_suffixes")]
    pub exclude_suffixes: Vec<String>,
}

fn default_audit_depth() -> u32 {
    1
}

impl From<&CrawlAuditRequest> for AuditTarget {
    fn from(request: &CrawlAuditRequest) -> Self {
        Self {
            base_url: request.base_url.clone(),
            source_type: request.source_type.clone(),
            tags: request.tags.clone(),
            depth: request.depth,
            strategy_type: request.strategy_type.clone(),
            strategy_contents: request.strategy_contents.clone(),
            exclude_suffixes: request.exclude_suffixes.clone(),
        }
    }
}

/// Management service over the stores, the pipeline and an optional
/// running scheduler
#[derive(Clone)]
pub struct ScoutService {
    tasks: Arc<dyn TaskStore>,
    pipeline: Pipeline,
    scheduler: Option<Scheduler>,
    semantic: Option<Arc<dyn UrlClassifier>>,
    recent_window: Duration,
}

impl ScoutService {
    pub fn new(tasks: Arc<dyn TaskStore>, pipeline: Pipeline) -> Self {
        Self {
            tasks,
            pipeline,
            scheduler: None,
            semantic: None,
            recent_window: DEFAULT_RECENT_WINDOW,
        }
    }

    /// Attaches a scheduler: new tasks run once immediately and status
    /// reports in-flight executions
    pub fn with_scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn with_semantic_classifier(mut self, classifier: Arc<dyn UrlClassifier>) -> Self {
        self.semantic = Some(classifier);
        self
    }

    pub fn with_recent_window(mut self, window: Duration) -> Self {
        self.recent_window = window;
        self
    }

    /// Validates and stores a task
    ///
    /// # Errors
    ///
    /// * `ScoutError::InvalidTask` - A field is invalid
    /// * `ScoutError::Storage` - The name is taken, or the store failed
    pub async fn create_task(&self, task: &NewTask) -> Result<DiscoveryTask> {
        task.validate()?;
        let created = self.tasks.create_task(task, Utc::now()).await?;
        info!("Created task {} ({})", created.id, created.task_name);

        if let Some(scheduler) = &self.scheduler {
            scheduler.dispatch(created.clone());
        }

        Ok(created)
    }

    pub async fn list_tasks(&self, skip: usize, limit: usize) -> Result<Vec<DiscoveryTask>> {
        Ok(self.tasks.list_tasks(skip, limit).await?)
    }

    pub async fn get_task(&self, id: i64) -> Result<DiscoveryTask> {
        Ok(self.tasks.get_task(id).await?)
    }

    /// Applies a patch; empty patches and invalid fields are rejected
    pub async fn update_task(&self, id: i64, patch: &TaskPatch) -> Result<DiscoveryTask> {
        patch.validate()?;
        let updated = self.tasks.update_task(id, patch).await?;
        info!("Updated task {}", id);
        Ok(updated)
    }

    pub async fn delete_task(&self, id: i64) -> Result<()> {
        self.tasks.delete_task(id).await?;
        info!("Deleted task {}", id);
        Ok(())
    }

    /// Activates a task and makes it due immediately
    pub async fn start_task(&self, id: i64) -> Result<DiscoveryTask> {
        self.tasks.set_active(id, true, Some(Utc::now())).await?;
        info!("Started task {}", id);
        self.get_task(id).await
    }

    /// Deactivates a task; an execution in flight is left to finish
    pub async fn stop_task(&self, id: i64) -> Result<DiscoveryTask> {
        self.tasks.set_active(id, false, None).await?;
        info!("Stopped task {}", id);
        self.get_task(id).await
    }

    pub async fn task_status(&self, id: i64) -> Result<TaskStatus> {
        let task = self.tasks.get_task(id).await?;
        let is_running = self
            .scheduler
            .as_ref()
            .map_or(false, |scheduler| scheduler.is_running(id));

        Ok(TaskStatus {
            id: task.id,
            task_name: task.task_name,
            is_active: task.is_active,
            is_running,
            success_counts: task.success_counts,
            fail_counts: task.fail_counts,
            last_execution_time: task.last_execution_time,
            next_execution_time: task.next_execution_time,
            create_time: task.create_time,
        })
    }

    pub async fn urls_for_source_type(&self, source_type: &str) -> Result<Vec<StoredUrl>> {
        Ok(self
            .pipeline
            .url_store()
            .urls_for_source_type(source_type)
            .await?)
    }

    /// URLs first and last seen within `window` of each other, the
    /// configured window when `None`
    pub async fn recent_urls_for_source_type(
        &self,
        source_type: &str,
        window: Option<Duration>,
    ) -> Result<Vec<StoredUrl>> {
        let window = window.unwrap_or(self.recent_window);
        Ok(self
            .pipeline
            .url_store()
            .recent_urls_for_source_type(source_type, window)
            .await?)
    }

    /// Runs an ad-hoc traversal
    ///
    /// A persisted crawl is recorded as a crawl run whose id is returned.
    pub async fn submit_crawl(&self, request: &CrawlRequest) -> Result<CrawlResponse> {
        let limits = request.limits();
        let urls = self.pipeline.url_store();

        let run_id = match (request.persist, origin_of(&request.base_url)) {
            (true, Some(origin)) => Some(
                urls.start_crawl_run(&origin, &request.base_url, limits)
                    .await?,
            ),
            _ => None,
        };

        let outcome = self.crawl_and_store(request, limits).await;

        if let Some(run_id) = run_id {
            let (status, total) = match &outcome {
                Ok((discovered, _)) => (CrawlRunStatus::Completed, discovered.len()),
                Err(_) => (CrawlRunStatus::Failed, 0),
            };
            if let Err(e) = urls.finish_crawl_run(run_id, status, total).await {
                warn!("Failed to close crawl run {}: {}", run_id, e);
            }
        }

        let (discovered, persisted) = outcome?;

        let classification = if request.classify {
            let found: Vec<String> = discovered.iter().map(|d| d.url.clone()).collect();
            Some(self.classify(&request.base_url, &found, request.use_llm).await)
        } else {
            None
        };

        info!(
            "Crawl of {} found {} URLs, persisted {}",
            request.base_url,
            discovered.len(),
            persisted
        );

        Ok(CrawlResponse {
            urls: discovered,
            classification,
            persisted,
            run_id,
        })
    }

    async fn crawl_and_store(
        &self,
        request: &CrawlRequest,
        limits: TraversalLimits,
    ) -> Result<(Vec<DiscoveredUrl>, usize)> {
        let discovered = self.pipeline.discover(&request.base_url, limits).await?;

        let persisted = if request.persist {
            self.pipeline
                .persist(
                    &discovered,
                    request.source_type.as_deref(),
                    request.tags.as_deref(),
                )
                .await?
        } else {
            0
        };

        Ok((discovered.into_values().collect(), persisted))
    }

    /// Classifies with the semantic classifier when asked and available,
    /// falling back to the extension classifier
    pub async fn classify(
        &self,
        base_url: &str,
        urls: &[String],
        use_llm: bool,
    ) -> ClassificationResult {
        if use_llm {
            match &self.semantic {
                Some(classifier) => match classifier.classify_urls(base_url, urls).await {
                    Ok(result) => return result,
                    Err(e) => warn!("Semantic classification failed, using extensions: {}", e),
                },
                None => warn!("No semantic classifier configured, using extensions"),
            }
        }

        classify_urls(base_url, urls)
    }

    /// Discovers, persists and audits `request.base_url` once, outside the
    /// schedule
    pub async fn crawl_and_audit(
        &self,
        request: &CrawlAuditRequest,
        limits: TraversalLimits,
    ) -> Result<AuditOutcome> {
        let outcome = self.pipeline.run(&AuditTarget::from(request), limits).await?;
        info!(
            "Crawl-and-audit of {}: {} succeeded, {} failed",
            request.base_url, outcome.success_count, outcome.fail_count
        );
        Ok(outcome)
    }
}
