use crate::audit::{AuditOutcome, AuditRequest, Auditor};
use crate::discovery::{traverse, DiscoveredUrl, DiscoveryError, PageDiscovery, TraversalLimits};
use crate::scheduler::persist_urls;
use crate::storage::{UrlRecord, UrlStore};
use crate::task::DiscoveryTask;
use crate::url::origin_of;
use indexmap::IndexMap;
use std::sync::Arc;

/// Everything one discovery-and-audit pass needs to know about its target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditTarget {
    pub base_url: String,
    pub source_type: Option<String>,
    pub tags: Option<String>,
    pub depth: u32,
    pub strategy_type: String,
    pub strategy_contents: String,
    pub exclude_suffixes: Vec<String>,
}

impl From<&DiscoveryTask> for AuditTarget {
    fn from(task: &DiscoveryTask) -> Self {
        Self {
            base_url: task.base_url.clone(),
            source_type: Some(task.source_type.clone()),
            tags: task.tags.clone(),
            depth: task.depth,
            strategy_type: task.strategy_type.clone(),
            strategy_contents: task.strategy_contents.clone(),
            exclude_suffixes: task.exclude_suffixes.clone(),
        }
    }
}

/// Discover, persist, select audit candidates, audit
///
/// Shared by scheduled executions and one-shot crawl-and-audit requests.
#[derive(Clone)]
pub struct Pipeline {
    urls: Arc<dyn UrlStore>,
    discovery: Arc<dyn PageDiscovery>,
    auditor: Arc<dyn Auditor>,
    persist_concurrency: usize,
}

impl Pipeline {
    pub fn new(
        urls: Arc<dyn UrlStore>,
        discovery: Arc<dyn PageDiscovery>,
        auditor: Arc<dyn Auditor>,
        persist_concurrency: usize,
    ) -> Self {
        Self {
            urls,
            discovery,
            auditor,
            persist_concurrency,
        }
    }

    pub fn url_store(&self) -> &Arc<dyn UrlStore> {
        &self.urls
    }

    pub fn page_discovery(&self) -> &Arc<dyn PageDiscovery> {
        &self.discovery
    }

    /// Traverses from `start_url` without persisting anything
    pub async fn discover(
        &self,
        start_url: &str,
        limits: TraversalLimits,
    ) -> Result<IndexMap<String, DiscoveredUrl>, DiscoveryError> {
        traverse(self.discovery.as_ref(), start_url, limits).await
    }

    /// Upserts a traversal result tagged with `source_type` and `tags`
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - Number of URLs written
    /// * `Err(StorageError)` - The first failed write
    pub async fn persist(
        &self,
        discovered: &IndexMap<String, DiscoveredUrl>,
        source_type: Option<&str>,
        tags: Option<&str>,
    ) -> crate::storage::StorageResult<usize> {
        let records = discovered
            .values()
            .map(|d| UrlRecord::from_discovered(d, source_type, tags))
            .collect();

        persist_urls(Arc::clone(&self.urls), records, self.persist_concurrency).await
    }

    /// Runs one full pass for `target`
    ///
    /// Returns the audit counts, zero when there was nothing to audit. Any
    /// error means no counts are attributable to this pass.
    pub async fn run(
        &self,
        target: &AuditTarget,
        limits: TraversalLimits,
    ) -> crate::Result<AuditOutcome> {
        let origin = origin_of(&target.base_url)
            .ok_or_else(|| DiscoveryError::InvalidStartUrl(target.base_url.clone()))?;

        let discovered = self.discover(&target.base_url, limits).await?;
        let written = self
            .persist(
                &discovered,
                target.source_type.as_deref(),
                target.tags.as_deref(),
            )
            .await?;
        tracing::debug!("Persisted {} URLs for {}", written, origin);

        let candidates = self
            .urls
            .audit_candidates(&origin, &target.exclude_suffixes)
            .await?;

        if candidates.is_empty() {
            tracing::info!("No audit candidates for {}", origin);
            return Ok(AuditOutcome::default());
        }

        tracing::info!("Auditing {} URLs for {}", candidates.len(), origin);
        let request = AuditRequest {
            urls: candidates,
            depth: target.depth,
            strategy_type: target.strategy_type.clone(),
            strategy_contents: target.strategy_contents.clone(),
        };

        Ok(self.auditor.audit(&request).await?)
    }
}
