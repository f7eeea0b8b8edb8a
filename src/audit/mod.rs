//! Client for the downstream audit service
//!
//! A task execution hands its audit candidates to the service in one batch
//! and gets back how many of them were audited successfully.

use crate::config::AuditConfig;
use crate::CollaboratorError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

const SERVICE: &str = "audit";

/// One audit batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRequest {
    pub urls: Vec<String>,
    pub depth: u32,
    pub strategy_type: String,
    pub strategy_contents: String,
}

/// Counts reported for one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditOutcome {
    #[serde(default)]
    pub success_count: u64,
    #[serde(default)]
    pub fail_count: u64,
}

impl AuditOutcome {
    /// Every URL of the batch counted as failed
    pub fn all_failed(batch_size: usize) -> Self {
        Self {
            success_count: 0,
            fail_count: batch_size as u64,
        }
    }
}

/// Audits a batch of URLs
#[async_trait]
pub trait Auditor: Send + Sync {
    /// Submits `request` and returns its counts
    ///
    /// An `Err` means the batch was not attributed at all; the caller skips
    /// its counter update.
    async fn audit(&self, request: &AuditRequest) -> Result<AuditOutcome, CollaboratorError>;
}

/// HTTP auditor posting batches to `[audit] endpoint`
#[derive(Debug, Clone)]
pub struct HttpAuditor {
    client: Client,
    endpoint: String,
}

impl HttpAuditor {
    /// Creates an auditor from the `[audit]` configuration
    ///
    /// # Returns
    ///
    /// * `Ok(HttpAuditor)` - Client built
    /// * `Err(reqwest::Error)` - Failed to build the HTTP client
    pub fn new(config: &AuditConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    async fn submit(&self, request: &AuditRequest) -> Result<AuditOutcome, CollaboratorError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| CollaboratorError::from_reqwest(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollaboratorError::Status {
                service: SERVICE,
                status: status.as_u16(),
            });
        }

        response
            .json::<AuditOutcome>()
            .await
            .map_err(|e| CollaboratorError::Decode {
                service: SERVICE,
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl Auditor for HttpAuditor {
    /// Never fails: any error counts the whole batch as failed
    async fn audit(&self, request: &AuditRequest) -> Result<AuditOutcome, CollaboratorError> {
        match self.submit(request).await {
            Ok(outcome) => {
                info!(
                    "Audit of {} URLs: {} succeeded, {} failed",
                    request.urls.len(),
                    outcome.success_count,
                    outcome.fail_count
                );
                Ok(outcome)
            }
            Err(e) => {
                warn!("Audit of {} URLs failed: {}", request.urls.len(), e);
                Ok(AuditOutcome::all_failed(request.urls.len()))
            }
        }
    }
}
