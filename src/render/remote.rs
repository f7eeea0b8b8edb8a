//! Client for the remote headless-browser render service

use crate::config::RenderConfig;
use crate::discovery::{ChannelBatch, PageDiscovery};
use crate::CollaboratorError;
use async_trait::async_trait;
use indexmap::IndexMap;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const SERVICE: &str = "render";

#[derive(Debug, Serialize)]
struct RenderRequest<'a> {
    url: &'a str,
    /// Page timeout in milliseconds
    timeout: u64,
    wait_for: &'a str,
}

#[derive(Debug, Deserialize)]
struct RenderResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    discovered_urls: IndexMap<String, Vec<String>>,
    #[serde(default)]
    error: Option<String>,
}

/// Page discovery backed by `POST {service_url}/render`
///
/// The service drives a real browser and reports every channel it observed.
#[derive(Debug, Clone)]
pub struct RemoteRenderer {
    client: Client,
    endpoint: String,
    timeout_ms: u64,
    wait_policy: String,
}

impl RemoteRenderer {
    /// Creates a renderer from the `[render]` configuration
    ///
    /// # Returns
    ///
    /// * `Ok(RemoteRenderer)` - Client built
    /// * `Err(reqwest::Error)` - Failed to build the HTTP client
    pub fn new(config: &RenderConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/render", config.service_url.trim_end_matches('/')),
            timeout_ms: config.timeout_ms,
            wait_policy: config.wait_policy.clone(),
        })
    }
}

#[async_trait]
impl PageDiscovery for RemoteRenderer {
    async fn discover(&self, url: &str) -> Result<ChannelBatch, CollaboratorError> {
        let request = RenderRequest {
            url,
            timeout: self.timeout_ms,
            wait_for: &self.wait_policy,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
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

        let body: RenderResponse =
            response
                .json()
                .await
                .map_err(|e| CollaboratorError::Decode {
                    service: SERVICE,
                    message: e.to_string(),
                })?;

        if !body.success {
            return Err(CollaboratorError::Rejected {
                service: SERVICE,
                message: body
                    .error
                    .unwrap_or_else(|| "render reported failure".to_string()),
            });
        }

        let batch = ChannelBatch::from(body.discovered_urls);
        debug!("Render of {} returned {} raw entries", url, batch.len());

        Ok(batch)
    }
}
