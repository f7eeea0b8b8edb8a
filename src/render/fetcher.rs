//! Static (browser-less) page discovery
//!
//! This module fetches pages directly over HTTP and reads their channels out
//! of the raw HTML:
//! - Building the HTTP client with the configured user agent
//! - Following redirects manually so each `Location` is observed
//! - Rejecting non-success and non-HTML responses

use super::parser::parse_html;
use crate::config::RenderConfig;
use crate::discovery::{extract_candidates, ChannelBatch, DiscoveryType, PageDiscovery};
use crate::url::normalize;
use crate::CollaboratorError;
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{redirect::Policy, Client};
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;
use url::Url;

const SERVICE: &str = "static render";

/// Maximum number of redirect hops followed for one page
const MAX_REDIRECTS: usize = 10;

/// A successfully fetched HTML page
#[derive(Debug)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: Url,
    /// Every `Location` target seen on the way, resolved to absolute
    pub redirects: Vec<String>,
    /// Page body content
    pub body: String,
}

/// Builds an HTTP client with proper configuration
///
/// Redirects are disabled on the client; [`fetch_page`] follows them itself.
///
/// # Arguments
///
/// * `config` - The render configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &RenderConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::none()) // Handle redirects manually
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a page, following up to 10 redirects
///
/// # Request Flow
///
/// 1. GET the URL
/// 2. On a 3xx with a `Location` header, record the target and repeat
///    - A target seen before in this chain is a redirect loop
///    - More than 10 hops is an error
/// 3. Non-2xx final status → `CollaboratorError::Status`
/// 4. Content-Type not HTML → `CollaboratorError::Rejected`
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `url` - The URL to fetch
pub async fn fetch_page(client: &Client, url: &str) -> Result<FetchedPage, CollaboratorError> {
    let mut current = Url::parse(url).map_err(|e| CollaboratorError::Rejected {
        service: SERVICE,
        message: format!("invalid URL '{}': {}", url, e),
    })?;
    let mut redirects = Vec::new();
    let mut chain: HashSet<String> = HashSet::new();
    chain.insert(current.to_string());

    loop {
        let response = client
            .get(current.clone())
            .send()
            .await
            .map_err(|e| CollaboratorError::from_reqwest(SERVICE, e))?;

        let status = response.status();

        if status.is_redirection() {
            let Some(location) = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
            else {
                return Err(CollaboratorError::Status {
                    service: SERVICE,
                    status: status.as_u16(),
                });
            };

            let next = current
                .join(location)
                .map_err(|e| CollaboratorError::Rejected {
                    service: SERVICE,
                    message: format!("invalid redirect target '{}': {}", location, e),
                })?;

            redirects.push(next.to_string());

            if redirects.len() > MAX_REDIRECTS {
                return Err(CollaboratorError::Rejected {
                    service: SERVICE,
                    message: format!("more than {} redirects from {}", MAX_REDIRECTS, url),
                });
            }

            if !chain.insert(next.to_string()) {
                return Err(CollaboratorError::Rejected {
                    service: SERVICE,
                    message: format!("redirect loop at {}", next),
                });
            }

            debug!("{} redirected to {}", current, next);
            current = next;
            continue;
        }

        if !status.is_success() {
            return Err(CollaboratorError::Status {
                service: SERVICE,
                status: status.as_u16(),
            });
        }

        // Check Content-Type
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if !content_type.contains("text/html") {
            return Err(CollaboratorError::Rejected {
                service: SERVICE,
                message: format!("not an HTML page (content-type '{}')", content_type),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| CollaboratorError::from_reqwest(SERVICE, e))?;

        return Ok(FetchedPage {
            final_url: current,
            redirects,
            body,
        });
    }
}

/// Page discovery that fetches HTML directly
///
/// Reports the `redirect`, `dom`, `network` and `heuristic` channels only;
/// anything that needs a live browser (SPA routes, runtime resources,
/// interaction) is out of reach.
#[derive(Debug, Clone)]
pub struct StaticRenderer {
    client: Client,
}

impl StaticRenderer {
    pub fn new(config: &RenderConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
        })
    }
}

#[async_trait]
impl PageDiscovery for StaticRenderer {
    async fn discover(&self, url: &str) -> Result<ChannelBatch, CollaboratorError> {
        let page = fetch_page(&self.client, url).await?;
        let parsed = parse_html(&page.body, &page.final_url);

        if let Some(title) = &parsed.title {
            debug!("Fetched {} ({})", page.final_url, title);
        }

        let mut batch = ChannelBatch::new();
        if page.redirects.is_empty() {
            batch.push(DiscoveryType::Heuristic, page.body);
        } else {
            // The aggregator resolves against the requested URL; relative
            // matches in a redirected body belong to the final one
            let base = page.final_url.as_str();
            batch.extend(
                DiscoveryType::Heuristic,
                extract_candidates(&page.body)
                    .into_iter()
                    .filter_map(|raw| normalize(base, raw)),
            );
        }
        batch.extend(DiscoveryType::Redirect, page.redirects);
        batch.extend(DiscoveryType::Dom, parsed.anchors);
        batch.extend(DiscoveryType::Network, parsed.resources);

        Ok(batch)
    }
}
