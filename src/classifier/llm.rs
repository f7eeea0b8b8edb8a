//! Semantic URL classification through a chat-completions model
//!
//! The model receives the page URL and the batch, and answers with a JSON
//! object listing every URL under one of five semantic labels.

use crate::classifier::{ClassificationResult, UrlClassifier};
use crate::config::ClassifierConfig;
use crate::CollaboratorError;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

const SERVICE: &str = "classifier";

const TEMPERATURE: f64 = 0.2;

/// Extra back-off multiplier after HTTP 429
const RATE_LIMIT_FACTOR: u32 = 5;

static JSON_OBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{[\s\S]*\}").expect("valid JSON object pattern"));

/// Labels of the semantic classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemanticCategory {
    AccessibleWebsite,
    AccessibleImage,
    AccessibleAbnormal,
    NonImageMultimedia,
    Inaccessible,
}

impl SemanticCategory {
    pub const ALL: [SemanticCategory; 5] = [
        Self::AccessibleWebsite,
        Self::AccessibleImage,
        Self::AccessibleAbnormal,
        Self::NonImageMultimedia,
        Self::Inaccessible,
    ];

    /// JSON key used by the model and in results
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessibleWebsite => "accessible_website_urls",
            Self::AccessibleImage => "accessible_image_urls",
            Self::AccessibleAbnormal => "accessible_abnormal_urls",
            Self::NonImageMultimedia => "non_image_multimedia_urls",
            Self::Inaccessible => "inaccessible_urls",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == label)
    }
}

impl std::fmt::Display for SemanticCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

/// Classifier backed by an OpenAI/OpenRouter-compatible endpoint
#[derive(Debug, Clone)]
pub struct LlmClassifier {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_retries: u32,
    backoff_unit: Duration,
}

impl LlmClassifier {
    /// Creates a classifier from the `[classifier]` configuration
    ///
    /// # Returns
    ///
    /// * `Ok(LlmClassifier)` - Client built
    /// * `Err(reqwest::Error)` - Failed to build the HTTP client
    pub fn new(config: &ClassifierConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_retries: config.max_retries,
            backoff_unit: Duration::from_secs(1),
        })
    }

    /// Replaces the one-second unit of the exponential back-off
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    async fn request_once(&self, prompt: &str) -> Result<ClassificationResult, CollaboratorError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt.to_string(),
            }],
            temperature: TEMPERATURE,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("X-Title", "url-scout")
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

        let body: ChatResponse = response.json().await.map_err(|e| CollaboratorError::Decode {
            service: SERVICE,
            message: e.to_string(),
        })?;

        let usage = body.usage.unwrap_or_default();
        info!(
            "Classifier token usage: prompt={}, completion={}, total={}",
            usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
        );

        let content = body
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| CollaboratorError::Decode {
                service: SERVICE,
                message: "response has no choices".to_string(),
            })?;

        let parsed = parse_reply(&content)?;
        Ok(fold_reply(&parsed))
    }

    fn backoff(&self, attempt: u32, rate_limited: bool) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        let factor = if rate_limited {
            factor.saturating_mul(RATE_LIMIT_FACTOR)
        } else {
            factor
        };
        self.backoff_unit.saturating_mul(factor)
    }
}

#[async_trait]
impl UrlClassifier for LlmClassifier {
    async fn classify_urls(
        &self,
        base_url: &str,
        urls: &[String],
    ) -> Result<ClassificationResult, CollaboratorError> {
        let prompt = build_prompt(base_url, urls);
        let attempts = self.max_retries.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            info!(
                "Calling classifier (attempt {}/{}) for {} URLs",
                attempt + 1,
                attempts,
                urls.len()
            );

            match self.request_once(&prompt).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    let rate_limited = matches!(
                        e,
                        CollaboratorError::Status { status, .. }
                            if status == StatusCode::TOO_MANY_REQUESTS.as_u16()
                    );
                    warn!("Classifier attempt {} failed: {}", attempt + 1, e);

                    // Rate limits always wait; other failures only between attempts
                    if rate_limited || attempt + 1 < attempts {
                        tokio::time::sleep(self.backoff(attempt, rate_limited)).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(CollaboratorError::Rejected {
            service: SERVICE,
            message: "no attempt was made".to_string(),
        }))
    }
}

/// Builds the classification prompt for one batch
fn build_prompt(base_url: &str, urls: &[String]) -> String {
    let host = Url::parse(base_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default();
    let listing = serde_json::to_string_pretty(urls).unwrap_or_else(|_| "[]".to_string());

    format!(
        r#"You are an expert in URL analysis and security review. Classify every URL below.

Context:
- Main URL: {base_url}
- Main host: {host}
- Number of URLs: {count}

URLs:
{listing}

Rules, in priority order. Each URL goes into exactly one category.

1. accessible_abnormal_urls: reachable pages or images that look clearly abnormal:
   a host unrelated to {host} (subdomains count as related), a non-http(s) scheme,
   text that looks like an HTML/CSS/JS fragment, injection payloads, broken or
   excessive percent-encoding, or link shorteners.
2. inaccessible_urls: unreachable, placeholder, test or local URLs such as
   localhost, 127.0.0.1, example.com, or paths containing undefined, null or 404.
3. accessible_image_urls: image resources (jpg, png, webp, svg, ico, avif, image
   paths or image CDNs) that are not abnormal.
4. non_image_multimedia_urls: video, audio, fonts, documents (pdf, docx, pptx,
   xlsx), archives and streaming manifests (m3u8, mpd).
5. accessible_website_urls: ordinary reachable HTTP(S) pages, app routes, APIs
   and reasonable external links.

http versus https, ordinary query parameters, explicit ports, CDN hosts and
internationalized domain names are not abnormal by themselves.

Answer with JSON only, no commentary, listing every URL exactly once:
{{
  "accessible_website_urls": [],
  "accessible_image_urls": [],
  "accessible_abnormal_urls": [],
  "non_image_multimedia_urls": [],
  "inaccessible_urls": []
}}
"#,
        base_url = base_url,
        host = host,
        count = urls.len(),
        listing = listing,
    )
}

/// Parses the model reply, tolerating Markdown fences and surrounding prose
fn parse_reply(content: &str) -> Result<Value, CollaboratorError> {
    let trimmed = strip_code_fence(content);

    serde_json::from_str(trimmed).or_else(|first| {
        JSON_OBJECT
            .find(trimmed)
            .and_then(|m| serde_json::from_str(m.as_str()).ok())
            .ok_or_else(|| CollaboratorError::Decode {
                service: SERVICE,
                message: format!("reply is not JSON: {}", first),
            })
    })
}

fn strip_code_fence(content: &str) -> &str {
    let mut text = content.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Keeps the five known labels; other keys and non-string entries are ignored
fn fold_reply(reply: &Value) -> ClassificationResult {
    let mut result =
        ClassificationResult::with_labels(SemanticCategory::ALL.iter().map(|c| c.as_str()));

    for category in SemanticCategory::ALL {
        let entries = reply
            .get(category.as_str())
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        for url in entries.iter().filter_map(Value::as_str) {
            result.push(category.as_str(), url);
        }
    }

    result
}
