//! URL classification
//!
//! Two classifiers share the [`UrlClassifier`] trait:
//! - `ExtensionClassifier`: the local 4-way split by prefix and extension
//! - `LlmClassifier`: a 5-way semantic split delegated to a chat-completions
//!   model

mod extension;
mod llm;

pub use extension::{classify_urls, ExtensionClassifier};
pub use llm::{LlmClassifier, SemanticCategory};

use crate::CollaboratorError;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Serialize;

/// Category label to URLs, in first-seen order without duplicates
///
/// Every label of the producing classifier is present, possibly empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ClassificationResult {
    categories: IndexMap<String, Vec<String>>,
}

impl ClassificationResult {
    /// Creates a result with an empty list per label
    pub fn with_labels<'a>(labels: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            categories: labels
                .into_iter()
                .map(|label| (label.to_string(), Vec::new()))
                .collect(),
        }
    }

    /// Appends `url` under `label` unless already there
    pub fn push(&mut self, label: &str, url: impl Into<String>) {
        let url = url.into();
        let entries = self.categories.entry(label.to_string()).or_default();
        if !entries.contains(&url) {
            entries.push(url);
        }
    }

    /// URLs under `label`, empty if the label is unknown
    pub fn get(&self, label: &str) -> &[String] {
        self.categories
            .get(label)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Labels with their URLs, in label order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.categories
            .iter()
            .map(|(label, urls)| (label.as_str(), urls.as_slice()))
    }

    /// Total URLs across all labels
    pub fn total(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }
}

/// Splits a batch of URLs into categories
#[async_trait]
pub trait UrlClassifier: Send + Sync {
    /// Classifies `urls` found under `base_url`
    async fn classify_urls(
        &self,
        base_url: &str,
        urls: &[String],
    ) -> Result<ClassificationResult, CollaboratorError>;
}
