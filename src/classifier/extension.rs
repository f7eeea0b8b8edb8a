use crate::classifier::{ClassificationResult, UrlClassifier};
use crate::url::{classify, normalize, UrlCategory};
use crate::CollaboratorError;
use async_trait::async_trait;

/// Applies the 4-way extension classifier to a batch
///
/// Non-garbage URLs are stored canonicalized; garbage keeps its raw form,
/// since most of it has no canonical form at all.
pub fn classify_urls(base_url: &str, urls: &[String]) -> ClassificationResult {
    let mut result = ClassificationResult::with_labels(UrlCategory::ALL.iter().map(|c| c.as_str()));

    for raw in urls {
        let category = classify(raw, base_url);
        let entry = match category {
            UrlCategory::Garbage => raw.clone(),
            _ => normalize(base_url, raw).unwrap_or_else(|| raw.clone()),
        };
        result.push(category.as_str(), entry);
    }

    result
}

/// Local classifier, no network involved
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionClassifier;

#[async_trait]
impl UrlClassifier for ExtensionClassifier {
    async fn classify_urls(
        &self,
        base_url: &str,
        urls: &[String],
    ) -> Result<ClassificationResult, CollaboratorError> {
        Ok(classify_urls(base_url, urls))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_every_label_present() {
        let result = classify_urls("https://a.test/", &[]);
        let labels: Vec<_> = result.iter().map(|(label, _)| label).collect();
        assert_eq!(labels, vec!["normal", "media", "asset", "garbage"]);
        assert_eq!(result.total(), 0);
    }

    #[test]
    fn test_batch_is_split_and_canonicalized() {
        let urls = strings(&[
            "/about#team",
            "https://a.test/about",
            "/img/logo.png?utm_source=x",
            "/static/app.js",
            "javascript:void(0)",
            "#",
        ]);
        let result = classify_urls("https://a.test/", &urls);

        assert_eq!(result.get("normal"), ["https://a.test/about"]);
        assert_eq!(result.get("media"), ["https://a.test/img/logo.png"]);
        assert_eq!(result.get("asset"), ["https://a.test/static/app.js"]);
        assert_eq!(result.get("garbage"), ["javascript:void(0)", "#"]);
    }

    #[tokio::test]
    async fn test_trait_impl_matches_function() {
        let urls = strings(&["/x", "/y.mp4"]);
        let via_trait = ExtensionClassifier
            .classify_urls("https://a.test/", &urls)
            .await
            .unwrap();
        assert_eq!(via_trait, classify_urls("https://a.test/", &urls));
    }
}
