//! HTML parser for the static renderer
//!
//! This module extracts the raw material of two discovery channels from a
//! fetched document:
//! - DOM anchors (`<a href>` and the canonical link)
//! - Resources the page would request (scripts, images, stylesheets,
//!   frames, form targets)

use scraper::{Html, Selector};
use url::Url;

/// Links and resource references found in an HTML page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Anchor and canonical-link targets (absolute URLs)
    pub anchors: Vec<String>,

    /// Targets the page would fetch or submit to (absolute URLs)
    pub resources: Vec<String>,
}

/// Resource-bearing elements and the attribute holding their target
const RESOURCE_SELECTORS: &[(&str, &str)] = &[
    ("script[src]", "src"),
    ("img[src]", "src"),
    ("link[href]:not([rel='canonical'])", "href"),
    ("iframe[src]", "src"),
    ("form[action]", "action"),
];

/// Parses HTML content and extracts channel candidates
///
/// # Extraction Rules
///
/// **Anchors:**
/// - `<a href="...">` anywhere in the document, download links included
/// - `<link rel="canonical" href="...">`
///
/// **Resources:**
/// - `<script src>`, `<img src>`, `<iframe src>`
/// - `<link href>` other than the canonical link
/// - `<form action>`
///
/// Values are resolved against `base_url`; unresolvable values are skipped.
/// Scheme and origin filtering is left to the aggregator.
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `base_url` - The URL the document was served from
///
/// # Example
///
/// ```
/// use url_scout::render::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.anchors, vec!["https://example.com/page"]);
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: extract_title(&document),
        anchors: extract_anchors(&document, base_url),
        resources: extract_resources(&document, base_url),
    }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_anchors(document: &Html, base_url: &Url) -> Vec<String> {
    let mut anchors = select_attribute(document, "a[href]", "href", base_url);
    anchors.extend(select_attribute(
        document,
        "link[rel='canonical'][href]",
        "href",
        base_url,
    ));
    anchors
}

fn extract_resources(document: &Html, base_url: &Url) -> Vec<String> {
    RESOURCE_SELECTORS
        .iter()
        .flat_map(|(selector, attribute)| select_attribute(document, selector, attribute, base_url))
        .collect()
}

/// Collects one attribute of every matching element, resolved to absolute
fn select_attribute(document: &Html, selector: &str, attribute: &str, base_url: &Url) -> Vec<String> {
    let Ok(selector) = Selector::parse(selector) else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| element.value().attr(attribute))
        .filter_map(|value| resolve_link(value, base_url))
        .collect()
}

/// Resolves an attribute value against the document URL
///
/// Values that cannot be resolved at all are dropped; values with other
/// schemes are kept for the aggregator to reject.
fn resolve_link(value: &str, base_url: &Url) -> Option<String> {
    let value = value.trim();

    if value.is_empty() {
        return None;
    }

    base_url.join(value).ok().map(String::from)
}
