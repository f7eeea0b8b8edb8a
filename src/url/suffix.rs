use url::Url;

/// Checks if a URL path ends with any of the excluded suffixes
///
/// Matching is ASCII case-insensitive and looks only at the path, so a
/// trailing query string or fragment after the suffix does not hide it.
/// Blank suffixes are ignored.
///
/// # Examples
///
/// ```
/// use url_scout::url::matches_excluded_suffix;
///
/// let suffixes = vec![".js".to_string(), ".css".to_string()];
/// assert!(matches_excluded_suffix("https://a.test/style.css?v=2", &suffixes));
/// assert!(!matches_excluded_suffix("https://a.test/about", &suffixes));
/// ```
pub fn matches_excluded_suffix(url: &str, suffixes: &[String]) -> bool {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_ascii_lowercase(),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or(url)
            .to_ascii_lowercase(),
    };

    suffixes
        .iter()
        .map(|suffix| suffix.trim())
        .filter(|suffix| !suffix.is_empty())
        .any(|suffix| path.ends_with(&suffix.to_ascii_lowercase()))
}
