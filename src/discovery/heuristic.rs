//! Last-resort URL extraction from raw page text

use once_cell::sync::Lazy;
use regex::Regex;

/// Extraction patterns, each with the candidate in capture group 1
///
/// Quoted `href=`/`src=` values and bare absolute URLs.
static PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r#"href=["']([^"']+)["']"#,
        r#"src=["']([^"']+)["']"#,
        r#"(https?://[^\s<>"']+)"#,
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("heuristic pattern must compile"))
    .collect()
});

/// Bare site-relative paths, in capture group 1
///
/// Only the leading delimiter is part of the pattern. The trailing one is
/// checked by [`ends_at_delimiter`] without consuming it, so it can still
/// lead the next path. Together they keep closing tags (`</div>`), the
/// `//host` part of absolute URLs and dotted file names out.
static BARE_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:^|[\s"'(=,])(/[a-zA-Z0-9_/-]+(?:\?[^\s<>"']*)?)"#)
        .expect("bare path pattern must compile")
});

/// Whether `end` is the end of `text` or sits on a path delimiter
fn ends_at_delimiter(text: &str, end: usize) -> bool {
    match text.as_bytes().get(end) {
        None => true,
        Some(byte) => byte.is_ascii_whitespace() || b"\"'),;<".contains(byte),
    }
}

/// Extracts raw URL candidates from page text
///
/// Every pattern runs over the whole text; the same string may be returned
/// by several patterns. Candidates are returned raw, in pattern order then
/// text order, for the caller to normalize and filter.
pub fn extract_candidates(text: &str) -> Vec<&str> {
    let delimited = PATTERNS
        .iter()
        .flat_map(|pattern| pattern.captures_iter(text))
        .filter_map(|captures| captures.get(1));

    let bare_paths = BARE_PATH
        .captures_iter(text)
        .filter_map(|captures| captures.get(1))
        .filter(|m| ends_at_delimiter(text, m.end()));

    delimited.chain(bare_paths).map(|m| m.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_attributes() {
        let text = r#"<a href="/one">x</a><img src='/two.png'>"#;
        let found = extract_candidates(text);
        assert!(found.contains(&"/one"));
        assert!(found.contains(&"/two.png"));
    }

    #[test]
    fn test_bare_absolute_urls() {
        let text = "see https://a.test/docs?x=1 and http://b.test/ for more";
        let found = extract_candidates(text);
        assert!(found.contains(&"https://a.test/docs?x=1"));
        assert!(found.contains(&"http://b.test/"));
    }

    #[test]
    fn test_bare_relative_paths() {
        let text = r#"var routes = ["/pricing", "/blog/latest?page=2"]; go('/contact')"#;
        let found = extract_candidates(text);
        assert!(found.contains(&"/pricing"));
        assert!(found.contains(&"/blog/latest?page=2"));
        assert!(found.contains(&"/contact"));
    }

    #[test]
    fn test_closing_tags_are_not_paths() {
        let found = extract_candidates("<div>text</div><p>more</p>");
        assert!(found.is_empty(), "unexpected candidates: {:?}", found);
    }

    #[test]
    fn test_paths_separated_by_single_spaces() {
        let found = extract_candidates("routes: /a /b /c");
        assert_eq!(found, vec!["/a", "/b", "/c"]);
    }

    #[test]
    fn test_adjacent_quoted_paths() {
        let found = extract_candidates(r#"["/alpha","/beta",'/gamma']"#);
        for path in ["/alpha", "/beta", "/gamma"] {
            assert!(found.contains(&path), "{} missing from {:?}", path, found);
        }
    }

    #[test]
    fn test_undelimited_path_end_is_rejected() {
        let found = extract_candidates("load /app.js then /main.css");
        assert!(found.is_empty(), "unexpected candidates: {:?}", found);
    }

    #[test]
    fn test_empty_text() {
        assert!(extract_candidates("").is_empty());
    }
}
