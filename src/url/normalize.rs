use url::Url;

/// Href prefixes that never denote a navigable page
const DISALLOWED_PREFIXES: &[&str] = &["javascript:", "mailto:", "tel:", "data:", "about:"];

/// Query parameters with this key prefix are tracking noise
const TRACKING_PREFIX: &str = "utm_";

/// Canonicalizes a raw href against the page it was found on
///
/// # Normalization Steps
///
/// 1. Reject empty hrefs, a bare `#`, and non-navigable schemes
///    (`javascript:`, `mailto:`, `tel:`, `data:`, `about:`)
/// 2. Resolve the href against `base`
/// 3. Reject anything that is not `http`/`https` or has no host
/// 4. Remove the fragment
/// 5. Remove `utm_*` query parameters, keeping the others in their original
///    order; drop the query string entirely if nothing is left
///
/// Normalization never fails loudly: any rejection yields `None`.
///
/// # Examples
///
/// ```
/// use url_scout::url::normalize;
///
/// let url = normalize("https://a.test/docs/", "../blog?utm_source=x&page=2#top");
/// assert_eq!(url.as_deref(), Some("https://a.test/blog?page=2"));
///
/// assert_eq!(normalize("https://a.test/", "javascript:void(0)"), None);
/// ```
pub fn normalize(base: &str, href: &str) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href == "#" || has_disallowed_prefix(href) {
        return None;
    }

    let base = Url::parse(base).ok()?;
    let mut url = base.join(href).ok()?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => {}
        _ => return None,
    }

    url.set_fragment(None);

    if let Some(kept) = url.query().map(strip_tracking_params) {
        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.set_query(Some(&kept));
        }
    }

    Some(url.into())
}

/// Checks the raw href against the disallowed scheme prefixes (ASCII
/// case-insensitive)
fn has_disallowed_prefix(href: &str) -> bool {
    DISALLOWED_PREFIXES.iter().any(|prefix| {
        href.get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
    })
}

/// Drops `utm_*` parameters from a raw query string
///
/// Works on the raw `key=value` segments so the encoding of the surviving
/// parameters is left untouched.
fn strip_tracking_params(query: &str) -> String {
    query
        .split('&')
        .filter(|segment| !segment.is_empty())
        .filter(|segment| {
            let key = segment.split('=').next().unwrap_or_default();
            !key.starts_with(TRACKING_PREFIX)
        })
        .collect::<Vec<_>>()
        .join("&")
}
