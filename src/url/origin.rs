use url::Url;

/// Checks whether two URLs share scheme, host and port
///
/// Hosts compare case-insensitively (the `url` crate lowercases them while
/// parsing) and a missing port equals the scheme's default port. Anything
/// that fails to parse, or has no host, is never same-origin.
///
/// # Examples
///
/// ```
/// use url_scout::url::is_same_origin;
///
/// assert!(is_same_origin("https://a.test/", "https://A.TEST:443/x"));
/// assert!(!is_same_origin("https://a.test/", "http://a.test/"));
/// assert!(!is_same_origin("https://a.test/", "https://b.test/"));
/// ```
pub fn is_same_origin(a: &str, b: &str) -> bool {
    match (Url::parse(a), Url::parse(b)) {
        (Ok(a), Ok(b)) => same_origin(&a, &b),
        _ => false,
    }
}

fn same_origin(a: &Url, b: &Url) -> bool {
    let (Some(host_a), Some(host_b)) = (a.host_str(), b.host_str()) else {
        return false;
    };

    a.scheme() == b.scheme()
        && host_a.eq_ignore_ascii_case(host_b)
        && a.port_or_known_default() == b.port_or_known_default()
}

/// Returns the `scheme://host[:port]` origin of a URL
///
/// `None` if the URL does not parse or has no host.
pub fn origin_of(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    url.host_str()?;
    Some(url.origin().ascii_serialization())
}

/// Returns the path component of a URL, `/` when it is empty or unparseable
pub fn url_path(url: &str) -> String {
    match Url::parse(url) {
        Ok(url) if !url.path().is_empty() => url.path().to_string(),
        _ => "/".to_string(),
    }
}
