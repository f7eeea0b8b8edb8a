use url::Url;

/// Extensions that network observation picks up incidentally: scripts,
/// styles, fonts, images, audio/video, archives and data files
const STATIC_EXTENSIONS: &[&str] = &[
    ".js", ".mjs", ".css", ".map", ".jpg", ".jpeg", ".png", ".gif", ".svg", ".webp", ".avif",
    ".ico", ".woff", ".woff2", ".ttf", ".otf", ".eot", ".mp4", ".webm", ".mp3", ".wav", ".pdf",
    ".zip", ".tar", ".gz", ".rar", ".7z", ".xml", ".json",
];

/// Raw prefixes that can never be navigated to
const GARBAGE_PREFIXES: &[&str] = &[
    "javascript:",
    "mailto:",
    "tel:",
    "data:",
    "about:",
    "blob:",
    "#",
];

/// Images, video, audio and documents
const MEDIA_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".svg", ".webp", ".avif", ".bmp", ".ico", ".tif", ".tiff",
    ".mp4", ".webm", ".mov", ".avi", ".mkv", ".m3u8", ".mpd", ".mp3", ".wav", ".ogg", ".flac",
    ".aac", ".m4a", ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx",
];

/// Scripts, styles, fonts and source maps
const ASSET_EXTENSIONS: &[&str] = &[
    ".js", ".mjs", ".css", ".woff", ".woff2", ".ttf", ".otf", ".eot", ".map",
];

/// Category assigned by the extension classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlCategory {
    /// A navigable page
    Normal,
    /// Image, video, audio or document
    Media,
    /// Script, stylesheet, font or source map
    Asset,
    /// Not navigable at all
    Garbage,
}

impl UrlCategory {
    /// All categories in reporting order
    pub const ALL: [UrlCategory; 4] = [Self::Normal, Self::Media, Self::Asset, Self::Garbage];

    /// The label used in classification results
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Media => "media",
            Self::Asset => "asset",
            Self::Garbage => "garbage",
        }
    }
}

impl std::fmt::Display for UrlCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns true if the URL path ends with a static-resource extension
pub fn is_static_resource(url: &str) -> bool {
    match Url::parse(url) {
        Ok(url) => has_extension(&url.path().to_ascii_lowercase(), STATIC_EXTENSIONS),
        Err(_) => false,
    }
}

/// Classifies a raw URL by prefix and path extension
///
/// The raw string is checked against the garbage prefixes first; everything
/// else is resolved against `base_url` and sorted by extension. Every input
/// lands in exactly one category.
///
/// # Examples
///
/// ```
/// use url_scout::url::{classify, UrlCategory};
///
/// let base = "https://a.test/";
/// assert_eq!(classify("/about", base), UrlCategory::Normal);
/// assert_eq!(classify("/img/logo.PNG", base), UrlCategory::Media);
/// assert_eq!(classify("/app.js", base), UrlCategory::Asset);
/// assert_eq!(classify("mailto:x@a.test", base), UrlCategory::Garbage);
/// ```
pub fn classify(raw_url: &str, base_url: &str) -> UrlCategory {
    let raw = raw_url.trim();

    if raw.is_empty() || has_garbage_prefix(raw) {
        return UrlCategory::Garbage;
    }

    let resolved = match Url::parse(base_url) {
        Ok(base) => base.join(raw),
        Err(_) => Url::parse(raw),
    };

    let url = match resolved {
        Ok(url) => url,
        Err(_) => return UrlCategory::Garbage,
    };

    if url.scheme() != "http" && url.scheme() != "https" {
        return UrlCategory::Garbage;
    }

    if url.host_str().map_or(true, str::is_empty) {
        return UrlCategory::Garbage;
    }

    let path = url.path().to_ascii_lowercase();

    if has_extension(&path, MEDIA_EXTENSIONS) {
        UrlCategory::Media
    } else if has_extension(&path, ASSET_EXTENSIONS) {
        UrlCategory::Asset
    } else {
        UrlCategory::Normal
    }
}

fn has_garbage_prefix(raw: &str) -> bool {
    GARBAGE_PREFIXES.iter().any(|prefix| {
        raw.get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
    })
}

fn has_extension(lowercase_path: &str, extensions: &[&str]) -> bool {
    extensions.iter().any(|ext| lowercase_path.ends_with(ext))
}
