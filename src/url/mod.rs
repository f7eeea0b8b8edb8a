//! URL handling module for url-scout
//!
//! This module provides canonicalization of raw hrefs, origin comparison,
//! static-resource detection, the 4-way extension classifier and the
//! suffix matcher used when selecting audit candidates.

mod classify;
mod normalize;
mod origin;
mod suffix;

// Re-export main functions
pub use classify::{classify, is_static_resource, UrlCategory};
pub use normalize::normalize;
pub use origin::{is_same_origin, origin_of, url_path};
pub use suffix::matches_excluded_suffix;
