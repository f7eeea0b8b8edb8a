//! Page-discovery collaborators
//!
//! Two implementations of [`PageDiscovery`]:
//! - `RemoteRenderer`: client of the headless-browser render service, which
//!   reports every channel
//! - `StaticRenderer`: fetches HTML directly and reports the DOM, redirect,
//!   network and heuristic channels only

mod fetcher;
mod parser;
mod remote;

pub use fetcher::{build_http_client, fetch_page, FetchedPage, StaticRenderer};
pub use parser::{parse_html, ParsedPage};
pub use remote::RemoteRenderer;

use crate::config::{RenderConfig, RenderMode};
use crate::discovery::PageDiscovery;
use std::sync::Arc;
use tracing::info;

/// Builds the renderer selected by `[render] mode`
///
/// # Returns
///
/// * `Ok(Arc<dyn PageDiscovery>)` - The configured renderer
/// * `Err(reqwest::Error)` - Failed to build its HTTP client
pub fn build_renderer(config: &RenderConfig) -> Result<Arc<dyn PageDiscovery>, reqwest::Error> {
    match config.mode {
        RenderMode::Remote => {
            info!("Using remote render service at {}", config.service_url);
            Ok(Arc::new(RemoteRenderer::new(config)?))
        }
        RenderMode::Static => {
            info!("Using static HTML renderer");
            Ok(Arc::new(StaticRenderer::new(config)?))
        }
    }
}
