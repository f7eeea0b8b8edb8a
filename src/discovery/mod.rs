//! URL discovery for url-scout
//!
//! This module contains the discovery core:
//! - `channel`: discovery channels, their merge priority and raw batches
//! - `heuristic`: regex extraction from page text
//! - `aggregator`: per-page multi-channel merge
//! - `frontier`: breadth-first traversal bounded by depth and page count
//!
//! Rendering itself is a collaborator behind the [`PageDiscovery`] trait;
//! see `crate::render` for the implementations.

mod aggregator;
mod channel;
mod frontier;
mod heuristic;

pub use aggregator::aggregate;
pub use channel::{ChannelBatch, DiscoveryType};
pub use frontier::{traverse, DiscoveredUrl, TraversalLimits};
pub use heuristic::extract_candidates;

use crate::CollaboratorError;
use async_trait::async_trait;
use thiserror::Error;

/// Errors returned by a traversal
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Invalid start URL: {0}")]
    InvalidStartUrl(String),
}

/// Reports the raw per-channel URLs observed while visiting one page
#[async_trait]
pub trait PageDiscovery: Send + Sync {
    /// Visits `url` and returns what each channel observed
    ///
    /// # Errors
    ///
    /// Any failure (transport, timeout, non-success response) is a
    /// `CollaboratorError`; callers treat it as a page with no candidates.
    async fn discover(&self, url: &str) -> Result<ChannelBatch, CollaboratorError>;
}
