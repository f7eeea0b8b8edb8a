//! Breadth-first traversal over one origin

use super::aggregator::aggregate;
use super::channel::DiscoveryType;
use super::{DiscoveryError, PageDiscovery};
use crate::url::{normalize, origin_of};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info, warn};

/// A URL found by a traversal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredUrl {
    /// Canonical URL
    pub url: String,
    /// `scheme://host[:port]` of the traversal root
    pub origin: String,
    /// Hops from the traversal root
    pub depth: u32,
    /// Canonical URL of the page it was found on, `None` for the root
    pub discovered_from: Option<String>,
    /// Highest-priority channel that reported it
    pub discovery_type: DiscoveryType,
}

/// Depth and page bounds for one traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraversalLimits {
    /// Maximum depth of any recorded URL (root is depth 0)
    pub max_depth: u32,
    /// Maximum number of distinct pages visited
    pub max_pages: usize,
}

impl TraversalLimits {
    pub fn new(max_depth: u32, max_pages: usize) -> Self {
        Self {
            max_depth,
            max_pages,
        }
    }

    /// Visit only the root and record its direct candidates
    pub fn single_page() -> Self {
        Self::new(1, 1)
    }
}

/// Queued page awaiting a visit
#[derive(Debug)]
struct FrontierEntry {
    url: String,
    depth: u32,
    parent: Option<String>,
}

/// Runs a breadth-first traversal from `start_url`
///
/// # Algorithm
///
/// 1. Canonicalize `start_url` and seed a FIFO queue with it at depth 0
/// 2. While the queue is non-empty and fewer than `max_pages` pages have been
///    visited, dequeue the next entry; skip it if already visited or deeper
///    than `max_depth`
/// 3. Mark it visited and record it (as `dom`) unless already recorded
/// 4. Ask `discovery` for the page's channels; a failure is logged and
///    treated as a page without candidates
/// 5. Merge the channels (see [`aggregate`]) and enqueue every candidate not
///    yet visited or queued at `depth + 1`, recording it first-writer-wins
///
/// Children of a page at `max_depth` are neither enqueued nor recorded, so
/// every recorded entry satisfies `depth <= max_depth`. Such pages are not
/// rendered at all since nothing they report could be kept.
///
/// # Arguments
///
/// * `discovery` - The page-discovery collaborator
/// * `start_url` - Root URL of the traversal
/// * `limits` - Depth and page bounds
///
/// # Returns
///
/// * `Ok(IndexMap)` - Recorded URLs keyed by canonical URL, in discovery order
/// * `Err(DiscoveryError::InvalidStartUrl)` - `start_url` is not a crawlable URL
pub async fn traverse(
    discovery: &dyn PageDiscovery,
    start_url: &str,
    limits: TraversalLimits,
) -> Result<IndexMap<String, DiscoveredUrl>, DiscoveryError> {
    let root = normalize(start_url, start_url)
        .ok_or_else(|| DiscoveryError::InvalidStartUrl(start_url.to_string()))?;
    let origin =
        origin_of(&root).ok_or_else(|| DiscoveryError::InvalidStartUrl(start_url.to_string()))?;

    let mut results: IndexMap<String, DiscoveredUrl> = IndexMap::new();

    if limits.max_pages == 0 {
        return Ok(results);
    }

    let mut visited: HashSet<String> = HashSet::new();
    let mut queued: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<FrontierEntry> = VecDeque::new();

    queued.insert(root.clone());
    queue.push_back(FrontierEntry {
        url: root,
        depth: 0,
        parent: None,
    });

    let mut failed_pages = 0usize;

    while visited.len() < limits.max_pages {
        let Some(entry) = queue.pop_front() else {
            break;
        };

        if visited.contains(&entry.url) || entry.depth > limits.max_depth {
            continue;
        }

        visited.insert(entry.url.clone());
        results
            .entry(entry.url.clone())
            .or_insert_with(|| DiscoveredUrl {
                url: entry.url.clone(),
                origin: origin.clone(),
                depth: entry.depth,
                discovered_from: entry.parent.clone(),
                discovery_type: DiscoveryType::Dom,
            });

        if entry.depth >= limits.max_depth {
            debug!("Reached max depth at {}, not expanding", entry.url);
            continue;
        }

        info!(
            "Visiting {} (depth {}, {}/{} pages)",
            entry.url,
            entry.depth,
            visited.len(),
            limits.max_pages
        );

        let batch = match discovery.discover(&entry.url).await {
            Ok(batch) => batch,
            Err(e) => {
                warn!("Discovery failed for {}: {}", entry.url, e);
                failed_pages += 1;
                continue;
            }
        };

        let child_depth = entry.depth + 1;
        let mut enqueued = 0usize;

        for (candidate, discovery_type) in aggregate(&entry.url, &batch) {
            if visited.contains(&candidate) || queued.contains(&candidate) {
                continue;
            }

            results
                .entry(candidate.clone())
                .or_insert_with(|| DiscoveredUrl {
                    url: candidate.clone(),
                    origin: origin.clone(),
                    depth: child_depth,
                    discovered_from: Some(entry.url.clone()),
                    discovery_type,
                });

            queued.insert(candidate.clone());
            queue.push_back(FrontierEntry {
                url: candidate,
                depth: child_depth,
                parent: Some(entry.url.clone()),
            });
            enqueued += 1;
        }

        debug!("{} new candidates from {}", enqueued, entry.url);
    }

    info!(
        "Traversal of {} finished: {} pages visited, {} failed, {} URLs recorded",
        origin,
        visited.len(),
        failed_pages,
        results.len()
    );

    Ok(results)
}
