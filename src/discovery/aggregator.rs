//! Merges the channels of one page visit into a single candidate list

use super::channel::{ChannelBatch, DiscoveryType};
use super::heuristic::extract_candidates;
use crate::url::{is_same_origin, is_static_resource, normalize};
use std::collections::HashSet;
use tracing::debug;

/// Merges per-channel raw candidates of one page visit
///
/// # Filtering
///
/// Every raw candidate is normalized against `page_url`; failures are
/// dropped silently. All channels require the candidate to share the page's
/// origin, and every channel except DOM anchors also drops static
/// resources. Heuristic entries are page text: they are scanned first and
/// each extracted match is filtered independently.
///
/// # Merge Policy
///
/// Channels are processed in priority order and each channel's entries in
/// their given order. A URL produced by several channels is returned once,
/// tagged with the highest-priority channel, at the position of its first
/// appearance. The page itself is never a candidate.
///
/// # Arguments
///
/// * `page_url` - Canonical URL of the visited page
/// * `batch` - Raw channel output for the visit
///
/// # Returns
///
/// Ordered `(canonical_url, discovery_type)` pairs
pub fn aggregate(page_url: &str, batch: &ChannelBatch) -> Vec<(String, DiscoveryType)> {
    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(page_url.to_string());

    let mut merged = Vec::new();

    for (channel, entries) in batch.iter() {
        let before = merged.len();
        let mut rejected = 0usize;

        for raw in channel_candidates(channel, entries) {
            match accept(page_url, channel, raw) {
                Some(canonical) => {
                    if seen.insert(canonical.clone()) {
                        merged.push((canonical, channel));
                    }
                }
                None => rejected += 1,
            }
        }

        debug!(
            "Channel {} on {}: {} new, {} rejected",
            channel,
            page_url,
            merged.len() - before,
            rejected
        );
    }

    merged
}

/// Expands a channel's entries into raw candidate strings
fn channel_candidates<'a>(channel: DiscoveryType, entries: &'a [String]) -> Vec<&'a str> {
    match channel {
        DiscoveryType::Heuristic => entries
            .iter()
            .flat_map(|text| extract_candidates(text))
            .collect(),
        _ => entries.iter().map(String::as_str).collect(),
    }
}

/// Normalizes and filters one raw candidate
fn accept(page_url: &str, channel: DiscoveryType, raw: &str) -> Option<String> {
    let canonical = normalize(page_url, raw)?;

    if !is_same_origin(page_url, &canonical) {
        return None;
    }

    if channel.rejects_static_resources() && is_static_resource(&canonical) {
        return None;
    }

    Some(canonical)
}
