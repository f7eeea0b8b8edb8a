//! Discovery channels and their merge priority

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// The channel through which a URL was observed
///
/// Declaration order is merge priority (highest first), and `Ord` follows
/// it, so iterating a `BTreeMap<DiscoveryType, _>` visits channels in
/// priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryType {
    /// `<a href>` anchors (and canonical links) in the rendered DOM
    Dom,
    /// `Location` headers of HTTP redirects
    Redirect,
    /// Outgoing network requests made by the page
    Network,
    /// SPA route-change notifications
    Spa,
    /// Navigations triggered by simulated interaction
    Interaction,
    /// Resource timing entries from the JS runtime
    JsRuntime,
    /// Regex scan of the page text
    Heuristic,
}

impl DiscoveryType {
    /// All channels, highest priority first
    pub const PRIORITY: [DiscoveryType; 7] = [
        Self::Dom,
        Self::Redirect,
        Self::Network,
        Self::Spa,
        Self::Interaction,
        Self::JsRuntime,
        Self::Heuristic,
    ];

    /// Returns the stored string form
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dom => "dom",
            Self::Redirect => "redirect",
            Self::Network => "network",
            Self::Spa => "spa",
            Self::Interaction => "interaction",
            Self::JsRuntime => "js_runtime",
            Self::Heuristic => "heuristic",
        }
    }

    /// Position in the merge order, 0 being the strongest evidence
    pub fn priority(&self) -> usize {
        *self as usize
    }

    /// Whether candidates from this channel must also be non-static
    ///
    /// Only DOM anchors may legitimately point at assets; every other
    /// channel picks them up incidentally.
    pub fn rejects_static_resources(&self) -> bool {
        !matches!(self, Self::Dom)
    }

    /// Maps a channel name reported by a render service to a type
    ///
    /// Matching is case-insensitive and accepts the common aliases.
    pub fn from_channel_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "dom" | "anchor" | "anchors" | "dom_anchor" => Some(Self::Dom),
            "redirect" | "redirects" => Some(Self::Redirect),
            "network" | "request" | "requests" => Some(Self::Network),
            "spa" | "spa_navigation" | "navigation" => Some(Self::Spa),
            "interaction" | "click" => Some(Self::Interaction),
            "js_runtime" | "runtime" | "resource" => Some(Self::JsRuntime),
            "heuristic" | "text" => Some(Self::Heuristic),
            _ => None,
        }
    }
}

impl fmt::Display for DiscoveryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiscoveryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_channel_name(s).ok_or_else(|| format!("unknown discovery type: {}", s))
    }
}

/// Raw per-channel output of one page visit
///
/// Entries are raw hrefs/URLs, except for the heuristic channel whose
/// entries are page text to be scanned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelBatch {
    channels: BTreeMap<DiscoveryType, Vec<String>>,
}

impl ChannelBatch {
    /// Creates an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a batch from named channel lists as reported by a render
    /// service
    ///
    /// Lists whose names alias the same channel are concatenated in the
    /// order given. Unknown channel names are ignored.
    pub fn from_named<I, S>(named: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<String>)>,
        S: AsRef<str>,
    {
        let mut batch = Self::new();
        for (name, entries) in named {
            match DiscoveryType::from_channel_name(name.as_ref()) {
                Some(channel) => batch.extend(channel, entries),
                None => debug!(
                    "Ignoring unknown discovery channel '{}' ({} entries)",
                    name.as_ref(),
                    entries.len()
                ),
            }
        }
        batch
    }

    /// Appends one raw entry to a channel
    pub fn push(&mut self, channel: DiscoveryType, entry: impl Into<String>) {
        self.channels.entry(channel).or_default().push(entry.into());
    }

    /// Appends raw entries to a channel
    pub fn extend<I>(&mut self, channel: DiscoveryType, entries: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.channels
            .entry(channel)
            .or_default()
            .extend(entries.into_iter().map(Into::into));
    }

    /// Returns the raw entries of one channel
    pub fn get(&self, channel: DiscoveryType) -> &[String] {
        self.channels
            .get(&channel)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Iterates over non-empty channels in priority order
    pub fn iter(&self) -> impl Iterator<Item = (DiscoveryType, &[String])> {
        self.channels
            .iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(channel, entries)| (*channel, entries.as_slice()))
    }

    /// Total number of raw entries across channels
    pub fn len(&self) -> usize {
        self.channels.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<IndexMap<String, Vec<String>>> for ChannelBatch {
    fn from(named: IndexMap<String, Vec<String>>) -> Self {
        Self::from_named(named)
    }
}
