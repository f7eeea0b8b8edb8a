//! Storage module for persisting discovery data
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Recurring task records and their scheduling state
//! - Discovered URLs with first/last-seen freshness
//! - Ad-hoc crawl run records

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{StorageError, StorageResult, TaskStore, UrlStore};

use crate::discovery::{DiscoveredUrl, DiscoveryType};
use crate::url::url_path;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::path::Path;

/// Initializes or opens the store
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStore)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to open or initialize the database
pub fn open_store(path: &Path) -> StorageResult<SqliteStore> {
    SqliteStore::new(path)
}

/// Formats a timestamp the way it is stored
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A URL to upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlRecord {
    pub origin: String,
    pub url: String,
    pub depth: u32,
    pub discovered_from: Option<String>,
    pub discovery_type: DiscoveryType,
    pub source_type: Option<String>,
    pub tags: Option<String>,
}

impl UrlRecord {
    /// Builds a record from a traversal result
    pub fn from_discovered(
        discovered: &DiscoveredUrl,
        source_type: Option<&str>,
        tags: Option<&str>,
    ) -> Self {
        Self {
            origin: discovered.origin.clone(),
            url: discovered.url.clone(),
            depth: discovered.depth,
            discovered_from: discovered.discovered_from.clone(),
            discovery_type: discovered.discovery_type,
            source_type: source_type.map(str::to_string),
            tags: tags.map(str::to_string),
        }
    }

    /// Path component stored alongside the URL
    pub fn url_path(&self) -> String {
        url_path(&self.url)
    }
}

/// A persisted URL row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredUrl {
    pub id: i64,
    pub origin: String,
    pub url: String,
    pub url_path: String,
    pub depth: u32,
    pub discovered_from: Option<String>,
    pub discovery_type: DiscoveryType,
    pub source_type: Option<String>,
    pub tags: Option<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// Status of an ad-hoc crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlRunStatus {
    Running,
    Completed,
    Failed,
}

impl CrawlRunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// An ad-hoc crawl record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrawlRun {
    pub id: i64,
    pub origin: String,
    pub start_url: String,
    pub max_depth: u32,
    pub max_pages: usize,
    pub status: CrawlRunStatus,
    pub total_urls: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}
