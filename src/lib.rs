//! url-scout: recurring same-origin URL discovery
//!
//! This crate discovers reachable URLs under an origin by merging the
//! evidence reported by several browser-observable channels, stores them
//! with first/last-seen freshness, and re-runs discovery per configured task
//! on a schedule, handing the stored URLs to a downstream audit service.

pub mod audit;
pub mod classifier;
pub mod config;
pub mod discovery;
pub mod render;
pub mod scheduler;
pub mod service;
pub mod storage;
pub mod task;
pub mod url;

use thiserror::Error;

/// Main error type for url-scout operations
#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("Discovery error: {0}")]
    Discovery(#[from] discovery::DiscoveryError),

    #[error("Invalid task: {0}")]
    InvalidTask(#[from] task::TaskValidationError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Failures of the external services this crate talks to
///
/// These are transient by nature: the caller degrades (an empty page, a
/// fully failed audit batch) instead of aborting the surrounding work.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("{service} request failed: {source}")]
    Http {
        service: &'static str,
        source: reqwest::Error,
    },

    #[error("{service} returned HTTP {status}")]
    Status { service: &'static str, status: u16 },

    #[error("{service} reported failure: {message}")]
    Rejected {
        service: &'static str,
        message: String,
    },

    #[error("{service} response could not be decoded: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },

    #[error("{service} request timed out")]
    Timeout { service: &'static str },
}

impl CollaboratorError {
    /// Wraps a reqwest error, keeping timeouts distinguishable
    pub fn from_reqwest(service: &'static str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { service }
        } else {
            Self::Http { service, source }
        }
    }
}

/// Result type alias for url-scout operations
pub type Result<T> = std::result::Result<T, ScoutError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use discovery::{traverse, DiscoveredUrl, DiscoveryType, TraversalLimits};
pub use scheduler::Scheduler;
pub use task::{DiscoveryTask, NewTask, TaskPatch};
pub use url::{classify, is_same_origin, is_static_resource, normalize, UrlCategory};
