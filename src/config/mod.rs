//! Configuration module for url-scout
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use url_scout::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("scout.toml")).unwrap();
//! println!("Audit endpoint: {}", config.audit.endpoint);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    AuditConfig, ClassifierConfig, Config, CrawlerConfig, DatabaseConfig, DiscoveryMode,
    RenderConfig, RenderMode, SchedulerConfig, UrlsConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
