//! Recurring task execution
//!
//! This module handles:
//! - Polling the task store for due tasks
//! - Single-flight execution per task id
//! - The discovery, persistence and audit pass run for each task
//! - Rescheduling after every execution, failed or not
//! - Graceful shutdown with a bounded grace period

#[cfg(test)]
pub(crate) mod fakes;
mod persist;
mod pipeline;
mod runner;

pub use persist::persist_urls;
pub use pipeline::{AuditTarget, Pipeline};
pub use runner::Scheduler;

use crate::config::{Config, CrawlerConfig, DiscoveryMode, SchedulerConfig};
use crate::discovery::TraversalLimits;
use std::time::Duration;

/// Runtime settings of the scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Pause between polls
    pub poll_interval: Duration,
    /// Pause after a failed poll
    pub error_backoff: Duration,
    /// Single-page discovery or a bounded traversal per execution
    pub discovery: DiscoveryMode,
    /// Bounds used in traversal mode
    pub crawl_limits: TraversalLimits,
}

impl SchedulerSettings {
    /// Builds settings from the `[scheduler]` and `[crawler]` sections
    pub fn from_config(config: &Config) -> Self {
        Self::from_sections(&config.scheduler, &config.crawler)
    }

    fn from_sections(scheduler: &SchedulerConfig, crawler: &CrawlerConfig) -> Self {
        Self {
            poll_interval: scheduler.poll_interval(),
            error_backoff: scheduler.error_backoff(),
            discovery: scheduler.discovery,
            crawl_limits: TraversalLimits::new(crawler.max_depth, crawler.max_pages),
        }
    }

    /// Limits applied to each task execution
    pub fn execution_limits(&self) -> TraversalLimits {
        match self.discovery {
            DiscoveryMode::SinglePage => TraversalLimits::single_page(),
            DiscoveryMode::Traversal => self.crawl_limits,
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self::from_sections(&SchedulerConfig::default(), &CrawlerConfig::default())
    }
}
