//! Recurring discovery tasks
//!
//! The persisted task record, its creation request, the closed set of
//! updatable fields, and their validation.

mod model;

pub use model::{
    default_exclude_suffixes, DiscoveryTask, NewTask, TaskPatch, TaskValidationError,
};

pub(crate) use model::interval_duration;
