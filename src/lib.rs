//! Metadata tag reconciliation and collision-safe renaming for media files.

pub mod cli;
pub mod config;
pub mod diff;
pub mod domain;
pub mod error;
pub mod location;
pub mod pipeline;
pub mod providers;
pub mod reconcile;
pub mod rename;
pub mod scan;
pub mod store;

pub use error::{Error, Result};
