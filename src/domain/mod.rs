//! Core data types shared by every stage.

pub mod config;
pub mod key;
pub mod record;
pub mod value;

pub use config::{Config, LocationConfig, ProvidersConfig, ReconcileConfig, RenameConfig, RunConfig};
pub use key::{Namespace, TagKey, TagSelector};
pub use record::{MetadataRecord, WriteSet};
pub use value::TagValue;

/// File extensions the scanner treats as media.
pub const MEDIA_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "heic", "mov", "mp4"];
