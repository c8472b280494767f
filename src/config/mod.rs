//! Configuration loading and merging
//!
//! File settings are discovered next to the media being processed; command-line
//! flags override them (CLI > File > Defaults).

pub mod loader;
pub mod merge;

pub use loader::load_config;
pub use merge::{merge_cli_with_config, CliOverrides};
