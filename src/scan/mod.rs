//! Media discovery and batch ordering.

pub mod order;
pub mod scanner;

pub use order::order_by_group;
pub use scanner::MediaScanner;

use crate::error::Result;
use std::path::{Path, PathBuf};

/// Media files under `paths`, sorted and deduplicated.
pub fn discover_media<P: AsRef<Path>>(paths: &[P], follow_symlinks: bool) -> Result<Vec<PathBuf>> {
    MediaScanner::new().follow_symlinks(follow_symlinks).scan(paths)
}
