//! Reading and writing tags on media files.

pub mod exiftool;
pub mod memory;

pub use exiftool::ExifTool;
pub use memory::MemoryStore;

use std::path::Path;

use crate::domain::{MetadataRecord, WriteSet};
use crate::error::Result;

/// The metadata service the engine reads from and writes back to.
pub trait MetadataStore: Send + Sync {
    fn read_tags(&self, path: &Path) -> Result<MetadataRecord>;

    /// Persist `write_set`; keys not in it are left untouched, empty values delete.
    fn write_tags(&self, path: &Path, write_set: &WriteSet) -> Result<()>;
}
