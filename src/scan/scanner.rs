//! Media file discovery.

use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::domain::MEDIA_EXTENSIONS;
use crate::error::{Error, Result};

/// Walks files and directories collecting media files.
pub struct MediaScanner {
    extensions: Vec<String>,
    follow_symlinks: bool,
}

impl Default for MediaScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaScanner {
    pub fn new() -> Self {
        Self {
            extensions: MEDIA_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            follow_symlinks: false,
        }
    }

    /// Set file extensions to keep (without the dot, case-insensitive)
    pub fn extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions.into_iter().map(|e| e.trim_start_matches('.').to_lowercase()).collect();
        self
    }

    /// Set whether to follow symbolic links
    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    fn is_media(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .is_some_and(|e| self.extensions.contains(&e))
    }

    /// Media files under `paths`. A path naming a file is kept when it has a
    /// media extension; directories are walked with hidden entries skipped.
    /// The result is sorted by path.
    pub fn scan<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for path in paths {
            let path = path.as_ref();
            if !path.exists() {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{} does not exist", path.display()),
                )));
            }
            if path.is_file() {
                if self.is_media(path) {
                    files.push(path.to_path_buf());
                }
                continue;
            }

            let walker = WalkBuilder::new(path)
                .standard_filters(false)
                .hidden(true)
                .follow_links(self.follow_symlinks)
                .build();
            for entry in walker {
                let entry = match entry {
                    Ok(e) => e,
                    Err(err) => {
                        debug!("skipping unreadable entry: {err}");
                        continue;
                    }
                };
                if entry.file_type().is_some_and(|t| t.is_file()) && self.is_media(entry.path()) {
                    files.push(entry.into_path());
                }
            }
        }
        files.sort();
        files.dedup();
        debug!("discovered {} media files", files.len());
        Ok(files)
    }
}
