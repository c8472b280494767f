//! Library error type.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid tag key '{0}' (expected NS:Name)")]
    InvalidTagKey(String),

    #[error("malformed metadata: {0}")]
    MalformedMetadata(String),

    #[error("{}: required tag {key} is missing", path.display())]
    MissingRequiredTag { path: PathBuf, key: String },

    #[error("{}: read-only tag {key} was modified during reconciliation", path.display())]
    ReadOnlyTagChanged { path: PathBuf, key: String },

    #[error("{}: tags did not converge after {iterations} passes", path.display())]
    NotConverged { path: PathBuf, iterations: usize },

    #[error("{}: refusing to write protected tag {key}", path.display())]
    ForbiddenWrite { path: PathBuf, key: String },

    #[error("companion target already exists: {}", .0.display())]
    CompanionExists(PathBuf),

    #[error(
        "{} was moved to {} but its companion {} could not follow: {source}",
        from.display(), to.display(), companion.display()
    )]
    PartialRename { from: PathBuf, to: PathBuf, companion: PathBuf, source: std::io::Error },

    #[error("exiftool failed on {}: {message}", path.display())]
    ExifTool { path: PathBuf, message: String },

    #[error("geocoder error: {0}")]
    Geocoder(String),

    #[error("prompt failed: {0}")]
    Prompt(String),

    #[error("provider lookup failed: {0}")]
    Provider(String),

    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

impl Error {
    /// Broken invariants are fatal for the file they occurred on.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Error::ReadOnlyTagChanged { .. }
                | Error::NotConverged { .. }
                | Error::ForbiddenWrite { .. }
                | Error::CompanionExists(_)
                | Error::PartialRename { .. }
        )
    }
}
