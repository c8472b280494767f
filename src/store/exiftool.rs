//! `exiftool` as the metadata service.

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::{debug, info};

use super::MetadataStore;
use crate::domain::{MetadataRecord, TagValue, WriteSet};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct ExifTool {
    binary: PathBuf,
}

impl Default for ExifTool {
    fn default() -> Self {
        Self::new("exiftool")
    }
}

impl ExifTool {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into() }
    }

    /// Version string of the installed binary.
    pub fn check(&self) -> Result<String> {
        let output = self.run(Path::new("."), &["-ver".to_string()])?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn run(&self, path: &Path, args: &[String]) -> Result<Output> {
        let output = Command::new(&self.binary).args(args).output()?;
        if !output.status.success() {
            return Err(Error::ExifTool {
                path: path.to_path_buf(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }
}

impl MetadataStore for ExifTool {
    fn read_tags(&self, path: &Path) -> Result<MetadataRecord> {
        let args = vec![
            "-j".to_string(),
            "-G".to_string(),
            "-n".to_string(),
            path.to_string_lossy().to_string(),
        ];
        let output = self.run(path, &args)?;
        let parsed: Value = serde_json::from_slice(&output.stdout)?;
        let first = parsed.as_array().and_then(|items| items.first()).ok_or_else(|| {
            Error::ExifTool { path: path.to_path_buf(), message: "no metadata returned".to_string() }
        })?;
        MetadataRecord::from_json(first)
    }

    fn write_tags(&self, path: &Path, write_set: &WriteSet) -> Result<()> {
        if write_set.is_empty() {
            debug!("{}: nothing to write", path.display());
            return Ok(());
        }
        let mut args = write_args(write_set);
        args.push(path.to_string_lossy().to_string());
        self.run(path, &args)?;
        info!("{}: wrote {} tags", path.display(), write_set.len());
        Ok(())
    }
}

/// `-TAG=VALUE` assignments; list items repeat the assignment.
fn write_args(write_set: &WriteSet) -> Vec<String> {
    let mut args = vec!["-overwrite_original".to_string(), "-n".to_string()];
    for (key, value) in write_set {
        match value {
            TagValue::List(items) if !items.is_empty() => {
                args.extend(items.iter().map(|item| format!("-{key}={item}")));
            }
            other => args.push(format!("-{key}={}", other.flat())),
        }
    }
    args
}
