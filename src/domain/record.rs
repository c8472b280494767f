//! The metadata record of one media file.

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::key::{Namespace, TagKey, TagSelector};
use super::value::TagValue;
use crate::error::{Error, Result};

pub const FILE_NAME: &str = "FileName";
pub const MIME_TYPE: &str = "MIMEType";

const VIDEO_MIME_TYPES: &[&str] = &["video/mp4", "video/quicktime"];

/// Qualified tags of one file, iterated in key order.
///
/// `File:FileName` and `File:MIMEType` are always present.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRecord {
    source: PathBuf,
    tags: BTreeMap<TagKey, TagValue>,
}

/// Tags that must be persisted to bring a file in line with its reconciled record.
pub type WriteSet = BTreeMap<TagKey, TagValue>;

impl MetadataRecord {
    pub fn new(source: impl Into<PathBuf>, tags: BTreeMap<TagKey, TagValue>) -> Result<Self> {
        let source = source.into();
        for required in [FILE_NAME, MIME_TYPE] {
            let key = TagKey::file(required);
            if tags.get(&key).map_or(true, TagValue::is_empty) {
                return Err(Error::MissingRequiredTag { path: source, key: key.to_string() });
            }
        }
        Ok(Self { source, tags })
    }

    /// Build a record from one object of `exiftool -j -G` output.
    pub fn from_json(object: &Value) -> Result<Self> {
        let map = object
            .as_object()
            .ok_or_else(|| Error::MalformedMetadata("expected a JSON object".to_string()))?;
        let source = map
            .get("SourceFile")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MalformedMetadata("missing SourceFile".to_string()))?;

        let mut tags = BTreeMap::new();
        for (raw_key, raw_value) in map {
            if raw_key == "SourceFile" {
                continue;
            }
            match raw_key.parse::<TagKey>() {
                Ok(key) => {
                    tags.insert(key, TagValue::from_json(raw_value));
                }
                Err(_) => tracing::debug!("{source}: ignoring ungrouped tag {raw_key}"),
            }
        }
        Self::new(source, tags)
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn file_name(&self) -> String {
        self.get(&TagKey::file(FILE_NAME)).flat()
    }

    pub fn mime_type(&self) -> String {
        self.get(&TagKey::file(MIME_TYPE)).flat()
    }

    pub fn is_video(&self) -> bool {
        VIDEO_MIME_TYPES.contains(&self.mime_type().as_str())
    }

    pub fn get(&self, key: &TagKey) -> &TagValue {
        static EMPTY: TagValue = TagValue::Empty;
        self.tags.get(key).unwrap_or(&EMPTY)
    }

    /// Non-empty flat string value of `key`.
    pub fn get_str(&self, key: &TagKey) -> Option<String> {
        let value = self.get(key);
        if value.is_empty() {
            None
        } else {
            Some(value.flat())
        }
    }

    pub fn contains(&self, key: &TagKey) -> bool {
        self.tags.contains_key(key)
    }

    pub fn set(&mut self, key: TagKey, value: impl Into<TagValue>) {
        self.tags.insert(key, value.into());
    }

    /// Clear `key` if it is present; absent keys stay absent.
    pub fn clear(&mut self, key: &TagKey) {
        if let Some(value) = self.tags.get_mut(key) {
            *value = TagValue::Empty;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TagKey, &TagValue)> {
        self.tags.iter()
    }

    /// Non-empty members of the group selected by `selector`, excluding `exclude`.
    pub fn select(&self, selector: &TagSelector, exclude: &TagKey) -> Vec<(TagKey, TagValue)> {
        self.tags
            .iter()
            .filter(|(k, v)| selector.matches(k) && *k != exclude && !v.is_empty())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn file_tags(&self) -> impl Iterator<Item = (&TagKey, &TagValue)> {
        self.tags.iter().filter(|(k, _)| k.namespace == Namespace::File)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}
