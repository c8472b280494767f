//! Supplier post/artist lookups merged into a record before reconciliation.

pub mod sqlite;

pub use sqlite::SqliteLookup;

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{MetadataRecord, TagKey, TagValue};
use crate::error::{Error, Result};
use crate::location::ProviderLocation;

/// Identifiers a supplier assigns to a post and its author.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SupplierIds {
    pub supplier: String,
    pub user_id: Option<String>,
    pub unique_id: Option<String>,
    pub series_number: Option<String>,
}

impl SupplierIds {
    pub fn from_record(record: &MetadataRecord) -> Option<Self> {
        let supplier = record.get_str(&TagKey::xmp("ImageSupplierName"))?;
        let user_id = if supplier.eq_ignore_ascii_case("twitter") {
            record.get_str(&TagKey::xmp("ImageCreatorName"))
        } else {
            record.get_str(&TagKey::xmp("ImageSupplierID"))
        };
        Some(Self {
            supplier,
            user_id,
            unique_id: record.get_str(&TagKey::xmp("ImageUniqueID")),
            series_number: record.get_str(&TagKey::xmp("SeriesNumber")),
        })
    }

    pub fn supplier_key(&self) -> String {
        self.supplier.to_lowercase()
    }
}

/// Fields a provider knows about a post or artist.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderInfo {
    pub tags: BTreeMap<TagKey, TagValue>,
    pub location: Option<ProviderLocation>,
}

impl ProviderInfo {
    /// Later lookups override earlier ones; empty values are dropped.
    fn absorb(&mut self, other: ProviderInfo) {
        for (key, value) in other.tags {
            if !value.is_empty() {
                self.tags.insert(key, value);
            }
        }
        if other.location.is_some() {
            self.location = other.location;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.location.is_none()
    }
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Backend(String),
}

pub trait PostLookup: Send + Sync {
    /// Supplier name as written in `XMP:ImageSupplierName`.
    fn supplier(&self) -> &str;

    fn lookup_post(&self, ids: &SupplierIds) -> std::result::Result<ProviderInfo, LookupError>;

    fn lookup_artist(&self, ids: &SupplierIds) -> std::result::Result<ProviderInfo, LookupError>;
}

/// Registry of lookups keyed by lower-cased supplier name.
#[derive(Default)]
pub struct Providers {
    lookups: HashMap<String, Box<dyn PostLookup>>,
}

impl Providers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, lookup: Box<dyn PostLookup>) {
        self.lookups.insert(lookup.supplier().to_lowercase(), lookup);
    }

    /// One lookup per supplier found in the database tables.
    pub fn from_database(path: &Path) -> Result<Self> {
        let mut providers = Self::new();
        for lookup in SqliteLookup::open_all(path)? {
            providers.register(Box::new(lookup));
        }
        debug!("loaded {} supplier providers from {}", providers.len(), path.display());
        Ok(providers)
    }

    pub fn len(&self) -> usize {
        self.lookups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookups.is_empty()
    }

    /// Post fields first, then artist fields on top. `None` when no lookup
    /// is registered for the supplier or nothing was found.
    pub fn gather(&self, source: &Path, ids: &SupplierIds) -> Result<Option<ProviderInfo>> {
        let Some(lookup) = self.lookups.get(&ids.supplier_key()) else {
            return Ok(None);
        };
        let mut merged = ProviderInfo::default();
        let mut ids = ids.clone();

        if ids.unique_id.is_some() {
            if let Some(post) = settle(source, lookup.lookup_post(&ids))? {
                // The post knows its author even when the file does not.
                if let Some(author) = post.tags.get(&TagKey::xmp("ImageSupplierID")) {
                    if !author.is_empty() {
                        ids.user_id = Some(author.flat());
                    }
                }
                merged.absorb(post);
            }
        }
        if ids.user_id.is_some() {
            if let Some(artist) = settle(source, lookup.lookup_artist(&ids))? {
                merged.absorb(artist);
            }
        }

        for (key, value) in merged.tags.iter_mut() {
            if let TagValue::Text(text) = value {
                if text.trim() != text {
                    warn!("{}: provider value for {key} has surrounding whitespace", source.display());
                    *value = TagValue::text(text.trim());
                }
            }
        }
        merged.tags.retain(|_, v| !v.is_empty());
        Ok((!merged.is_empty()).then_some(merged))
    }
}

fn settle(
    source: &Path,
    found: std::result::Result<ProviderInfo, LookupError>,
) -> Result<Option<ProviderInfo>> {
    match found {
        Ok(info) => Ok(Some(info)),
        Err(LookupError::NotFound(what)) => {
            warn!("{}: {what} not found", source.display());
            Ok(None)
        }
        Err(LookupError::Backend(message)) => Err(Error::Provider(message)),
    }
}
