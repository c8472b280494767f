//! Qualified tag keys (`NS:Name`) and source selectors.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Tag group that produced a value.
///
/// The known groups are the ones the reconciliation rules reason about; any
/// other group reported by the metadata service is carried through verbatim
/// in [`Namespace::Other`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Namespace {
    Exif,
    Xmp,
    Iptc,
    QuickTime,
    Keys,
    Composite,
    File,
    IccProfile,
    MakerNotes,
    Other(String),
}

impl Namespace {
    pub fn as_str(&self) -> &str {
        match self {
            Namespace::Exif => "EXIF",
            Namespace::Xmp => "XMP",
            Namespace::Iptc => "IPTC",
            Namespace::QuickTime => "QuickTime",
            Namespace::Keys => "Keys",
            Namespace::Composite => "Composite",
            Namespace::File => "File",
            Namespace::IccProfile => "ICC_Profile",
            Namespace::MakerNotes => "MakerNotes",
            Namespace::Other(name) => name,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "EXIF" => Namespace::Exif,
            "XMP" => Namespace::Xmp,
            "IPTC" => Namespace::Iptc,
            "QuickTime" => Namespace::QuickTime,
            "Keys" => Namespace::Keys,
            "Composite" => Namespace::Composite,
            "File" => Namespace::File,
            "ICC_Profile" => Namespace::IccProfile,
            "MakerNotes" => Namespace::MakerNotes,
            other => Namespace::Other(other.to_string()),
        }
    }

    /// Groups that are derived or device-owned and must never be written.
    pub fn is_write_protected(&self) -> bool {
        matches!(self, Namespace::IccProfile | Namespace::MakerNotes | Namespace::Composite)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tag name qualified by the namespace that produced it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TagKey {
    pub namespace: Namespace,
    pub name: String,
}

impl TagKey {
    pub fn new(namespace: Namespace, name: impl Into<String>) -> Self {
        Self { namespace, name: name.into() }
    }

    pub fn xmp(name: &str) -> Self {
        Self::new(Namespace::Xmp, name)
    }

    pub fn file(name: &str) -> Self {
        Self::new(Namespace::File, name)
    }
}

impl fmt::Display for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}

impl FromStr for TagKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((ns, name)) if !ns.is_empty() && !name.is_empty() => {
                Ok(TagKey::new(Namespace::parse(ns), name))
            }
            _ => Err(Error::InvalidTagKey(s.to_string())),
        }
    }
}

impl Serialize for TagKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TagKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Picks the members of a tag group that feed one destination.
///
/// `:Artist` matches every namespace's `Artist`; `EXIF:CreateDate` matches
/// only that exact key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSelector {
    pub namespace: Option<Namespace>,
    pub name: String,
}

impl TagSelector {
    pub fn matches(&self, key: &TagKey) -> bool {
        key.name == self.name && self.namespace.as_ref().map_or(true, |ns| *ns == key.namespace)
    }
}

impl FromStr for TagSelector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some(("", name)) if !name.is_empty() => {
                Ok(TagSelector { namespace: None, name: name.to_string() })
            }
            Some((ns, name)) if !name.is_empty() => {
                Ok(TagSelector { namespace: Some(Namespace::parse(ns)), name: name.to_string() })
            }
            _ => Err(Error::InvalidTagKey(s.to_string())),
        }
    }
}

impl fmt::Display for TagSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}:{}", ns, self.name),
            None => write!(f, ":{}", self.name),
        }
    }
}
