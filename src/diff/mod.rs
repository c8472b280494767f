//! Minimal write-sets and their audit rendering.

use console::style;
use std::fmt::Write as _;
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::domain::{MetadataRecord, TagKey, TagValue, WriteSet};
use crate::error::{Error, Result};
use crate::location::geo;

/// Tags that must be written to bring the file in line with `reconciled`.
///
/// Keys already equal under [`TagValue::loosely_equals`] are left out, as are
/// unset keys that stay unset. Protected namespaces are never written; a
/// non-empty change to one is refused.
pub fn diff(reconciled: &MetadataRecord, original: &MetadataRecord) -> Result<WriteSet> {
    let mut write_set = WriteSet::new();
    for (key, value) in reconciled.iter() {
        if !original.contains(key) {
            if value.is_empty() {
                continue;
            }
        } else if original.get(key).loosely_equals(value) {
            continue;
        }
        if key.namespace.is_write_protected() {
            if value.is_empty() {
                continue;
            }
            return Err(Error::ForbiddenWrite {
                path: reconciled.source().to_path_buf(),
                key: key.to_string(),
            });
        }
        write_set.insert(key.clone(), value.clone());
    }
    Ok(write_set)
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiffEntry {
    pub key: TagKey,
    pub old: TagValue,
    pub new: TagValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoShiftLevel {
    Info,
    Warning,
    Error,
}

impl GeoShiftLevel {
    pub fn classify(distance_km: f64) -> Self {
        if distance_km < 1.0 {
            GeoShiftLevel::Info
        } else if distance_km <= 20.0 {
            GeoShiftLevel::Warning
        } else {
            GeoShiftLevel::Error
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeoShift {
    pub distance_km: f64,
    pub level: GeoShiftLevel,
}

/// Per-file audit view of a write-set.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffView {
    pub path: PathBuf,
    pub entries: Vec<DiffEntry>,
    pub geo_shift: Option<GeoShift>,
}

pub fn show_diff(original: &MetadataRecord, write_set: &WriteSet) -> DiffView {
    let entries = write_set
        .iter()
        .map(|(key, new)| DiffEntry { key: key.clone(), old: original.get(key).clone(), new: new.clone() })
        .collect();

    let geography = TagKey::xmp("Geography");
    let geo_shift = write_set.get(&geography).and_then(|new| {
        let before = geo::parse_pair(original.get(&geography))?;
        let after = geo::parse_pair(new)?;
        let distance_km = geo::distance_km(before, after);
        Some(GeoShift { distance_km, level: GeoShiftLevel::classify(distance_km) })
    });

    DiffView { path: original.source().to_path_buf(), entries, geo_shift }
}

impl DiffView {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Report the geography move at the level its distance calls for.
    pub fn log_geo_shift(&self) {
        let Some(shift) = &self.geo_shift else {
            return;
        };
        let path = self.path.display();
        match shift.level {
            GeoShiftLevel::Info => info!("{path}: geography moved {:.3}km", shift.distance_km),
            GeoShiftLevel::Warning => warn!("{path}: geography moved {:.3}km", shift.distance_km),
            GeoShiftLevel::Error => error!("{path}: geography moved {:.3}km", shift.distance_km),
        }
    }

    pub fn render(&self, color: bool) -> String {
        let mut out = String::new();
        let header = self.path.display().to_string();
        let _ = writeln!(out, "{}", paint(color, &header, |s| style(s).bold().underlined().to_string()));
        for entry in &self.entries {
            if !entry.old.is_empty() {
                let line = format!("- {}: {}", entry.key, entry.old);
                let _ = writeln!(out, "{}", paint(color, &line, |s| style(s).red().to_string()));
            }
            if !entry.new.is_empty() {
                let line = format!("+ {}: {}", entry.key, entry.new);
                let _ = writeln!(out, "{}", paint(color, &line, |s| style(s).green().to_string()));
            }
        }
        if let Some(shift) = &self.geo_shift {
            let _ = writeln!(out, "~ geography moved {:.3}km", shift.distance_km);
        }
        out
    }
}

fn paint(color: bool, text: &str, styled: impl Fn(&str) -> String) -> String {
    if color {
        styled(text)
    } else {
        text.to_string()
    }
}
