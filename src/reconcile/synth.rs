//! Computed fields: title, description and the raw source filename.

use chrono::{NaiveDate, NaiveDateTime};
use tracing::info;

use super::prompt::Prompter;
use crate::domain::{MetadataRecord, TagKey, TagValue};
use crate::error::Result;

/// `{artist}-{yy-mm-dd}`, or `{artist}-{yy-mm-dd-HHMM}-{series}` for one
/// file of a series. Just the artist when undated.
pub fn title(record: &MetadataRecord) -> String {
    let Some(artist) = record
        .get_str(&TagKey::xmp("Artist"))
        .or_else(|| record.get_str(&TagKey::xmp("ImageSupplierName")))
    else {
        return String::new();
    };
    let Some(created) = record.get_str(&TagKey::xmp("DateCreated")) else {
        return artist;
    };
    let Some(date) = capture_date(&created) else {
        return artist;
    };
    match record.get_str(&TagKey::xmp("SeriesNumber")) {
        Some(sn) => {
            // Files of one post share a date; the time keeps their titles apart.
            let stamp = match capture_time(&created) {
                Some(time) => time.format("%y-%m-%d-%H%M").to_string(),
                None => date.format("%y-%m-%d").to_string(),
            };
            format!("{artist}-{stamp}-{sn}")
        }
        None => format!("{artist}-{}", date.format("%y-%m-%d")),
    }
}

/// Blog text and source URL, separated by two spaces.
pub fn description(record: &MetadataRecord) -> String {
    let text = record
        .get_str(&TagKey::xmp("BlogTitle"))
        .map(|t| t.replace("\r\n", "\t").replace('\n', "\t").trim().to_string())
        .unwrap_or_default();
    let url = record
        .get_str(&TagKey::xmp("BlogURL"))
        .or_else(|| record.get_str(&TagKey::xmp("ImageCreatorID")))
        .unwrap_or_default();
    [text, url].into_iter().filter(|s| !s.is_empty()).collect::<Vec<_>>().join("  ")
}

/// `{supplierId}_{uniqueId}[_{series}].{ext}` for suppliers whose original
/// filenames are reconstructible from ids.
pub fn raw_file_name(record: &MetadataRecord, suppliers: &[String]) -> Option<String> {
    let supplier = record.get_str(&TagKey::xmp("ImageSupplierName"))?;
    if !suppliers.iter().any(|s| *s == supplier) {
        return None;
    }
    let unique_id = record.get_str(&TagKey::xmp("ImageUniqueID"))?;
    let supplier_id = record.get_str(&TagKey::xmp("ImageSupplierID"))?;
    let ext = record
        .get_str(&TagKey::file("FileTypeExtension"))
        .or_else(|| {
            let name = record.file_name();
            name.rsplit_once('.').map(|(_, ext)| ext.to_string())
        })?
        .to_lowercase();

    let mut name = format!("{supplier_id}_{unique_id}");
    if let Some(sn) = record.get_str(&TagKey::xmp("SeriesNumber")) {
        name.push('_');
        name.push_str(&sn);
    }
    Some(format!("{name}.{ext}"))
}

/// Keep a raw filename that differs from the current one; otherwise record
/// the synthesized name, or the current name when nothing can be synthesized.
pub fn assign_raw_file_name(record: &mut MetadataRecord, suppliers: &[String]) {
    let key = TagKey::xmp("RawFileName");
    let current = record.file_name();
    if let Some(existing) = record.get_str(&key) {
        if existing != current {
            return;
        }
    }
    let raw = raw_file_name(record, suppliers).unwrap_or(current);
    record.set(key, raw);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairOutcome {
    AlreadySet,
    Written,
    /// The existing values diverge and were kept.
    Kept,
}

/// Write `value` into a field and its auxiliary mirror without clobbering
/// content the engine did not produce.
pub fn assign_pair(
    record: &mut MetadataRecord,
    tag: &TagKey,
    aux: &TagKey,
    value: &str,
    prompter: &dyn Prompter,
) -> Result<PairOutcome> {
    let path = record.source().display().to_string();
    let current = record.get(tag).flat();
    let mut current_aux = record.get(aux).flat();
    if current == value && current_aux == value {
        return Ok(PairOutcome::AlreadySet);
    }

    if !current_aux.is_empty() && current != current_aux {
        info!("{path}: found unexpected tag {aux}:{current_aux}");
        if !prompter.confirm(&format!("{path} {aux}: discard {current_aux}?"))? {
            return Ok(PairOutcome::Kept);
        }
        current_aux.clear();
    }

    let write = if current == current_aux {
        !value.is_empty() || prompter.confirm(&format!("{path} {tag}: discard {current}?"))?
    } else if current == value {
        true
    } else {
        info!("{path}: {tag} {current} not equal {value} and no {aux} found.");
        prompter.confirm(&format!("{path} {tag}: discard {current} and write {value}?"))?
    };

    if !write {
        return Ok(PairOutcome::Kept);
    }
    record.set(tag.clone(), TagValue::text(value));
    record.set(aux.clone(), TagValue::text(value));
    Ok(PairOutcome::Written)
}

fn capture_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.get(..10)?, "%Y:%m:%d").ok()
}

fn capture_time(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.get(..19)?, "%Y:%m:%d %H:%M:%S").ok()
}
