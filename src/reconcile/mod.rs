//! The convergence loop: rule passes over a working copy until nothing moves.

pub mod conflict;
pub mod prompt;
pub mod synth;
pub mod transfer;

pub use conflict::{ConflictError, ConflictOutcome, ConflictResolver};
pub use prompt::{Prompter, RememberingPrompter, SkipPrompter, TerminalPrompter};
pub use synth::PairOutcome;
pub use transfer::{TagTransfer, TransferMode, TransferOutcome};

use chrono::Duration;
use once_cell::sync::Lazy;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

use crate::domain::{MetadataRecord, Namespace, ReconcileConfig, TagKey, TagSelector, TagValue};
use crate::error::{Error, Result};
use crate::location::{LocationOutcome, LocationReconciler, ProviderLocation};
use crate::providers::{ProviderInfo, Providers, SupplierIds};

/// Canonicalising moves, applied in order.
static MOVE_RULES: Lazy<Vec<(TagSelector, TagKey)>> = Lazy::new(|| {
    rules(&[
        (":BaseURL", "XMP:BlogURL"),
        (":ImageDescription", "XMP:Description"),
        ("IPTC:Keywords", "XMP:Subject"),
        (":Artist", "XMP:Artist"),
        (":Source", "XMP:Source"),
        (":UserComment", "XMP:UserComment"),
        (":ImageUnique", "XMP:ImageUniqueID"),
        ("EXIF:CreateDate", "XMP:DateCreated"),
        ("XMP:CreateDate", "XMP:DateCreated"),
        ("QuickTime:CreateDate", "XMP:DateCreated"),
        (":Title", "XMP:Title"),
        (":Description", "XMP:Description"),
        ("QuickTime:Keywords", "XMP:Subject"),
    ])
});

/// Mirrors into the container fields video players read.
static VIDEO_COPY_RULES: Lazy<Vec<(TagSelector, TagKey)>> = Lazy::new(|| {
    rules(&[
        ("XMP:DateCreated", "QuickTime:CreateDate"),
        ("XMP:Title", "QuickTime:Title"),
        ("XMP:Description", "QuickTime:Description"),
        ("XMP:Geography", "Keys:GPSCoordinates"),
        ("XMP:Subject", "QuickTime:Keywords"),
    ])
});

fn rules(pairs: &[(&str, &str)]) -> Vec<(TagSelector, TagKey)> {
    pairs
        .iter()
        .map(|(src, dst)| (src.parse().expect("valid rule"), dst.parse().expect("valid rule")))
        .collect()
}

/// Something a pass could not settle; reported, never fatal.
#[derive(Debug, Clone, PartialEq)]
pub enum Issue {
    AmbiguousSource { destination: TagKey, sources: Vec<(TagKey, TagValue)> },
    UnresolvedConflict { destination: TagKey, source: TagValue, existing: TagValue },
    PairKept { tag: TagKey },
    LocationDiverged { distance_km: f64 },
    LocationUnresolved { query: String },
}

#[derive(Debug, Clone)]
pub struct Reconciled {
    pub record: MetadataRecord,
    pub iterations: usize,
    /// Issues raised by the final pass.
    pub issues: Vec<Issue>,
}

type ProviderMemo = HashMap<SupplierIds, Option<ProviderInfo>>;

pub struct Reconciler<'a> {
    config: &'a ReconcileConfig,
    resolver: ConflictResolver,
    prompter: &'a (dyn Prompter + Sync),
    location: LocationReconciler<'a>,
    providers: Option<&'a Providers>,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        config: &'a ReconcileConfig,
        prompter: &'a (dyn Prompter + Sync),
        location: LocationReconciler<'a>,
        providers: Option<&'a Providers>,
    ) -> Self {
        Self {
            config,
            resolver: ConflictResolver::new(config.local_offset_hours),
            prompter,
            location,
            providers,
        }
    }

    /// Run passes over a copy of `original` until a pass changes nothing.
    pub fn reconcile(&self, original: &MetadataRecord) -> Result<Reconciled> {
        let prompter = RememberingPrompter::new(self.prompter);
        let mut memo = ProviderMemo::new();
        let cap = self.config.max_iterations.max(1);
        let mut current = original.clone();
        let mut issues = Vec::new();

        for iteration in 1..=cap {
            let mut next = current.clone();
            issues = self.pass(&mut next, &prompter, &mut memo)?;
            if next == current {
                debug!("{}: converged after {iteration} passes", original.source().display());
                check_read_only(original, &next)?;
                return Ok(Reconciled { record: next, iterations: iteration, issues });
            }
            current = next;
        }

        if self.config.strict {
            return Err(Error::NotConverged { path: original.source().to_path_buf(), iterations: cap });
        }
        warn!("{}: still changing after {cap} passes, keeping the last one", original.source().display());
        check_read_only(original, &current)?;
        Ok(Reconciled { record: current, iterations: cap, issues })
    }

    fn pass(
        &self,
        record: &mut MetadataRecord,
        prompter: &dyn Prompter,
        memo: &mut ProviderMemo,
    ) -> Result<Vec<Issue>> {
        let mut issues = Vec::new();
        split_keywords(record);

        let mut keywords = BTreeSet::new();
        let mut provided: Option<(String, ProviderLocation)> = None;
        if let Some(ids) = SupplierIds::from_record(record) {
            if let Some(info) = self.provider_info(record, ids.clone(), memo)? {
                for (key, value) in info.tags {
                    if key == TagKey::xmp("Subject") {
                        keywords.extend(value.items());
                    } else {
                        record.set(key, value);
                    }
                }
                keywords.insert(ids.supplier_key());
                provided = info.location.map(|loc| (ids.supplier.clone(), loc));
            }
        }

        let transfer = TagTransfer::new(&self.resolver, prompter, self.config.time_fix);
        for (selector, dest) in MOVE_RULES.iter() {
            let outcome = transfer.transfer(record, selector, dest, TransferMode::Move)?;
            note(&mut issues, dest, outcome);
        }

        merge_subject(record, keywords);

        let outcome = match &provided {
            Some((supplier, location)) => {
                self.location.reconcile(record, Some(location), Some(supplier.as_str()))?
            }
            None => self.location.reconcile(record, None, None)?,
        };
        match outcome {
            LocationOutcome::Diverged { distance_km, .. } => {
                issues.push(Issue::LocationDiverged { distance_km })
            }
            LocationOutcome::Unresolved { query } => issues.push(Issue::LocationUnresolved { query }),
            _ => {}
        }

        synth::assign_raw_file_name(record, &self.config.raw_name_suppliers);
        let title = synth::title(record);
        let description = synth::description(record);
        for (tag, aux, value) in [
            (TagKey::xmp("Title"), TagKey::xmp("Caption"), title),
            (TagKey::xmp("Description"), TagKey::xmp("UserComment"), description),
        ] {
            if synth::assign_pair(record, &tag, &aux, &value, prompter)? == PairOutcome::Kept {
                issues.push(Issue::PairKept { tag });
            }
        }

        if record.is_video() {
            for (selector, dest) in VIDEO_COPY_RULES.iter() {
                let outcome = transfer.transfer(record, selector, dest, TransferMode::Copy)?;
                note(&mut issues, dest, outcome);
            }
            self.container_time_to_utc(record);
        }

        self.fix_up(record);
        Ok(issues)
    }

    fn provider_info(
        &self,
        record: &MetadataRecord,
        ids: SupplierIds,
        memo: &mut ProviderMemo,
    ) -> Result<Option<ProviderInfo>> {
        let Some(providers) = self.providers else {
            return Ok(None);
        };
        if let Some(known) = memo.get(&ids) {
            return Ok(known.clone());
        }
        let info = providers.gather(record.source(), &ids)?;
        memo.insert(ids, info.clone());
        Ok(info)
    }

    /// QuickTime stores UTC; a container date copied from the local
    /// capture time is shifted back by the device offset.
    fn container_time_to_utc(&self, record: &mut MetadataRecord) {
        let container = TagKey::new(Namespace::QuickTime, "CreateDate");
        let local = record.get(&TagKey::xmp("DateCreated")).flat();
        if local.is_empty() || record.get(&container).flat() != local {
            return;
        }
        let stripped = local.strip_suffix(self.resolver.offset_suffix()).unwrap_or(&local);
        match conflict::parse_timestamp(stripped) {
            Some(time) => {
                let utc = time - Duration::hours(i64::from(self.config.local_offset_hours));
                record.set(container, utc.format(conflict::TIMESTAMP_FORMAT).to_string());
            }
            None => debug!("{}: cannot shift {local} to UTC", record.source().display()),
        }
    }

    fn fix_up(&self, record: &mut MetadataRecord) {
        let placeholders: Vec<TagKey> = record
            .iter()
            .filter(|(k, v)| {
                k.namespace != Namespace::File
                    && v.as_text().is_some_and(|t| self.config.placeholder_values.iter().any(|p| p == t))
            })
            .map(|(k, _)| k.clone())
            .collect();
        for key in &placeholders {
            record.clear(key);
        }

        let keywords = TagKey::new(Namespace::QuickTime, "Keywords");
        if let TagValue::List(items) = record.get(&keywords) {
            let joined = items.join(",");
            record.set(keywords, TagValue::text(joined));
        }

        let subject = TagKey::xmp("Subject");
        if let TagValue::List(items) = record.get(&subject) {
            if let [only] = items.as_slice() {
                let only = only.clone();
                record.set(subject, TagValue::text(only));
            }
        }
    }
}

fn split_keywords(record: &mut MetadataRecord) {
    let key = TagKey::new(Namespace::QuickTime, "Keywords");
    if let TagValue::Text(text) = record.get(&key) {
        if text.contains(',') {
            let items = text.split(',').map(str::to_string).collect::<Vec<_>>();
            record.set(key, TagValue::List(items));
        }
    }
}

fn merge_subject(record: &mut MetadataRecord, keywords: BTreeSet<String>) {
    let key = TagKey::xmp("Subject");
    let mut subject: BTreeSet<String> = record.get(&key).items().into_iter().collect();
    subject.extend(keywords);
    if !subject.is_empty() {
        record.set(key, TagValue::List(subject.into_iter().collect()));
    }
}

fn note(issues: &mut Vec<Issue>, dest: &TagKey, outcome: TransferOutcome) {
    match outcome {
        TransferOutcome::Ambiguous { sources } => {
            issues.push(Issue::AmbiguousSource { destination: dest.clone(), sources })
        }
        TransferOutcome::Unresolved { source, destination } => issues.push(Issue::UnresolvedConflict {
            destination: dest.clone(),
            source,
            existing: destination,
        }),
        TransferOutcome::NoSource | TransferOutcome::Applied { .. } => {}
    }
}

fn check_read_only(original: &MetadataRecord, reconciled: &MetadataRecord) -> Result<()> {
    let before: Vec<_> = original.file_tags().collect();
    let after: Vec<_> = reconciled.file_tags().collect();
    if before == after {
        return Ok(());
    }
    let changed = after
        .iter()
        .find(|entry| !before.contains(entry))
        .or_else(|| before.iter().find(|entry| !after.contains(entry)))
        .map(|(k, _)| k.to_string())
        .unwrap_or_default();
    Err(Error::ReadOnlyTagChanged { path: original.source().to_path_buf(), key: changed })
}
