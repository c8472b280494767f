//! Moving or copying one tag group into its canonical destination.

use tracing::{debug, info, warn};

use super::conflict::{ConflictOutcome, ConflictResolver};
use super::prompt::Prompter;
use crate::domain::{MetadataRecord, TagKey, TagSelector, TagValue};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// Write the destination and clear every source.
    Move,
    /// Write the destination and leave the sources alone.
    Copy,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransferOutcome {
    NoSource,
    Applied { value: TagValue, conflict: Option<ConflictOutcome> },
    /// Sources disagree among themselves.
    Ambiguous { sources: Vec<(TagKey, TagValue)> },
    /// Source and destination disagree and nothing settled it.
    Unresolved { source: TagValue, destination: TagValue },
}

pub struct TagTransfer<'a> {
    resolver: &'a ConflictResolver,
    prompter: &'a dyn Prompter,
    time_fix: bool,
}

impl<'a> TagTransfer<'a> {
    pub fn new(resolver: &'a ConflictResolver, prompter: &'a dyn Prompter, time_fix: bool) -> Self {
        Self { resolver, prompter, time_fix }
    }

    pub fn transfer(
        &self,
        record: &mut MetadataRecord,
        selector: &TagSelector,
        dest: &TagKey,
        mode: TransferMode,
    ) -> Result<TransferOutcome> {
        let sources = record.select(selector, dest);
        let Some((_, first)) = sources.first() else {
            return Ok(TransferOutcome::NoSource);
        };
        let source_value = first.clone();
        if sources.iter().any(|(_, v)| !v.agrees_with(&source_value)) {
            warn!(
                "{}: multiple values for {selector} => {}",
                record.source().display(),
                describe(&sources)
            );
            return Ok(TransferOutcome::Ambiguous { sources });
        }

        let dest_value = record.get(dest).clone();
        let (winner, conflict) = if dest_value.is_empty() || dest_value.agrees_with(&source_value) {
            (source_value, None)
        } else {
            match self.settle(record, &sources, dest, &source_value, &dest_value)? {
                Some(settled) => settled,
                None => {
                    return Ok(TransferOutcome::Unresolved {
                        source: source_value,
                        destination: dest_value,
                    })
                }
            }
        };

        record.set(dest.clone(), winner.clone());
        if mode == TransferMode::Move {
            for (key, _) in &sources {
                record.clear(key);
            }
        }
        Ok(TransferOutcome::Applied { value: winner, conflict })
    }

    fn settle(
        &self,
        record: &MetadataRecord,
        sources: &[(TagKey, TagValue)],
        dest: &TagKey,
        source_value: &TagValue,
        dest_value: &TagValue,
    ) -> Result<Option<(TagValue, Option<ConflictOutcome>)>> {
        let path = record.source().display();
        let err = match self.resolver.resolve(&source_value.flat(), &dest_value.flat()) {
            Ok(value) => {
                let value = TagValue::text(value);
                return Ok(Some((value.clone(), Some(ConflictOutcome::ResolvedTimeEquivalent(value)))));
            }
            Err(err) => err,
        };
        if err.is_time() && !self.time_fix {
            debug!("{path}: {dest} left alone ({err})");
            return Ok(None);
        }

        info!("{path}: {} not equal {dest} {dest_value}", describe(sources));
        let question = format!("{path} {dest}: conflicting values, which one to keep?");
        let candidates = [source_value.clone(), dest_value.clone()];
        Ok(match self.prompter.choose(&question, &candidates)? {
            Some(0) => Some((source_value.clone(), Some(ConflictOutcome::KeepSource))),
            Some(_) => Some((dest_value.clone(), Some(ConflictOutcome::KeepDestination))),
            None => None,
        })
    }
}

fn describe(sources: &[(TagKey, TagValue)]) -> String {
    sources.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::prompt::testing::ScriptedPrompter;
    use crate::reconcile::prompt::SkipPrompter;
    use crate::reconcile::testing::record;

    fn key(s: &str) -> TagKey {
        s.parse().unwrap()
    }

    fn sel(s: &str) -> TagSelector {
        s.parse().unwrap()
    }

    #[test]
    fn moves_single_source_and_clears_it() {
        let resolver = ConflictResolver::new(8);
        let unit = TagTransfer::new(&resolver, &SkipPrompter, false);
        let mut rec = record(&[("EXIF:Artist", "Alice"), ("XMP:Artist", "")]);

        let outcome =
            unit.transfer(&mut rec, &sel(":Artist"), &key("XMP:Artist"), TransferMode::Move).unwrap();

        assert!(matches!(outcome, TransferOutcome::Applied { conflict: None, .. }));
        assert_eq!(rec.get(&key("XMP:Artist")), &TagValue::from("Alice"));
        assert!(rec.get(&key("EXIF:Artist")).is_empty());
        assert!(rec.contains(&key("EXIF:Artist")));
    }

    #[test]
    fn copy_keeps_sources() {
        let resolver = ConflictResolver::new(8);
        let unit = TagTransfer::new(&resolver, &SkipPrompter, false);
        let mut rec = record(&[("XMP:Title", "T")]);

        unit.transfer(&mut rec, &sel("XMP:Title"), &key("QuickTime:Title"), TransferMode::Copy)
            .unwrap();

        assert_eq!(rec.get(&key("QuickTime:Title")), &TagValue::from("T"));
        assert_eq!(rec.get(&key("XMP:Title")), &TagValue::from("T"));
    }

    #[test]
    fn disagreeing_sources_abort() {
        let resolver = ConflictResolver::new(8);
        let unit = TagTransfer::new(&resolver, &SkipPrompter, false);
        let mut rec = record(&[("EXIF:Artist", "Alice"), ("IPTC:Artist", "Bob")]);
        let before = rec.clone();

        let outcome =
            unit.transfer(&mut rec, &sel(":Artist"), &key("XMP:Artist"), TransferMode::Move).unwrap();

        assert!(matches!(outcome, TransferOutcome::Ambiguous { .. }));
        assert_eq!(rec, before);
    }

    #[test]
    fn shifted_timestamp_resolves_to_local_time() {
        let resolver = ConflictResolver::new(8);
        let unit = TagTransfer::new(&resolver, &SkipPrompter, false);
        let mut rec = record(&[
            ("XMP:DateCreated", "2020:01:01 10:00:00"),
            ("QuickTime:CreateDate", "2020:01:01 02:00:00"),
        ]);

        let outcome = unit
            .transfer(
                &mut rec,
                &sel("QuickTime:CreateDate"),
                &key("XMP:DateCreated"),
                TransferMode::Move,
            )
            .unwrap();

        assert!(matches!(
            outcome,
            TransferOutcome::Applied { conflict: Some(ConflictOutcome::ResolvedTimeEquivalent(_)), .. }
        ));
        assert_eq!(rec.get(&key("XMP:DateCreated")), &TagValue::from("2020:01:01 10:00:00"));
        assert!(rec.get(&key("QuickTime:CreateDate")).is_empty());
    }

    #[test]
    fn unresolved_value_conflict_leaves_record_untouched() {
        let resolver = ConflictResolver::new(8);
        let unit = TagTransfer::new(&resolver, &SkipPrompter, false);
        let mut rec = record(&[("EXIF:Artist", "Alice"), ("XMP:Artist", "Bob")]);
        let before = rec.clone();

        let outcome =
            unit.transfer(&mut rec, &sel(":Artist"), &key("XMP:Artist"), TransferMode::Move).unwrap();

        assert!(matches!(outcome, TransferOutcome::Unresolved { .. }));
        assert_eq!(rec, before);
    }

    #[test]
    fn time_conflicts_are_only_offered_with_time_fix() {
        let resolver = ConflictResolver::new(8);
        let scripted = ScriptedPrompter::new(Some(0), false);
        let mut rec = record(&[
            ("XMP:DateCreated", "2020:01:01 10:00:00"),
            ("EXIF:CreateDate", "2020:01:01 11:30:00"),
        ]);

        let strict = TagTransfer::new(&resolver, &scripted, false);
        strict
            .transfer(&mut rec, &sel("EXIF:CreateDate"), &key("XMP:DateCreated"), TransferMode::Move)
            .unwrap();
        assert_eq!(scripted.asked.get(), 0);

        let fixing = TagTransfer::new(&resolver, &scripted, true);
        let outcome = fixing
            .transfer(&mut rec, &sel("EXIF:CreateDate"), &key("XMP:DateCreated"), TransferMode::Move)
            .unwrap();
        assert_eq!(scripted.asked.get(), 1);
        assert!(matches!(
            outcome,
            TransferOutcome::Applied { conflict: Some(ConflictOutcome::KeepSource), .. }
        ));
        assert_eq!(rec.get(&key("XMP:DateCreated")), &TagValue::from("2020:01:01 11:30:00"));
    }

    #[test]
    fn prompt_can_keep_destination() {
        let resolver = ConflictResolver::new(8);
        let scripted = ScriptedPrompter::new(Some(1), false);
        let unit = TagTransfer::new(&resolver, &scripted, false);
        let mut rec = record(&[("EXIF:Artist", "Alice"), ("XMP:Artist", "Bob")]);

        unit.transfer(&mut rec, &sel(":Artist"), &key("XMP:Artist"), TransferMode::Move).unwrap();

        assert_eq!(rec.get(&key("XMP:Artist")), &TagValue::from("Bob"));
        assert!(rec.get(&key("EXIF:Artist")).is_empty());
    }
}
