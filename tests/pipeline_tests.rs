//! End-to-end runs over an in-memory tag store.

use media_retag::domain::{LocationConfig, MetadataRecord, ReconcileConfig, RenameConfig, TagKey, TagValue};
use media_retag::location::{AddressCache, GeocodeResponse, GeocodeService, Geocoder, LocationReconciler};
use media_retag::pipeline::{Action, Pipeline, PipelineOptions};
use media_retag::reconcile::{Reconciler, SkipPrompter};
use media_retag::rename::{RenameOptions, Renamer};
use media_retag::store::MemoryStore;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

struct NowhereGeocoder {
    calls: Arc<AtomicUsize>,
}

impl Geocoder for NowhereGeocoder {
    fn geocode(&self, _query: &str, _language: &str) -> media_retag::Result<GeocodeResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(GeocodeResponse::NotFound)
    }
}

fn key(s: &str) -> TagKey {
    s.parse().unwrap()
}

fn record(path: &Path, pairs: &[(&str, &str)]) -> MetadataRecord {
    let mut tags = BTreeMap::new();
    let name = path.file_name().unwrap().to_string_lossy().to_string();
    tags.insert(TagKey::file("FileName"), TagValue::from(name.as_str()));
    tags.insert(TagKey::file("MIMEType"), TagValue::from("image/jpeg"));
    for (k, v) in pairs {
        tags.insert(key(k), TagValue::from(*v));
    }
    MetadataRecord::new(path, tags).unwrap()
}

fn options(jobs: usize) -> PipelineOptions {
    PipelineOptions { jobs, companion_extension: "mov".to_string(), ..PipelineOptions::default() }
}

fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, "x").unwrap();
    path
}

#[test]
fn writes_only_what_changed_and_settles() {
    let store = MemoryStore::new();
    let path = PathBuf::from("/library/a.jpg");
    store.insert(record(
        &path,
        &[("EXIF:Artist", "Alice"), ("XMP:Artist", ""), ("EXIF:CreateDate", "2020:01:01 10:00:00")],
    ));
    let config = ReconcileConfig::default();
    let reconciler = Reconciler::new(&config, &SkipPrompter, LocationReconciler::new(None, 1.0), None);
    let pipeline = Pipeline::new(&store, &reconciler, None, options(1));

    let summary = pipeline.run(&Action::Write, vec![path.clone()]).unwrap();

    assert_eq!(summary.written, 1);
    let writes = store.writes();
    assert_eq!(writes.len(), 1);
    let (_, ws) = &writes[0];
    assert_eq!(ws.get(&key("XMP:Artist")), Some(&TagValue::from("Alice")));
    assert_eq!(ws.get(&key("EXIF:Artist")), Some(&TagValue::Empty));
    assert!(ws.keys().all(|k| k.to_string() != "File:FileName"));

    let again = Pipeline::new(&store, &reconciler, None, options(1))
        .run(&Action::Write, vec![path])
        .unwrap();
    assert_eq!(again.unchanged, 1);
    assert_eq!(store.writes().len(), 1);
}

#[test]
fn dry_run_writes_nothing() {
    let store = MemoryStore::new();
    let path = PathBuf::from("/library/a.jpg");
    store.insert(record(&path, &[("EXIF:Artist", "Alice")]));
    let config = ReconcileConfig::default();
    let reconciler = Reconciler::new(&config, &SkipPrompter, LocationReconciler::new(None, 1.0), None);
    let pipeline = Pipeline::new(&store, &reconciler, None, PipelineOptions { dry_run: true, ..options(1) });

    let summary = pipeline.run(&Action::Write, vec![path]).unwrap();

    assert_eq!(summary.written, 1);
    assert!(store.writes().is_empty());
}

#[test]
fn unresolvable_place_is_asked_for_once_per_run() {
    let store = MemoryStore::new();
    let paths = vec![PathBuf::from("/library/a.jpg"), PathBuf::from("/library/b.jpg")];
    for path in &paths {
        store.insert(record(path, &[("XMP:Location", "Atlantis"), ("EXIF:Artist", "Alice")]));
    }
    let calls = Arc::new(AtomicUsize::new(0));
    let location = LocationConfig { request_interval_ms: 0, backoff_secs: 0, ..LocationConfig::default() };
    let service = GeocodeService::new(
        AddressCache::open_in_memory().unwrap(),
        Box::new(NowhereGeocoder { calls: calls.clone() }),
        &location,
    );
    let config = ReconcileConfig::default();
    let reconciler =
        Reconciler::new(&config, &SkipPrompter, LocationReconciler::new(Some(&service), 1.0), None);
    let pipeline = Pipeline::new(&store, &reconciler, None, options(2));

    let summary = pipeline.run(&Action::Write, paths.clone()).unwrap();

    assert!(summary.failed.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    for path in &paths {
        let stored = store.get(path).unwrap();
        assert!(stored.get(&key("XMP:Geography")).is_empty());
    }
}

#[test]
fn same_named_files_get_increments() {
    let tmp = TempDir::new().unwrap();
    let store = MemoryStore::new();
    let mut files = Vec::new();
    for name in ["IMG_1.jpg", "IMG_2.jpg", "IMG_3.jpg"] {
        let path = touch(tmp.path(), name);
        store.insert(record(
            &path,
            &[
                ("XMP:Artist", "Alice"),
                ("XMP:DateCreated", "2020:01:01 10:00:00"),
                ("XMP:RawFileName", name),
            ],
        ));
        files.push(path);
    }
    let config = ReconcileConfig::default();
    let reconciler = Reconciler::new(&config, &SkipPrompter, LocationReconciler::new(None, 1.0), None);
    let renamer = Renamer::new(RenameConfig::default(), RenameOptions::default(), config.offset_suffix());
    let pipeline = Pipeline::new(&store, &reconciler, Some(&renamer), options(3));

    let summary = pipeline.run(&Action::Rename, files.clone()).unwrap();

    assert_eq!(summary.renamed, 3);
    for name in ["Alice-20-01-01.jpg", "Alice-20-01-01-01.jpg", "Alice-20-01-01-02.jpg"] {
        assert!(tmp.path().join(name).exists(), "{name} missing");
    }
    assert!(files.iter().all(|f| !f.exists()));
}

#[test]
fn failed_files_are_quarantined() {
    let tmp = TempDir::new().unwrap();
    let quarantine = tmp.path().join("quarantine");
    let store = MemoryStore::new();
    let broken = touch(tmp.path(), "broken.jpg");
    touch(tmp.path(), "broken.mov");
    let good = touch(tmp.path(), "good.jpg");
    store.insert(record(&good, &[("EXIF:Artist", "Alice")]));
    let config = ReconcileConfig::default();
    let reconciler = Reconciler::new(&config, &SkipPrompter, LocationReconciler::new(None, 1.0), None);
    let pipeline = Pipeline::new(
        &store,
        &reconciler,
        None,
        PipelineOptions { quarantine_dir: Some(quarantine.clone()), ..options(1) },
    );

    let summary = pipeline.run(&Action::Write, vec![broken.clone(), good]).unwrap();

    assert_eq!(summary.quarantined, vec![(broken.clone(), quarantine.join("broken.jpg"))]);
    assert_eq!(summary.written, 1);
    assert!(!broken.exists());
    assert!(quarantine.join("broken.jpg").exists());
    assert!(quarantine.join("broken.mov").exists());
}

#[test]
fn fail_fast_stops_scheduling_after_a_failure() {
    let store = MemoryStore::new();
    let missing = PathBuf::from("/library/0-missing.jpg");
    let later = PathBuf::from("/library/1-later.jpg");
    store.insert(record(&later, &[("EXIF:Artist", "Alice")]));
    let config = ReconcileConfig::default();
    let reconciler = Reconciler::new(&config, &SkipPrompter, LocationReconciler::new(None, 1.0), None);
    let pipeline =
        Pipeline::new(&store, &reconciler, None, PipelineOptions { fail_fast: true, ..options(1) });

    let summary = pipeline.run(&Action::Write, vec![missing.clone(), later]).unwrap();

    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, missing);
    assert_eq!(summary.cancelled, 1);
    assert!(store.writes().is_empty());
    assert!(!summary.is_success());
}

#[test]
fn tidy_only_touches_the_requested_account() {
    let tmp = TempDir::new().unwrap();
    let store = MemoryStore::new();
    let mine = touch(tmp.path(), "mine.jpg");
    let theirs = touch(tmp.path(), "theirs.jpg");
    let common = [("EXIF:Artist", "Alice"), ("EXIF:CreateDate", "2020:01:01 10:00:00")];
    store.insert(record(&mine, &[common[0], common[1], ("XMP:ImageSupplierID", "42")]));
    store.insert(record(&theirs, &[common[0], common[1], ("XMP:ImageSupplierID", "7")]));
    let config = ReconcileConfig::default();
    let reconciler = Reconciler::new(&config, &SkipPrompter, LocationReconciler::new(None, 1.0), None);
    let renamer = Renamer::new(
        RenameConfig::default(),
        RenameOptions { new_dir: true, ..RenameOptions::default() },
        config.offset_suffix(),
    );
    let pipeline = Pipeline::new(&store, &reconciler, Some(&renamer), options(1));

    let summary =
        pipeline.run(&Action::Tidy { supplier_id: "42".to_string() }, vec![mine.clone(), theirs.clone()]).unwrap();

    assert_eq!(summary.filtered, 1);
    assert_eq!(summary.renamed, 1);
    assert!(tmp.path().join("Alice").join("Alice-20-01-01.jpg").exists());
    assert!(theirs.exists());
    assert_eq!(store.writes().len(), 1);
    assert_eq!(store.writes()[0].0, mine);
}

#[test]
fn sorting_keeps_a_post_together() {
    let store = MemoryStore::new();
    let a = PathBuf::from("/library/a.jpg");
    let b = PathBuf::from("/library/b.jpg");
    let c = PathBuf::from("/library/c.jpg");
    store.insert(record(&a, &[("XMP:ImageUniqueID", "p2")]));
    store.insert(record(&b, &[("XMP:ImageUniqueID", "p1")]));
    store.insert(record(&c, &[("XMP:ImageUniqueID", "p1")]));
    let config = ReconcileConfig::default();
    let reconciler = Reconciler::new(&config, &SkipPrompter, LocationReconciler::new(None, 1.0), None);
    let pipeline =
        Pipeline::new(&store, &reconciler, None, PipelineOptions { sort_by_group: true, ..options(1) });

    let summary = pipeline.run(&Action::Write, vec![a, b, c]).unwrap();

    assert_eq!(summary.processed, 3);
    assert!(summary.failed.is_empty());
    assert_eq!(store.writes().len(), 3);
}

fn live_photo(dir: &Path, store: &MemoryStore) -> Vec<PathBuf> {
    let still = touch(dir, "a.jpg");
    let companion = touch(dir, "a.mov");
    let tags = [("XMP:Artist", "Alice"), ("XMP:DateCreated", "2020:01:01 10:00:00"), ("XMP:RawFileName", "a.jpg")];
    store.insert(record(&still, &tags));
    store.insert(record(&companion, &tags));
    media_retag::scan::discover_media(&[dir], false).unwrap()
}

#[test]
fn live_photo_companion_is_not_a_job_of_its_own() {
    let tmp = TempDir::new().unwrap();
    let store = MemoryStore::new();
    let files = live_photo(tmp.path(), &store);
    assert_eq!(files.len(), 2);
    let config = ReconcileConfig::default();
    let reconciler = Reconciler::new(&config, &SkipPrompter, LocationReconciler::new(None, 1.0), None);
    let renamer = Renamer::new(
        RenameConfig::default(),
        RenameOptions { sep_mov: true, ..RenameOptions::default() },
        config.offset_suffix(),
    );
    let pipeline = Pipeline::new(&store, &reconciler, Some(&renamer), options(1));

    let summary = pipeline.run(&Action::Rename, files).unwrap();

    assert!(summary.failed.is_empty(), "{:?}", summary.failed);
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.renamed, 1);
    let dir = tmp.path().join("_mov");
    assert!(dir.join("Alice-20-01-01.jpg").exists());
    assert!(dir.join("Alice-20-01-01.mov").exists());
    assert!(!tmp.path().join("Alice").exists());
}

#[test]
fn companions_are_written_when_not_renaming() {
    let tmp = TempDir::new().unwrap();
    let store = MemoryStore::new();
    let files = live_photo(tmp.path(), &store);
    let config = ReconcileConfig::default();
    let reconciler = Reconciler::new(&config, &SkipPrompter, LocationReconciler::new(None, 1.0), None);
    let renamer = Renamer::new(
        RenameConfig::default(),
        RenameOptions { sep_mov: true, ..RenameOptions::default() },
        config.offset_suffix(),
    );
    let pipeline = Pipeline::new(&store, &reconciler, Some(&renamer), options(1));

    let summary = pipeline.run(&Action::Write, files).unwrap();

    assert_eq!(summary.processed, 2);
}

#[test]
fn taken_companion_target_counts_as_a_broken_invariant() {
    let tmp = TempDir::new().unwrap();
    let store = MemoryStore::new();
    let files = live_photo(tmp.path(), &store);
    fs::create_dir_all(tmp.path().join("_mov")).unwrap();
    touch(&tmp.path().join("_mov"), "Alice-20-01-01.mov");
    let config = ReconcileConfig::default();
    let reconciler = Reconciler::new(&config, &SkipPrompter, LocationReconciler::new(None, 1.0), None);
    let renamer = Renamer::new(
        RenameConfig::default(),
        RenameOptions { sep_mov: true, ..RenameOptions::default() },
        config.offset_suffix(),
    );
    let pipeline = Pipeline::new(&store, &reconciler, Some(&renamer), options(1));

    let summary = pipeline.run(&Action::Rename, files).unwrap();

    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, tmp.path().join("a.jpg"));
    assert_eq!(summary.violations, 1);
    assert!(tmp.path().join("a.jpg").exists());
    assert!(tmp.path().join("a.mov").exists());
}
