//! Canonical filenames and collision-safe renames.

use chrono::{NaiveDate, NaiveDateTime};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};

use crate::domain::{MetadataRecord, RenameConfig, TagKey};
use crate::error::{Error, Result};
use crate::reconcile::conflict::parse_timestamp;

#[derive(Debug, Clone, Default)]
pub struct RenameOptions {
    /// Move into a subfolder named after the artist.
    pub new_dir: bool,
    /// Base directory for subfolders; defaults to the file's own directory.
    pub root: Option<PathBuf>,
    /// Videos go to the video subfolder.
    pub sep_mp4: bool,
    /// Stills with a live-photo companion go to the live-photo subfolder, companion included.
    pub sep_mov: bool,
    pub dry_run: bool,
}

impl RenameOptions {
    fn uses_subfolder(&self) -> bool {
        self.new_dir || self.root.is_some() || self.sep_mp4 || self.sep_mov
    }
}

/// The parts a canonical filename is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct RenameTarget {
    pub artist: String,
    pub taken: NaiveDateTime,
    pub series: Option<String>,
    pub edited: bool,
    /// Extension of the current file, dot included, case preserved.
    pub extension: String,
}

impl RenameTarget {
    /// `None` when the record lacks a raw filename, an artist or a date.
    pub fn from_record(record: &MetadataRecord, offset_suffix: &str) -> Option<Self> {
        record.get_str(&TagKey::xmp("RawFileName"))?;
        let artist = record
            .get_str(&TagKey::xmp("Artist"))
            .or_else(|| record.get_str(&TagKey::xmp("ImageCreatorName")))?;
        let raw_date = record.get_str(&TagKey::xmp("DateCreated"))?;
        let taken = parse_capture_time(raw_date.strip_suffix(offset_suffix).unwrap_or(&raw_date))?;
        let series = record
            .get_str(&TagKey::xmp("SeriesNumber"))
            .map(|sn| sn.trim().parse::<u64>().map(|n| n.to_string()).unwrap_or(sn));
        let current = record.source().file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let extension = record
            .source()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        Some(Self {
            artist: sanitize(&artist),
            taken,
            series,
            edited: current.contains("edited"),
            extension,
        })
    }

    /// `{artist}-{date}[-{series}][-{inc:02}][_edited]{ext}`.
    pub fn file_name(&self, date_format: &str, increment: u32) -> String {
        let mut name = format!("{}-{}", self.artist, self.taken.format(date_format));
        if let Some(sn) = &self.series {
            name.push('-');
            name.push_str(sn);
        }
        if increment > 0 {
            name.push_str(&format!("-{increment:02}"));
        }
        if self.edited {
            name.push_str("_edited");
        }
        name.push_str(&self.extension);
        name
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenameOutcome {
    Skipped,
    Unchanged,
    Renamed { from: PathBuf, to: PathBuf, companion: Option<(PathBuf, PathBuf)>, increment: u32 },
}

/// Probes and renames under one lock so concurrent workers never pick the
/// same free name.
pub struct Renamer {
    config: RenameConfig,
    options: RenameOptions,
    offset_suffix: String,
    lock: Mutex<()>,
}

impl Renamer {
    pub fn new(config: RenameConfig, options: RenameOptions, offset_suffix: impl Into<String>) -> Self {
        Self { config, options, offset_suffix: offset_suffix.into(), lock: Mutex::new(()) }
    }

    /// Live-photo companions travel with their still.
    pub fn moves_companions(&self) -> bool {
        self.options.sep_mov
    }

    pub fn rename(&self, record: &MetadataRecord) -> Result<RenameOutcome> {
        let current = record.source();
        let Some(target) = RenameTarget::from_record(record, &self.offset_suffix) else {
            info!("{}: missing raw filename, artist or date; not renamed", current.display());
            return Ok(RenameOutcome::Skipped);
        };
        let companion = self.companion_of(current);
        let dir = self.target_dir(current, &target, companion.is_some());

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut increment = 0;
        let candidate = loop {
            let candidate = dir.join(target.file_name(&self.config.date_format, increment));
            if candidate == current || same_file(&candidate, current) {
                debug!("{}: already named canonically", current.display());
                return Ok(RenameOutcome::Unchanged);
            }
            if !candidate.exists() {
                break candidate;
            }
            increment += 1;
        };

        let companion = companion.map(|from| {
            let to = candidate.with_extension(&self.config.companion_extension);
            (from, to)
        });
        if let Some((_, to)) = &companion {
            if to.exists() {
                return Err(Error::CompanionExists(to.clone()));
            }
        }

        if self.options.dry_run {
            info!("would move {} to {}", current.display(), candidate.display());
        } else {
            fs::create_dir_all(&dir)?;
            fs::rename(current, &candidate)?;
            if let Some((from, to)) = &companion {
                fs::rename(from, to).map_err(|source| Error::PartialRename {
                    from: current.to_path_buf(),
                    to: candidate.clone(),
                    companion: from.clone(),
                    source,
                })?;
            }
            info!("move {} to {}", current.display(), candidate.display());
        }
        if increment > 0 {
            warn!("inc: {increment} is used for {}", candidate.display());
        }
        Ok(RenameOutcome::Renamed { from: current.to_path_buf(), to: candidate, companion, increment })
    }

    fn companion_of(&self, path: &Path) -> Option<PathBuf> {
        if !self.options.sep_mov {
            return None;
        }
        let ext = self.config.companion_extension.as_str();
        if path.extension().is_some_and(|e| e.eq_ignore_ascii_case(ext)) {
            return None;
        }
        let companion = path.with_extension(ext);
        companion.exists().then_some(companion)
    }

    fn target_dir(&self, current: &Path, target: &RenameTarget, has_companion: bool) -> PathBuf {
        let parent = current.parent().map(Path::to_path_buf).unwrap_or_default();
        if !self.options.uses_subfolder() {
            return parent;
        }
        let is_video = target
            .extension
            .trim_start_matches('.')
            .eq_ignore_ascii_case("mp4");
        let subfolder = if has_companion {
            self.config.live_photo_subfolder.clone()
        } else if self.options.sep_mp4 && is_video {
            self.config.video_subfolder.clone()
        } else {
            target.artist.clone()
        };
        self.options.root.clone().unwrap_or(parent).join(subfolder)
    }
}

fn parse_capture_time(value: &str) -> Option<NaiveDateTime> {
    parse_timestamp(value).or_else(|| {
        NaiveDate::parse_from_str(value.get(..10)?, "%Y:%m:%d").ok()?.and_hms_opt(0, 0, 0)
    })
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Artist names end up as path components.
fn sanitize(name: &str) -> String {
    name.trim().replace(['/', '\\'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TagValue;
    use std::collections::{BTreeMap, HashSet};
    use tempfile::TempDir;

    fn record_at(path: &Path, pairs: &[(&str, &str)]) -> MetadataRecord {
        let mut tags = BTreeMap::new();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        tags.insert(TagKey::file("FileName"), TagValue::from(name.as_str()));
        tags.insert(TagKey::file("MIMEType"), TagValue::from("image/jpeg"));
        for (k, v) in pairs {
            tags.insert(k.parse().unwrap(), TagValue::from(*v));
        }
        MetadataRecord::new(path, tags).unwrap()
    }

    fn alice(path: &Path) -> MetadataRecord {
        record_at(
            path,
            &[
                ("XMP:RawFileName", "raw.jpg"),
                ("XMP:Artist", "Alice"),
                ("XMP:DateCreated", "2020:01:01 10:00:00+08:00"),
            ],
        )
    }

    fn touch(path: &Path) {
        fs::write(path, path.to_string_lossy().as_bytes()).unwrap();
    }

    fn renamer(options: RenameOptions) -> Renamer {
        Renamer::new(RenameConfig::default(), options, "+08:00")
    }

    #[test]
    fn collision_gets_an_increment() {
        let tmp = TempDir::new().expect("tmp");
        let src = tmp.path().join("a.jpg");
        let taken = tmp.path().join("Alice-20-01-01.jpg");
        touch(&src);
        touch(&taken);

        let outcome = renamer(RenameOptions::default()).rename(&alice(&src)).unwrap();

        let expected = tmp.path().join("Alice-20-01-01-01.jpg");
        assert_eq!(
            outcome,
            RenameOutcome::Renamed { from: src.clone(), to: expected.clone(), companion: None, increment: 1 }
        );
        assert!(expected.exists());
        assert!(!src.exists());
        assert_eq!(fs::read_to_string(&taken).unwrap(), taken.to_string_lossy());
    }

    #[test]
    fn colliding_batch_ends_up_distinct() {
        let tmp = TempDir::new().expect("tmp");
        let unit = renamer(RenameOptions::default());
        let sources: Vec<PathBuf> = (0..6).map(|i| tmp.path().join(format!("img{i}.jpg"))).collect();
        for src in &sources {
            touch(src);
        }

        let targets: Vec<PathBuf> = std::thread::scope(|scope| {
            let handles: Vec<_> = sources
                .iter()
                .map(|src| {
                    let unit = &unit;
                    scope.spawn(move || match unit.rename(&alice(src)).unwrap() {
                        RenameOutcome::Renamed { to, .. } => to,
                        other => panic!("unexpected {other:?}"),
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let distinct: HashSet<&PathBuf> = targets.iter().collect();
        assert_eq!(distinct.len(), sources.len());
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), sources.len());
        assert!(targets.iter().all(|dst| dst.exists()));
    }

    #[test]
    fn canonical_name_is_left_alone() {
        let tmp = TempDir::new().expect("tmp");
        let src = tmp.path().join("Alice-20-01-01.jpg");
        touch(&src);

        assert_eq!(renamer(RenameOptions::default()).rename(&alice(&src)).unwrap(), RenameOutcome::Unchanged);
        assert!(src.exists());
    }

    #[test]
    fn incomplete_records_are_skipped() {
        let tmp = TempDir::new().expect("tmp");
        let src = tmp.path().join("a.jpg");
        touch(&src);
        let rec = record_at(&src, &[("XMP:Artist", "Alice")]);

        assert_eq!(renamer(RenameOptions::default()).rename(&rec).unwrap(), RenameOutcome::Skipped);
    }

    #[test]
    fn name_carries_series_and_edited_marker() {
        let tmp = TempDir::new().expect("tmp");
        let src = tmp.path().join("a_edited.JPG");
        let rec = record_at(
            &src,
            &[
                ("XMP:RawFileName", "raw.jpg"),
                ("XMP:ImageCreatorName", "bob/b"),
                ("XMP:DateCreated", "2021:12:31 23:59:59"),
                ("XMP:SeriesNumber", "03"),
            ],
        );
        let target = RenameTarget::from_record(&rec, "+08:00").unwrap();
        assert_eq!(target.file_name("%y-%m-%d", 0), "bob_b-21-12-31-3_edited.JPG");
        assert_eq!(target.file_name("%y-%m-%d", 2), "bob_b-21-12-31-3-02_edited.JPG");
    }

    #[test]
    fn live_photo_companion_moves_in_lockstep() {
        let tmp = TempDir::new().expect("tmp");
        let src = tmp.path().join("a.jpg");
        let mov = tmp.path().join("a.mov");
        touch(&src);
        touch(&mov);

        let outcome =
            renamer(RenameOptions { sep_mov: true, ..RenameOptions::default() }).rename(&alice(&src)).unwrap();

        let dir = tmp.path().join("_mov");
        match outcome {
            RenameOutcome::Renamed { to, companion: Some((_, mov_to)), .. } => {
                assert_eq!(to, dir.join("Alice-20-01-01.jpg"));
                assert_eq!(mov_to, dir.join("Alice-20-01-01.mov"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(dir.join("Alice-20-01-01.mov").exists());
        assert!(!mov.exists());
    }

    #[test]
    fn existing_companion_target_is_fatal_and_moves_nothing() {
        let tmp = TempDir::new().expect("tmp");
        let src = tmp.path().join("a.jpg");
        touch(&src);
        touch(&tmp.path().join("a.mov"));
        fs::create_dir_all(tmp.path().join("_mov")).unwrap();
        touch(&tmp.path().join("_mov").join("Alice-20-01-01.mov"));

        let err = renamer(RenameOptions { sep_mov: true, ..RenameOptions::default() })
            .rename(&alice(&src))
            .unwrap_err();

        assert!(matches!(err, Error::CompanionExists(_)));
        assert!(src.exists());
    }

    #[cfg(unix)]
    #[test]
    fn companion_that_cannot_follow_is_a_partial_rename() {
        let tmp = TempDir::new().expect("tmp");
        let src = tmp.path().join("a.jpg");
        touch(&src);
        // A directory cannot replace the dangling link left at its target.
        fs::create_dir_all(tmp.path().join("a.mov")).unwrap();
        let dir = tmp.path().join("_mov");
        fs::create_dir_all(&dir).unwrap();
        std::os::unix::fs::symlink(tmp.path().join("gone"), dir.join("Alice-20-01-01.mov")).unwrap();

        let err = renamer(RenameOptions { sep_mov: true, ..RenameOptions::default() })
            .rename(&alice(&src))
            .unwrap_err();

        match &err {
            Error::PartialRename { from, to, companion, .. } => {
                assert_eq!(from, &src);
                assert_eq!(to, &dir.join("Alice-20-01-01.jpg"));
                assert_eq!(companion, &tmp.path().join("a.mov"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(err.is_invariant_violation());
        assert!(dir.join("Alice-20-01-01.jpg").exists());
        assert!(tmp.path().join("a.mov").is_dir());
    }

    #[test]
    fn artist_and_video_subfolders() {
        let tmp = TempDir::new().expect("tmp");
        let root = tmp.path().join("sorted");
        let photo = tmp.path().join("a.jpg");
        let video = tmp.path().join("v.mp4");
        touch(&photo);
        touch(&video);
        let unit = renamer(RenameOptions { root: Some(root.clone()), sep_mp4: true, ..RenameOptions::default() });

        unit.rename(&alice(&photo)).unwrap();
        unit.rename(&alice(&video)).unwrap();

        assert!(root.join("Alice").join("Alice-20-01-01.jpg").exists());
        assert!(root.join("_mp4").join("Alice-20-01-01.mp4").exists());
    }

    #[test]
    fn dry_run_touches_nothing() {
        let tmp = TempDir::new().expect("tmp");
        let src = tmp.path().join("a.jpg");
        touch(&src);

        let outcome =
            renamer(RenameOptions { dry_run: true, ..RenameOptions::default() }).rename(&alice(&src)).unwrap();

        assert!(matches!(outcome, RenameOutcome::Renamed { .. }));
        assert!(src.exists());
    }
}
