//! Batch runner: read, reconcile, diff, write and rename across a worker pool.

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

use crate::diff::{diff, show_diff};
use crate::domain::{MetadataRecord, TagKey};
use crate::error::Result;
use crate::reconcile::Reconciler;
use crate::rename::{RenameOutcome, Renamer};
use crate::scan::order_by_group;
use crate::store::MetadataStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Reconcile and write tags.
    Write,
    /// Rename from the tags as stored.
    Rename,
    /// Write, then rename, for files of one supplier account.
    Tidy { supplier_id: String },
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Worker threads; 0 means one per CPU.
    pub jobs: usize,
    /// Prompts need the terminal to themselves.
    pub interactive: bool,
    pub fail_fast: bool,
    pub quarantine_dir: Option<PathBuf>,
    pub dry_run: bool,
    pub sort_by_group: bool,
    pub color: bool,
    pub progress: bool,
    /// Extension of live-photo companions, moved along into quarantine.
    pub companion_extension: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    Written { tags: usize },
    Unchanged,
    Renamed { to: PathBuf },
    /// Not renamed: missing fields or already canonical.
    Kept,
    /// Not from the requested supplier account.
    Filtered,
    Cancelled,
    /// `violation` marks a broken invariant rather than an external failure.
    Failed { error: String, violation: bool },
    Quarantined { to: PathBuf, error: String, violation: bool },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub processed: usize,
    pub written: usize,
    pub unchanged: usize,
    pub renamed: usize,
    pub kept: usize,
    pub filtered: usize,
    pub cancelled: usize,
    /// Failed or quarantined files whose error was a broken invariant.
    pub violations: usize,
    pub failed: Vec<(PathBuf, String)>,
    pub quarantined: Vec<(PathBuf, PathBuf)>,
}

impl RunSummary {
    fn record(&mut self, path: &Path, outcome: FileOutcome) {
        self.processed += 1;
        match outcome {
            FileOutcome::Written { .. } => self.written += 1,
            FileOutcome::Unchanged => self.unchanged += 1,
            FileOutcome::Renamed { .. } => self.renamed += 1,
            FileOutcome::Kept => self.kept += 1,
            FileOutcome::Filtered => self.filtered += 1,
            FileOutcome::Cancelled => self.cancelled += 1,
            FileOutcome::Failed { error, violation } => {
                self.violations += usize::from(violation);
                self.failed.push((path.to_path_buf(), error));
            }
            FileOutcome::Quarantined { to, violation, .. } => {
                self.violations += usize::from(violation);
                self.quarantined.push((path.to_path_buf(), to));
            }
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.cancelled == 0
    }
}

pub struct Pipeline<'a> {
    store: &'a dyn MetadataStore,
    reconciler: &'a Reconciler<'a>,
    renamer: Option<&'a Renamer>,
    options: PipelineOptions,
    abort: AtomicBool,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        store: &'a dyn MetadataStore,
        reconciler: &'a Reconciler<'a>,
        renamer: Option<&'a Renamer>,
        options: PipelineOptions,
    ) -> Self {
        Self { store, reconciler, renamer, options, abort: AtomicBool::new(false) }
    }

    pub fn run(&self, action: &Action, files: Vec<PathBuf>) -> Result<RunSummary> {
        let files = self.drop_companions(action, files);
        let files = if self.options.sort_by_group { self.group(files) } else { files };
        let jobs = if self.options.interactive { 1 } else { self.options.jobs };
        let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;

        let pb = if self.options.progress {
            let pb = ProgressBar::new(files.len() as u64);
            pb.set_style(
                ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {wide_msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            pb
        } else {
            ProgressBar::hidden()
        };

        let outcomes: Vec<(PathBuf, FileOutcome)> = pool.install(|| {
            files
                .par_iter()
                .map(|path| {
                    let outcome = self.process(action, path, &pb);
                    pb.inc(1);
                    (path.clone(), outcome)
                })
                .collect()
        });
        pb.finish_and_clear();

        let mut summary = RunSummary::default();
        for (path, outcome) in outcomes {
            summary.record(&path, outcome);
        }
        info!(
            "processed {} files: {} written, {} renamed, {} failed",
            summary.processed,
            summary.written,
            summary.renamed,
            summary.failed.len()
        );
        Ok(summary)
    }

    /// With companions moved alongside their still, a companion whose still is
    /// in the batch is not a job of its own.
    fn drop_companions(&self, action: &Action, files: Vec<PathBuf>) -> Vec<PathBuf> {
        let renames = matches!(action, Action::Rename | Action::Tidy { .. });
        let ext = self.options.companion_extension.as_str();
        if !renames || ext.is_empty() || !self.renamer.is_some_and(Renamer::moves_companions) {
            return files;
        }
        let is_companion = |path: &Path| path.extension().is_some_and(|e| e.eq_ignore_ascii_case(ext));
        let stills: HashSet<PathBuf> =
            files.iter().filter(|p| !is_companion(p)).map(|p| p.with_extension("")).collect();
        files
            .into_iter()
            .filter(|path| {
                let paired = is_companion(path) && stills.contains(&path.with_extension(""));
                if paired {
                    debug!("{}: moves with its still", path.display());
                }
                !paired
            })
            .collect()
    }

    /// Order by shared `XMP:ImageUniqueID` so a post's files are handled together.
    fn group(&self, files: Vec<PathBuf>) -> Vec<PathBuf> {
        let key = TagKey::xmp("ImageUniqueID");
        let items = files
            .into_par_iter()
            .map(|path| {
                let id = self.store.read_tags(&path).ok().and_then(|r| r.get_str(&key));
                (path, id)
            })
            .collect();
        order_by_group(items)
    }

    fn process(&self, action: &Action, path: &Path, pb: &ProgressBar) -> FileOutcome {
        if self.abort.load(Ordering::SeqCst) {
            return FileOutcome::Cancelled;
        }
        pb.set_message(path.display().to_string());
        match self.process_file(action, path, pb) {
            Ok(outcome) => outcome,
            Err(err) => {
                let violation = err.is_invariant_violation();
                if violation {
                    error!("{}: invariant violated: {err}", path.display());
                } else {
                    error!("{}: {err}", path.display());
                }
                let message = err.to_string();
                if let Some(dir) = &self.options.quarantine_dir {
                    match self.quarantine(path, dir) {
                        Ok(to) => return FileOutcome::Quarantined { to, error: message, violation },
                        Err(q_err) => error!("{}: quarantine failed: {q_err}", path.display()),
                    }
                }
                if self.options.fail_fast {
                    self.abort.store(true, Ordering::SeqCst);
                }
                FileOutcome::Failed { error: message, violation }
            }
        }
    }

    fn process_file(&self, action: &Action, path: &Path, pb: &ProgressBar) -> Result<FileOutcome> {
        let record = self.store.read_tags(path)?;
        match action {
            Action::Write => self.write(&record, pb).map(|(outcome, _)| outcome),
            Action::Rename => self.rename(&record),
            Action::Tidy { supplier_id } => {
                let owner = record.get_str(&TagKey::xmp("ImageSupplierID"));
                if owner.as_deref() != Some(supplier_id.as_str()) {
                    debug!("{}: not from supplier account {supplier_id}", path.display());
                    return Ok(FileOutcome::Filtered);
                }
                let (written, reconciled) = self.write(&record, pb)?;
                match self.rename(&reconciled)? {
                    FileOutcome::Kept => Ok(written),
                    renamed => Ok(renamed),
                }
            }
        }
    }

    fn write(&self, record: &MetadataRecord, pb: &ProgressBar) -> Result<(FileOutcome, MetadataRecord)> {
        let reconciled = self.reconciler.reconcile(record)?;
        if !reconciled.issues.is_empty() {
            debug!("{}: {} unsettled fields", record.source().display(), reconciled.issues.len());
        }
        let write_set = diff(&reconciled.record, record)?;
        if write_set.is_empty() {
            return Ok((FileOutcome::Unchanged, reconciled.record));
        }

        let view = show_diff(record, &write_set);
        pb.println(view.render(self.options.color).trim_end());
        view.log_geo_shift();
        if self.options.dry_run {
            debug!("{}: dry run, {} tags not written", record.source().display(), write_set.len());
        } else {
            self.store.write_tags(record.source(), &write_set)?;
        }
        Ok((FileOutcome::Written { tags: write_set.len() }, reconciled.record))
    }

    fn rename(&self, record: &MetadataRecord) -> Result<FileOutcome> {
        let Some(renamer) = self.renamer else {
            return Ok(FileOutcome::Kept);
        };
        Ok(match renamer.rename(record)? {
            RenameOutcome::Renamed { to, .. } => FileOutcome::Renamed { to },
            RenameOutcome::Skipped | RenameOutcome::Unchanged => FileOutcome::Kept,
        })
    }

    /// Move a failed file, and its companion if present, out of the batch.
    fn quarantine(&self, path: &Path, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let to = free_path(dir, path);
        fs::rename(path, &to)?;
        let ext = self.options.companion_extension.as_str();
        if !ext.is_empty() && !path.extension().is_some_and(|e| e.eq_ignore_ascii_case(ext)) {
            let companion = path.with_extension(ext);
            if companion.exists() {
                fs::rename(&companion, to.with_extension(ext))?;
            }
        }
        warn!("{} quarantined to {}", path.display(), to.display());
        Ok(to)
    }
}

fn free_path(dir: &Path, path: &Path) -> PathBuf {
    let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    let mut candidate = dir.join(&name);
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) => (stem.to_string(), format!(".{ext}")),
        None => (name.clone(), String::new()),
    };
    let mut n = 1;
    while candidate.exists() {
        candidate = dir.join(format!("{stem}-{n}{ext}"));
        n += 1;
    }
    candidate
}
