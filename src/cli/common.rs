//! Arguments and wiring shared by every processing command.

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use std::io::IsTerminal;
use std::path::PathBuf;

use super::cache::geocode_cache_path;
use crate::config::{load_config, merge_cli_with_config, CliOverrides};
use crate::domain::Config;
use crate::location::{AddressCache, GeocodeService, GoogleGeocoder, LocationReconciler};
use crate::pipeline::{Action, Pipeline, PipelineOptions, RunSummary};
use crate::providers::Providers;
use crate::reconcile::{Prompter, Reconciler, SkipPrompter, TerminalPrompter};
use crate::rename::{RenameOptions, Renamer};
use crate::scan::discover_media;
use crate::store::ExifTool;

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Media files or directories to process
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,

    /// Path to config file (media-retag.toml or media-retag.yml)
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Ask on the terminal when a conflict cannot be settled (forces one worker)
    #[arg(short = 'p', long)]
    pub prompt: bool,

    /// Offer timestamp conflicts for resolution
    #[arg(long)]
    pub time_fix: bool,

    /// Keep the last pass instead of failing a file that does not converge
    #[arg(long)]
    pub lenient: bool,

    /// Hours between device local time and UTC
    #[arg(long, value_name = "HOURS", allow_negative_numbers = true)]
    pub offset: Option<i32>,

    /// Worker threads (0 = one per CPU)
    #[arg(short = 'j', long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Stop scheduling new files after the first failure
    #[arg(long)]
    pub fail_fast: bool,

    /// Move files that fail into this directory
    #[arg(long, value_name = "DIR")]
    pub quarantine: Option<PathBuf>,

    /// Show what would change without touching any file
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Process files of the same post next to each other
    #[arg(long)]
    pub sort: bool,

    /// Skip geocoding and location reconciliation
    #[arg(long)]
    pub no_location: bool,

    /// SQLite database with supplier post and artist tables
    #[arg(long, value_name = "FILE")]
    pub providers_db: Option<PathBuf>,

    /// Descend into symlinked directories while scanning
    #[arg(long)]
    pub follow_symlinks: bool,

    /// exiftool binary to run
    #[arg(long, value_name = "BIN", default_value = "exiftool")]
    pub exiftool: String,
}

impl RunArgs {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            prompt: self.prompt.then_some(true),
            time_fix: self.time_fix.then_some(true),
            strict: self.lenient.then_some(false),
            local_offset_hours: self.offset,
            location_enabled: self.no_location.then_some(false),
            providers_db: self.providers_db.clone(),
            jobs: self.jobs,
            fail_fast: self.fail_fast.then_some(true),
            quarantine_dir: self.quarantine.clone(),
            dry_run: self.dry_run.then_some(true),
        }
    }

    pub fn load(&self) -> Result<Config> {
        let cwd = std::env::current_dir()?;
        let file_config = load_config(&cwd, self.config.as_deref())?;
        Ok(merge_cli_with_config(file_config, self.overrides()))
    }
}

/// Build every collaborator, run `action` over the discovered media and
/// print the summary. Fails when any file failed.
pub fn execute(args: &RunArgs, action: Action, rename: Option<RenameOptions>) -> Result<()> {
    let config = args.load()?;
    let files = discover_media(&args.paths, args.follow_symlinks)?;
    if files.is_empty() {
        eprintln!("No media files found.");
        return Ok(());
    }

    let exiftool = ExifTool::new(args.exiftool.clone());
    let version = exiftool
        .check()
        .with_context(|| format!("{} is required to read and write tags", args.exiftool))?;
    tracing::debug!("using exiftool {version}");

    let geocoder = if config.location.enabled { build_geocoder(&config)? } else { None };
    let providers = match &config.providers.database {
        Some(path) => Some(
            Providers::from_database(path)
                .with_context(|| format!("Failed opening providers database: {}", path.display()))?,
        ),
        None => None,
    };

    let interactive = config.reconcile.prompt;
    let prompter: &(dyn Prompter + Sync) = if interactive { &TerminalPrompter } else { &SkipPrompter };
    let location = LocationReconciler::new(geocoder.as_ref(), config.location.max_divergence_km);
    let reconciler = Reconciler::new(&config.reconcile, prompter, location, providers.as_ref());

    let renamer = rename.map(|mut options| {
        options.dry_run = config.run.dry_run;
        Renamer::new(config.rename.clone(), options, config.reconcile.offset_suffix())
    });

    let stderr_is_tty = std::io::stderr().is_terminal();
    let options = PipelineOptions {
        jobs: config.run.jobs,
        interactive,
        fail_fast: config.run.fail_fast,
        quarantine_dir: config.run.quarantine_dir.clone(),
        dry_run: config.run.dry_run,
        sort_by_group: args.sort,
        color: std::io::stdout().is_terminal(),
        progress: stderr_is_tty && !interactive,
        companion_extension: config.rename.companion_extension.clone(),
    };

    let pipeline = Pipeline::new(&exiftool, &reconciler, renamer.as_ref(), options);
    let summary = pipeline.run(&action, files)?;
    print_summary(&summary, config.run.dry_run);

    if !summary.is_success() {
        anyhow::bail!("{} of {} files failed", summary.failed.len(), summary.processed);
    }
    Ok(())
}

fn build_geocoder(config: &Config) -> Result<Option<GeocodeService>> {
    let Some(geocoder) = GoogleGeocoder::from_env(&config.location.api_key_env) else {
        tracing::warn!("{} is not set; locations will not be geocoded", config.location.api_key_env);
        return Ok(None);
    };
    let cache_path = match config.location.cache_db.clone().or_else(geocode_cache_path) {
        Some(path) => path,
        None => {
            tracing::warn!("no cache directory available; geocoding without a durable cache");
            return Ok(Some(GeocodeService::new(
                AddressCache::open_in_memory()?,
                Box::new(geocoder),
                &config.location,
            )));
        }
    };
    let cache = AddressCache::open(&cache_path)
        .with_context(|| format!("Failed opening geocode cache: {}", cache_path.display()))?;
    Ok(Some(GeocodeService::new(cache, Box::new(geocoder), &config.location)))
}

fn print_summary(summary: &RunSummary, dry_run: bool) {
    let heading = if dry_run { "Dry run complete" } else { "Processing complete" };
    println!("\n{}", style(heading).bold());
    println!("Files processed:   {}", summary.processed);
    println!("Tags written:      {}", summary.written);
    println!("Already canonical: {}", summary.unchanged);
    println!("Files renamed:     {}", summary.renamed);
    if summary.filtered > 0 {
        println!("Other accounts:    {}", summary.filtered);
    }
    if summary.cancelled > 0 {
        println!("Not attempted:     {}", summary.cancelled);
    }
    if summary.violations > 0 {
        println!("Broken invariants: {}", style(summary.violations).red());
    }

    if !summary.quarantined.is_empty() {
        println!("\n{}", style("Quarantined:").yellow());
        for (from, to) in &summary.quarantined {
            println!("  {} -> {}", from.display(), to.display());
        }
    }
    if !summary.failed.is_empty() {
        println!("\n{}", style("Errors:").red());
        for (path, error) in &summary.failed {
            println!("  {}: {}", path.display(), error);
        }
    }
}
