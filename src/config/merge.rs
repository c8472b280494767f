//! Command-line overrides layered on top of file config.

use std::path::PathBuf;

use crate::domain::Config;

/// Values given on the command line; `None` keeps the file setting.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub prompt: Option<bool>,
    pub time_fix: Option<bool>,
    pub strict: Option<bool>,
    pub local_offset_hours: Option<i32>,
    pub location_enabled: Option<bool>,
    pub providers_db: Option<PathBuf>,
    pub jobs: Option<usize>,
    pub fail_fast: Option<bool>,
    pub quarantine_dir: Option<PathBuf>,
    pub dry_run: Option<bool>,
}

pub fn merge_cli_with_config(mut config: Config, cli: CliOverrides) -> Config {
    if let Some(prompt) = cli.prompt {
        config.reconcile.prompt = prompt;
    }
    if let Some(time_fix) = cli.time_fix {
        config.reconcile.time_fix = time_fix;
    }
    if let Some(strict) = cli.strict {
        config.reconcile.strict = strict;
    }
    if let Some(hours) = cli.local_offset_hours {
        config.reconcile.local_offset_hours = hours;
    }
    if let Some(enabled) = cli.location_enabled {
        config.location.enabled = enabled;
    }
    if cli.providers_db.is_some() {
        config.providers.database = cli.providers_db;
    }
    if let Some(jobs) = cli.jobs {
        config.run.jobs = jobs;
    }
    if let Some(fail_fast) = cli.fail_fast {
        config.run.fail_fast = fail_fast;
    }
    if cli.quarantine_dir.is_some() {
        config.run.quarantine_dir = cli.quarantine_dir;
    }
    if let Some(dry_run) = cli.dry_run {
        config.run.dry_run = dry_run;
    }
    config
}
