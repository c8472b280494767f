//! Run configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub reconcile: ReconcileConfig,
    pub location: LocationConfig,
    pub rename: RenameConfig,
    pub run: RunConfig,
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconcileConfig {
    /// Hours between the capture devices' local time and UTC.
    pub local_offset_hours: i32,
    pub max_iterations: usize,
    /// Treat a loop that fails to converge as fatal for the file.
    pub strict: bool,
    /// Offer timestamp conflicts for resolution instead of skipping them.
    pub time_fix: bool,
    pub prompt: bool,
    /// Supplier names whose raw filename is synthesized from ids.
    pub raw_name_suppliers: Vec<String>,
    /// Values that mean "nothing" and are cleared.
    pub placeholder_values: Vec<String>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            local_offset_hours: 8,
            max_iterations: 10,
            strict: true,
            time_fix: false,
            prompt: false,
            raw_name_suppliers: vec!["Weibo".to_string()],
            placeholder_values: vec!["无".to_string()],
        }
    }
}

impl ReconcileConfig {
    /// The zone suffix the devices append, e.g. `+08:00`.
    pub fn offset_suffix(&self) -> String {
        let sign = if self.local_offset_hours < 0 { '-' } else { '+' };
        format!("{}{:02}:00", sign, self.local_offset_hours.abs())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocationConfig {
    pub enabled: bool,
    pub language: String,
    pub api_key_env: String,
    /// Durable address cache; defaults to the user cache directory.
    pub cache_db: Option<PathBuf>,
    pub max_divergence_km: f64,
    pub rounding_tolerance_m: f64,
    pub backoff_secs: u64,
    pub max_attempts: u32,
    pub request_interval_ms: u64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            language: "zh".to_string(),
            api_key_env: "GOOGLE_MAPS_API_KEY".to_string(),
            cache_db: None,
            max_divergence_km: 1.0,
            rounding_tolerance_m: 0.01,
            backoff_secs: 60,
            max_attempts: 3,
            request_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenameConfig {
    /// chrono format for the timestamp part of a filename.
    pub date_format: String,
    pub video_subfolder: String,
    pub live_photo_subfolder: String,
    pub companion_extension: String,
}

impl Default for RenameConfig {
    fn default() -> Self {
        Self {
            date_format: "%y-%m-%d".to_string(),
            video_subfolder: "_mp4".to_string(),
            live_photo_subfolder: "_mov".to_string(),
            companion_extension: "mov".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Worker threads; 0 means one per CPU.
    pub jobs: usize,
    pub fail_fast: bool,
    pub quarantine_dir: Option<PathBuf>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProvidersConfig {
    /// SQLite database holding supplier post and artist tables.
    pub database: Option<PathBuf>,
}
