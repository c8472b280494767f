//! Cache path helpers for CLI commands.

use std::path::PathBuf;

/// Default location of the durable geocode cache.
pub fn geocode_cache_path() -> Option<PathBuf> {
    Some(cache_root_dir()?.join("media-retag").join("geocode.sqlite"))
}

pub fn cache_root_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("LOCALAPPDATA").map(PathBuf::from)
    }
    #[cfg(not(target_os = "windows"))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CACHE_HOME") {
            return Some(PathBuf::from(xdg));
        }
        std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".cache"))
    }
}
