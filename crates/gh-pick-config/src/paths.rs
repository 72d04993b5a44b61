//! Configuration, data and cache directory paths
//!
//! Uses XDG directories via `dirs` crate.
//!
//! Platform-specific locations:
//! - Linux: `~/.config/gh-pick-tracker/`, `~/.local/share/gh-pick-tracker/`, `~/.cache/gh-pick-tracker/`
//! - macOS: `~/Library/Application Support/gh-pick-tracker/`, `~/Library/Caches/gh-pick-tracker/`
//! - Windows: `%APPDATA%\gh-pick-tracker\`, `%LOCALAPPDATA%\gh-pick-tracker\`

use anyhow::{Context, Result};
use std::path::PathBuf;

pub const APP_NAME: &str = "gh-pick-tracker";

/// Get the application config directory
pub fn config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir().context("Could not determine config directory")?;
    let dir = base.join(APP_NAME);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Get the application data directory (tracked state lives here)
pub fn data_dir() -> Result<PathBuf> {
    let base = dirs::data_dir().context("Could not determine data directory")?;
    let dir = base.join(APP_NAME);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Get the application cache directory (run logs live here)
pub fn cache_dir() -> Result<PathBuf> {
    let base = dirs::cache_dir().context("Could not determine cache directory")?;
    let dir = base.join(APP_NAME);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Get path to the default tracked-state file
pub fn state_path() -> Result<PathBuf> {
    Ok(data_dir()?.join("state.json"))
}

/// Get path to the global config file
pub fn app_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_dir_exists() {
        let dir = cache_dir().unwrap();
        assert!(dir.exists());
        assert!(dir.ends_with(APP_NAME));
    }

    #[test]
    fn test_state_path() {
        let path = state_path().unwrap();
        assert!(path.ends_with("state.json"));
        assert!(path.parent().unwrap().ends_with(APP_NAME));
    }
}
