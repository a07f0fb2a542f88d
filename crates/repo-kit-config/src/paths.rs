//! Configuration and data directory paths
//!
//! Uses XDG directories via `dirs` crate.
//!
//! Platform-specific locations:
//! - Linux: `~/.config/repo-kit/`, `~/.cache/repo-kit/`
//! - macOS: `~/Library/Application Support/repo-kit/`, `~/Library/Caches/repo-kit/`
//! - Windows: `%APPDATA%\repo-kit\`, `%LOCALAPPDATA%\repo-kit\`

use anyhow::{Context, Result};
use std::path::PathBuf;

pub const APP_NAME: &str = "repo-kit";

/// Get the application config directory
pub fn config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir().context("Could not determine config directory")?;
    let dir = base.join(APP_NAME);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Get the application cache directory
pub fn cache_dir() -> Result<PathBuf> {
    let base = dirs::cache_dir().context("Could not determine cache directory")?;
    let dir = base.join(APP_NAME);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Directory holding OAuth sessions and pending authorizations
pub fn oauth_store_dir() -> Result<PathBuf> {
    Ok(config_dir()?.join("oauth"))
}

/// Get path to the last signed-in account file
pub fn last_signed_in_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("last-signed-in"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_exists() {
        let dir = config_dir().unwrap();
        assert!(dir.exists());
        assert!(dir.ends_with(APP_NAME));
    }

    #[test]
    fn test_store_paths() {
        assert!(oauth_store_dir().unwrap().ends_with("oauth"));
        assert!(last_signed_in_path().unwrap().ends_with("last-signed-in"));
    }
}
