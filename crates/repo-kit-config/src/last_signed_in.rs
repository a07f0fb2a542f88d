//! The last signed-in account
//!
//! A single DID, stored in a plain text file, used to restore the session
//! on the next start.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct LastSignedIn {
    path: PathBuf,
}

impl LastSignedIn {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default location in the config directory
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(crate::paths::last_signed_in_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored identifier, if any
    pub fn get(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => {
                let value = content.trim();
                Ok((!value.is_empty()).then(|| value.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to read {:?}", self.path)),
        }
    }

    /// Replace the stored identifier
    pub fn set(&self, did: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, did)
            .with_context(|| format!("Failed to write {:?}", self.path))?;
        log::info!("Saved last signed-in account {}", did);
        Ok(())
    }

    /// Erase the stored identifier
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                log::info!("Cleared last signed-in account");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {:?}", self.path)),
        }
    }
}
