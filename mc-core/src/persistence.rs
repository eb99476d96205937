//! JSON settings store
//!
//! Writes go through a temp file, `sync_all` and rename so a crash never
//! leaves a half-written file behind. Values read back are clamped into
//! their validation domain.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use mc_error::{MicError, Result};
use tracing::{debug, warn};

use crate::device::PersistedState;
use crate::peripherals::SettingsStore;

#[derive(Debug, Clone)]
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonSettingsStore {
    fn commit(&self, state: &PersistedState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    MicError::persistence(format!(
                        "Failed to create settings directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let json = serde_json::to_string_pretty(state)?;
        let temp_path = self.path.with_extension("json.tmp");

        let mut file = fs::File::create(&temp_path).map_err(|source| MicError::FileWrite {
            path: temp_path.clone(),
            source,
        })?;
        file.write_all(json.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|source| MicError::FileWrite {
                path: temp_path.clone(),
                source,
            })?;
        drop(file);

        fs::rename(&temp_path, &self.path).map_err(|e| {
            MicError::persistence(format!("Failed to rename temp file: {}", e))
        })?;

        debug!("Settings committed to {}", self.path.display());
        Ok(())
    }

    fn load(&self) -> Result<Option<PersistedState>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).map_err(|source| MicError::FileRead {
            path: self.path.clone(),
            source,
        })?;
        let mut state: PersistedState = serde_json::from_str(&content)?;

        for key in state.settings.clamp_to_domain() {
            warn!(
                "Stored value for {} was out of range and has been clamped",
                key
            );
        }
        Ok(Some(state))
    }
}
