//! Deploy state management
//!
//! Each target keeps one record of its last successful activation under
//! `<state_dir>/deploy/<target>/last_deploy.json`. Older records are
//! overwritten, not kept.

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Record of the last successful activation on a target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployState {
    /// Timestamp of the activation
    pub timestamp: DateTime<Utc>,
    /// Target name ("local" or the host)
    pub target: String,
    /// Release the `current` link points at
    pub release_id: String,
    /// Release directory on the target
    pub release_path: Utf8PathBuf,
    /// Archive file name
    pub archive: String,
    /// BLAKE3 digest of the archive
    pub archive_hash: String,
}

impl DeployState {
    /// Create a new deploy state stamped with the current time
    pub fn new(
        target: impl Into<String>,
        release_id: impl Into<String>,
        release_path: impl Into<Utf8PathBuf>,
        archive: impl Into<String>,
        archive_hash: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            target: target.into(),
            release_id: release_id.into(),
            release_path: release_path.into(),
            archive: archive.into(),
            archive_hash: archive_hash.into(),
        }
    }

    /// Path of the state file for a target
    pub fn path_for(state_dir: &Utf8Path, target: &str) -> Utf8PathBuf {
        state_dir.join("deploy").join(target).join("last_deploy.json")
    }

    /// Load deploy state from a file
    pub fn load(path: &Utf8Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)?;
        let state: Self = serde_json::from_str(&content).map_err(|e| {
            Error::state(
                format!("Failed to parse deploy state {}: {}", path, e),
                "The deploy state file may be corrupted. Try deleting it.",
            )
        })?;

        Ok(Some(state))
    }

    /// Save deploy state to a file
    pub fn save(&self, path: &Utf8Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self).map_err(|e| {
            Error::state(
                format!("Failed to serialize deploy state: {}", e),
                "This is likely a bug in siteship",
            )
        })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Save into the standard location for this record's target
    pub fn record(&self, state_dir: &Utf8Path) -> Result<Utf8PathBuf> {
        let path = Self::path_for(state_dir, &self.target);
        self.save(&path)?;
        Ok(path)
    }

    /// Load the records of every target, sorted by target name
    pub fn load_all(state_dir: &Utf8Path) -> Result<Vec<Self>> {
        let deploy_dir = state_dir.join("deploy");
        if !deploy_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut states = Vec::new();
        for entry in deploy_dir.read_dir_utf8()? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }

            if let Some(state) = Self::load(&entry.path().join("last_deploy.json"))? {
                states.push(state);
            }
        }

        states.sort_by(|a, b| a.target.cmp(&b.target));
        Ok(states)
    }
}
