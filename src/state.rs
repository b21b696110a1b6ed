//! Snapshot of deployed instances between passes
//!
//! Orchestrators that have no store of their own can keep the last
//! deployed state of each instance here and feed it back as `previous`.

use crate::policy::PolicyInstance;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use declarative::InstanceId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Last deployed state per instance, stored as pretty JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(
    serialize = "S: Serialize",
    deserialize = "S: DeserializeOwned"
))]
pub struct StateFile<S = PolicyInstance> {
    #[serde(default)]
    pub instances: BTreeMap<InstanceId, S>,

    /// Last time the state was updated
    pub last_updated: DateTime<Utc>,
}

impl<S> Default for StateFile<S> {
    fn default() -> Self {
        Self {
            instances: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }
}

impl<S: Serialize + DeserializeOwned> StateFile<S> {
    /// Load state from disk, or return an empty state if the file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file {} does not exist, using empty state", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;

        let state: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        log::debug!(
            "Loaded {} instance(s) from {}",
            state.instances.len(),
            path.display()
        );
        Ok(state)
    }

    /// Save state to disk, creating parent directories as needed
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize state to JSON")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }
}

impl<S> StateFile<S> {
    pub fn get(&self, id: &InstanceId) -> Option<&S> {
        self.instances.get(id)
    }

    /// Store the state deployed for `id`
    pub fn record(&mut self, id: InstanceId, state: S) {
        self.instances.insert(id, state);
        self.last_updated = Utc::now();
    }

    /// Drop an instance after it has been destroyed
    pub fn forget(&mut self, id: &InstanceId) -> Option<S> {
        let removed = self.instances.remove(id);
        if removed.is_some() {
            self.last_updated = Utc::now();
        }
        removed
    }
}
