//! Local state file
//!
//! Records the remote identifier of every managed resource so later runs
//! can find it again. Stored as JSON next to the configuration
//! (default: odb.state.json).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use odb_core::resource::ResourceId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    /// State file format version
    pub version: u32,
    /// Incremented on every write
    pub serial: u64,
    pub resources: Vec<ResourceState>,
}

impl StateFile {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            serial: 0,
            resources: Vec::new(),
        }
    }

    fn position(&self, id: &ResourceId) -> Option<usize> {
        self.resources
            .iter()
            .position(|r| r.resource_type == id.resource_type && r.name == id.name)
    }

    /// Remote identifier recorded for `id`
    pub fn identifier(&self, id: &ResourceId) -> Option<&str> {
        self.position(id)
            .map(|pos| self.resources[pos].identifier.as_str())
    }

    /// Record the identifier for `id`, replacing any earlier one
    pub fn upsert(&mut self, id: &ResourceId, identifier: impl Into<String>) {
        let entry = ResourceState {
            resource_type: id.resource_type.clone(),
            name: id.name.clone(),
            identifier: identifier.into(),
        };
        match self.position(id) {
            Some(pos) => self.resources[pos] = entry,
            None => self.resources.push(entry),
        }
    }

    pub fn remove(&mut self, id: &ResourceId) -> Option<ResourceState> {
        self.position(id).map(|pos| self.resources.remove(pos))
    }
}

impl Default for StateFile {
    fn default() -> Self {
        Self::new()
    }
}

/// Remote identifier of one managed resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    pub resource_type: String,
    pub name: String,
    pub identifier: String,
}

/// State file on local disk
pub struct LocalState {
    path: PathBuf,
}

impl LocalState {
    pub const DEFAULT_STATE_FILE: &'static str = "odb.state.json";

    /// State file placed next to the given configuration file
    pub fn beside(config_path: &Path) -> Self {
        let dir = config_path.parent().unwrap_or(Path::new("."));
        Self::with_path(dir.join(Self::DEFAULT_STATE_FILE))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the state, or an empty one if no file exists yet
    pub fn read(&self) -> Result<StateFile> {
        if !self.path.exists() {
            return Ok(StateFile::new());
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read state file {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file {}", self.path.display()))
    }

    pub fn write(&self, state: &mut StateFile) -> Result<()> {
        state.serial += 1;
        let content =
            serde_json::to_string_pretty(state).context("Failed to serialize state")?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write state file {}", self.path.display()))
    }
}
