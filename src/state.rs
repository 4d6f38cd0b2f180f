//! Run State persistence
//!
//! The state file is the crash-recovery and observability contract: external
//! viewers poll it while a run is in progress, and a unit killed mid-install
//! stays `installing` there. Every write goes to a temporary file in the same
//! directory and is renamed into place, so readers never see a torn document.
//!
//! ```json
//! {
//!   "components": {
//!     "docker": { "status": "installed", "error": null },
//!     "zoom": { "status": "failed", "error": "Exit code: 1" }
//!   }
//! }
//! ```

use crate::error::{BentoError, Result};
use crate::registry::Registry;
use crate::types::UnitStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// One unit's entry in the state file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRecord {
    pub status: UnitStatus,
    pub error: Option<String>,
}

/// Serialized snapshot of every unit's status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    pub components: BTreeMap<String, UnitRecord>,
}

impl RunState {
    /// Snapshot every unit in the registry
    pub fn from_registry(registry: &Registry) -> Self {
        let components = registry
            .iter()
            .map(|unit| {
                (
                    unit.name.clone(),
                    UnitRecord {
                        status: unit.status(),
                        error: unit.error_message().map(str::to_string),
                    },
                )
            })
            .collect();
        Self { components }
    }

    pub fn status_of(&self, name: &str) -> Option<UnitStatus> {
        self.components.get(name).map(|r| r.status)
    }

    pub fn count(&self, status: UnitStatus) -> usize {
        self.components.values().filter(|r| r.status == status).count()
    }

    /// Units still marked `installing`, i.e. interrupted mid-action
    pub fn interrupted(&self) -> impl Iterator<Item = &str> {
        self.components
            .iter()
            .filter(|(_, r)| r.status == UnitStatus::Installing)
            .map(|(name, _)| name.as_str())
    }
}

/// What a reader found at the state path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Snapshot {
    /// No run has happened yet
    Absent,
    /// Present but unreadable right now; readers should retry
    Unavailable(String),
    Available(RunState),
}

/// Reads and writes the state file at a fixed path
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically replace the state file with `state`
    pub fn save(&self, state: &RunState) -> Result<()> {
        let json = serde_json::to_string_pretty(state)
            .map_err(|e| BentoError::state(format!("Failed to serialize run state: {}", e)))?;

        self.write_atomic(json.as_bytes()).map_err(|e| {
            BentoError::state(format!(
                "Failed to write run state to {}: {}",
                self.path.display(),
                e
            ))
        })?;

        debug!(path = %self.path.display(), units = state.components.len(), "Persisted run state");
        Ok(())
    }

    /// Snapshot the registry and save it
    pub fn save_registry(&self, registry: &Registry) -> Result<()> {
        self.save(&RunState::from_registry(registry))
    }

    fn write_atomic(&self, bytes: &[u8]) -> io::Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Strict load: `None` when absent, error when unreadable or malformed
    pub fn load(&self) -> Result<Option<RunState>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(BentoError::state(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };
        let state = serde_json::from_str(&content).map_err(|e| {
            BentoError::state(format!("Malformed run state {}: {}", self.path.display(), e))
        })?;
        Ok(Some(state))
    }

    /// Lenient read for viewers. Never fails.
    pub fn read_snapshot(&self) -> Snapshot {
        match self.load() {
            Ok(None) => Snapshot::Absent,
            Ok(Some(state)) => Snapshot::Available(state),
            Err(e) => Snapshot::Unavailable(e.to_string()),
        }
    }

    /// Poll until the snapshot is not `Unavailable`, up to `attempts` reads
    pub fn read_snapshot_with_retry(&self, attempts: usize, delay: Duration) -> Snapshot {
        let mut snapshot = self.read_snapshot();
        for _ in 1..attempts.max(1) {
            let Snapshot::Unavailable(reason) = &snapshot else {
                break;
            };
            warn!(path = %self.path.display(), %reason, "Run state unavailable, retrying");
            std::thread::sleep(delay);
            snapshot = self.read_snapshot();
        }
        snapshot
    }
}
