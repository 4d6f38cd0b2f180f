//! Unit Manifest
//!
//! Declares where units come from and how they are checked, as data instead
//! of code. Adding a probe, a source directory or a post-run step means
//! editing a JSON file, not rebuilding the orchestrator.
//!
//! # Manifest Format
//!
//! ```json
//! {
//!   "sources": [
//!     { "category": "terminal", "dir": "install/terminal",
//!       "exclude": ["terminal.sh"], "strip_prefixes": ["app-"] }
//!   ],
//!   "probes": { "neovim": "nvim --version" },
//!   "prerequisites": { "lazygit": ["github_cli"] },
//!   "ordering": "discovery",
//!   "post_run": [
//!     { "label": "Installing fonts", "script": "install/desktop/fonts.sh", "timeout_secs": 300 }
//!   ],
//!   "timeouts": { "probe_secs": 5, "action_secs": 300 }
//! }
//! ```
//!
//! Every top-level key is optional. An omitted key keeps the built-in table,
//! so a manifest that only adds probes still discovers the stock sources.

use crate::types::{Category, QueueOrder};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while loading a manifest
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManifestError {
    /// The file exists but could not be read
    #[error("Failed to read manifest {path}: {reason}")]
    Unreadable { path: String, reason: String },

    /// JSON or structural problem
    #[error("Invalid manifest format: {reason}")]
    InvalidFormat { reason: String },
}

impl From<serde_json::Error> for ManifestError {
    fn from(err: serde_json::Error) -> Self {
        ManifestError::InvalidFormat {
            reason: err.to_string(),
        }
    }
}

impl From<ManifestError> for crate::error::BentoError {
    fn from(err: ManifestError) -> Self {
        crate::error::BentoError::manifest(err.to_string())
    }
}

/// A directory of installer scripts sharing one category
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceSpec {
    pub category: Category,

    /// Directory relative to the install root
    pub dir: PathBuf,

    /// Only scripts whose file name starts with this are units
    #[serde(default)]
    pub require_prefix: Option<String>,

    /// File names that are never units (e.g. aggregate runner scripts)
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Markers removed from the stem when deriving the unit name, every
    /// occurrence, applied in order
    #[serde(default)]
    pub strip_prefixes: Vec<String>,
}

impl SourceSpec {
    pub fn new(category: Category, dir: impl Into<PathBuf>) -> Self {
        Self {
            category,
            dir: dir.into(),
            require_prefix: None,
            exclude: Vec::new(),
            strip_prefixes: Vec::new(),
        }
    }

    pub fn require_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.require_prefix = Some(prefix.into());
        self
    }

    pub fn exclude(mut self, file_name: impl Into<String>) -> Self {
        self.exclude.push(file_name.into());
        self
    }

    pub fn strip_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.strip_prefixes.push(prefix.into());
        self
    }
}

/// A best-effort finishing action run after the queue drains
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostRunStep {
    /// Console label, e.g. "Installing fonts"
    pub label: String,

    /// Script relative to the install root
    pub script: PathBuf,

    #[serde(default = "default_step_timeout")]
    pub timeout_secs: u64,
}

impl PostRunStep {
    pub fn new(label: impl Into<String>, script: impl Into<PathBuf>, timeout_secs: u64) -> Self {
        Self {
            label: label.into(),
            script: script.into(),
            timeout_secs,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_step_timeout() -> u64 {
    60
}

/// Per-invocation wall-clock bounds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Timeouts {
    #[serde(default = "default_probe_secs")]
    pub probe_secs: u64,
    #[serde(default = "default_action_secs")]
    pub action_secs: u64,
}

fn default_probe_secs() -> u64 {
    5
}

fn default_action_secs() -> u64 {
    300
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            probe_secs: default_probe_secs(),
            action_secs: default_action_secs(),
        }
    }
}

/// Declarative description of the installable bundle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnitManifest {
    /// Scanned in order; earlier sources win name collisions
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceSpec>,

    /// Unit name → probe shell command
    #[serde(default = "default_probes")]
    pub probes: BTreeMap<String, String>,

    /// Unit name → names that should be installed first
    #[serde(default)]
    pub prerequisites: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub ordering: QueueOrder,

    #[serde(default = "default_post_run")]
    pub post_run: Vec<PostRunStep>,

    #[serde(default)]
    pub timeouts: Timeouts,
}

impl Default for UnitManifest {
    fn default() -> Self {
        Self {
            sources: default_sources(),
            probes: default_probes(),
            prerequisites: BTreeMap::new(),
            ordering: QueueOrder::default(),
            post_run: default_post_run(),
            timeouts: Timeouts::default(),
        }
    }
}

fn default_sources() -> Vec<SourceSpec> {
    vec![
        SourceSpec::new(Category::Terminal, "install/terminal")
            .exclude("terminal.sh")
            .strip_prefix("app-"),
        SourceSpec::new(Category::Desktop, "install/desktop")
            .require_prefix("app-")
            .strip_prefix("app-"),
        SourceSpec::new(Category::Optional, "install/desktop/optional")
            .strip_prefix("app-")
            .strip_prefix("download-"),
    ]
}

fn default_probes() -> BTreeMap<String, String> {
    [
        ("docker", "docker --version"),
        ("neovim", "nvim --version"),
        ("chrome", "google-chrome --version"),
        ("cursor", "cursor --version"),
        ("vscode", "code --version"),
        ("alacritty", "alacritty --version"),
        ("btop", "btop --version"),
        ("fastfetch", "fastfetch --version"),
        ("github_cli", "gh --version"),
        ("lazygit", "lazygit --version"),
        ("zellij", "zellij --version"),
        ("mise", "mise --version"),
        ("nodejs", "node --version"),
        ("python", "python3 --version"),
    ]
    .into_iter()
    .map(|(name, cmd)| (name.to_string(), cmd.to_string()))
    .collect()
}

fn default_post_run() -> Vec<PostRunStep> {
    vec![
        PostRunStep::new("Installing fonts", "install/desktop/fonts.sh", 300),
        PostRunStep::new("Configuring fonts", "install/desktop/configure-fonts.sh", 60),
        PostRunStep::new("Applying GNOME theme", "install/desktop/set-gnome-theme.sh", 60),
        PostRunStep::new("Applying GNOME settings", "install/desktop/set-gnome-settings.sh", 60),
    ]
}

impl UnitManifest {
    /// Load the manifest at `path`, falling back to the built-in tables when
    /// the file does not exist. A present but broken file is an error.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "No unit manifest found, using built-in tables");
            return Ok(Self::default());
        }
        let manifest = Self::from_file(path)?;
        tracing::info!(
            path = %path.display(),
            sources = manifest.sources.len(),
            probes = manifest.probes.len(),
            "Loaded unit manifest"
        );
        Ok(manifest)
    }

    /// Load a manifest from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|e| ManifestError::Unreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json(&content)
    }

    /// Load a manifest from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ManifestError> {
        let manifest: Self = serde_json::from_str(json)?;
        manifest.validate_structure()?;
        Ok(manifest)
    }

    fn validate_structure(&self) -> Result<(), ManifestError> {
        let mut seen = HashSet::new();
        for source in &self.sources {
            if !seen.insert(&source.dir) {
                return Err(ManifestError::InvalidFormat {
                    reason: format!("Duplicate source directory: {}", source.dir.display()),
                });
            }
        }

        for step in &self.post_run {
            if step.label.trim().is_empty() {
                return Err(ManifestError::InvalidFormat {
                    reason: format!("Post-run step {} has an empty label", step.script.display()),
                });
            }
            if step.timeout_secs == 0 {
                return Err(ManifestError::InvalidFormat {
                    reason: format!("Post-run step '{}' has a zero timeout", step.label),
                });
            }
        }

        if self.timeouts.probe_secs == 0 || self.timeouts.action_secs == 0 {
            return Err(ManifestError::InvalidFormat {
                reason: "Timeouts must be at least one second".to_string(),
            });
        }

        Ok(())
    }

    pub fn probe_for(&self, unit: &str) -> Option<&str> {
        self.probes.get(unit).map(String::as_str)
    }

    pub fn prerequisites_for(&self, unit: &str) -> &[String] {
        self.prerequisites.get(unit).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.probe_secs)
    }

    pub fn action_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.action_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_tables() {
        let manifest = UnitManifest::default();
        assert_eq!(manifest.sources.len(), 3);
        assert_eq!(manifest.sources[0].category, Category::Terminal);
        assert_eq!(manifest.sources[2].strip_prefixes, vec!["app-", "download-"]);
        assert_eq!(manifest.probe_for("github_cli"), Some("gh --version"));
        assert_eq!(manifest.probe_for("spotify"), None);
        assert_eq!(manifest.post_run.len(), 4);
        assert_eq!(manifest.probe_timeout(), Duration::from_secs(5));
        assert_eq!(manifest.action_timeout(), Duration::from_secs(300));
        assert_eq!(manifest.ordering, QueueOrder::Discovery);
    }

    #[test]
    fn test_partial_manifest_keeps_builtin_sources() {
        let json = r#"{ "probes": { "spotify": "spotify --version" } }"#;
        let manifest = UnitManifest::from_json(json).unwrap();
        assert_eq!(manifest.sources, UnitManifest::default().sources);
        assert_eq!(manifest.probe_for("spotify"), Some("spotify --version"));
        // An explicit probe table replaces the built-in one
        assert_eq!(manifest.probe_for("neovim"), None);
    }

    #[test]
    fn test_full_manifest_parses() {
        let json = r#"{
            "sources": [
                { "category": "optional", "dir": "extras", "strip_prefixes": ["app-"] }
            ],
            "prerequisites": { "lazygit": ["github_cli"] },
            "ordering": "prerequisites",
            "post_run": [ { "label": "Fonts", "script": "fonts.sh" } ],
            "timeouts": { "action_secs": 30 }
        }"#;
        let manifest = UnitManifest::from_json(json).unwrap();
        assert_eq!(manifest.sources.len(), 1);
        assert_eq!(manifest.prerequisites_for("lazygit"), ["github_cli".to_string()]);
        assert!(manifest.prerequisites_for("btop").is_empty());
        assert_eq!(manifest.ordering, QueueOrder::Prerequisites);
        assert_eq!(manifest.post_run[0].timeout_secs, 60);
        assert_eq!(manifest.timeouts.probe_secs, 5);
        assert_eq!(manifest.action_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_duplicate_source_rejected() {
        let json = r#"{ "sources": [
            { "category": "terminal", "dir": "a" },
            { "category": "desktop", "dir": "a" }
        ] }"#;
        let err = UnitManifest::from_json(json).unwrap_err();
        assert!(matches!(err, ManifestError::InvalidFormat { .. }));
        assert!(err.to_string().contains("Duplicate source"));
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let json = r#"{ "timeouts": { "probe_secs": 0 } }"#;
        assert!(UnitManifest::from_json(json).is_err());

        let json = r#"{ "post_run": [ { "label": "x", "script": "x.sh", "timeout_secs": 0 } ] }"#;
        assert!(UnitManifest::from_json(json).is_err());
    }

    #[test]
    fn test_unknown_ordering_rejected() {
        let json = r#"{ "ordering": "alphabetical" }"#;
        assert!(UnitManifest::from_json(json).is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let manifest = UnitManifest::load(Path::new("/nonexistent/bentobox-units.json")).unwrap();
        assert_eq!(manifest, UnitManifest::default());
    }

    #[test]
    fn test_load_malformed_file_is_error() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();
        file.flush().unwrap();
        assert!(UnitManifest::load(file.path()).is_err());
    }
}
