//! Component Registry
//!
//! Builds the set of installable units by scanning the source directories
//! declared in the `UnitManifest`. Discovery is deterministic: sources are
//! visited in manifest order and scripts in file-name order, and a unit's
//! name is derived purely from its file name. The same tree always yields the
//! same registry, which keeps the persisted run state meaningful across runs.
//!
//! # Name collisions
//!
//! The first unit discovered under a name wins. Later scripts deriving the
//! same name are dropped with a warning.

use crate::error::Result;
use crate::manifest::{SourceSpec, UnitManifest};
use crate::unit::Unit;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const SCRIPT_EXTENSION: &str = "sh";

/// Units in discovery order, indexed by name
#[derive(Debug, Clone, Default)]
pub struct Registry {
    units: Vec<Unit>,
    index: HashMap<String, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a unit unless its name is taken. Returns false when rejected.
    pub fn insert(&mut self, unit: Unit) -> bool {
        if self.index.contains_key(&unit.name) {
            return false;
        }
        self.index.insert(unit.name.clone(), self.units.len());
        self.units.push(unit);
        true
    }

    pub fn get(&self, name: &str) -> Option<&Unit> {
        self.index.get(name).map(|&i| &self.units[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Unit> {
        self.index.get(name).map(|&i| &mut self.units[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Unit> {
        self.units.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Unit> {
        self.units.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl FromIterator<Unit> for Registry {
    fn from_iter<I: IntoIterator<Item = Unit>>(iter: I) -> Self {
        let mut registry = Registry::new();
        for unit in iter {
            registry.insert(unit);
        }
        registry
    }
}

/// Scan every manifest source under `install_root`.
///
/// Absent source directories contribute nothing. Probes and prerequisites are
/// attached from the manifest tables.
pub fn discover(install_root: &Path, manifest: &UnitManifest) -> Result<Registry> {
    let mut registry = Registry::new();

    for source in &manifest.sources {
        let dir = install_root.join(&source.dir);
        for script in list_scripts(&dir)? {
            let Some(name) = unit_name(source, &script) else {
                continue;
            };

            let mut unit = Unit::new(name.clone(), script.clone(), source.category)
                .with_prerequisites(manifest.prerequisites_for(&name).iter().cloned());
            unit.probe = manifest.probe_for(&name).map(str::to_string);

            if !registry.insert(unit) {
                let kept = registry
                    .get(&name)
                    .map(|u| u.action.display().to_string())
                    .unwrap_or_default();
                warn!(
                    unit = %name,
                    kept = %kept,
                    dropped = %script.display(),
                    "Duplicate unit name, keeping the first discovered script"
                );
            }
        }
    }

    info!(count = registry.len(), "Discovered units");
    Ok(registry)
}

/// `*.sh` files directly inside `dir`, sorted by file name
fn list_scripts(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(dir = %dir.display(), "Source directory absent, skipping");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let mut scripts = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == SCRIPT_EXTENSION) {
            scripts.push(path);
        }
    }
    scripts.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(scripts)
}

/// Apply a source's filters and naming rule to one script.
///
/// `app-github-cli.sh` with `strip_prefixes = ["app-"]` becomes `github_cli`.
/// The strip markers are removed wherever they appear in the stem.
/// Returns `None` for scripts the source does not treat as units.
pub fn unit_name(source: &SourceSpec, script: &Path) -> Option<String> {
    let file_name = script.file_name()?.to_str()?;
    if source.exclude.iter().any(|ex| ex == file_name) {
        return None;
    }
    if let Some(prefix) = &source.require_prefix {
        if !file_name.starts_with(prefix.as_str()) {
            return None;
        }
    }

    // Every occurrence of each marker is removed, not just a leading one,
    // so `download-app-foo` and `my-app-thing` become `foo` and `my_thing`
    let mut stem = script.file_stem()?.to_str()?.to_string();
    for marker in &source.strip_prefixes {
        stem = stem.replace(marker.as_str(), "");
    }
    if stem.is_empty() {
        return None;
    }
    Some(stem.replace('-', "_"))
}
