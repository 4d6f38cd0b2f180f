//! Install paths resolved once at startup
//!
//! Every component receives paths through `InstallPaths`; nothing below the
//! entry point looks at `$HOME` or the process environment for locations.

use crate::error::{BentoError, Result};
use std::path::{Path, PathBuf};

/// Variable carrying the installation root, read at startup and injected into
/// every unit action and post-run step
pub const INSTALL_ROOT_ENV: &str = "OMAKUB_PATH";

/// Overrides the unit manifest location
pub const MANIFEST_ENV: &str = "BENTOBOX_MANIFEST";

const STATE_FILE_NAME: &str = ".bentobox-state.json";
const CONFIG_FILE_NAME: &str = ".bentobox-config.yaml";
const FINISH_SCRIPT_NAME: &str = "bentobox-finish-setup.sh";
const MANIFEST_RELATIVE: &str = "install/bentobox-units.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPaths {
    pub home: PathBuf,
    /// Root of the installer scripts tree
    pub install_root: PathBuf,
    pub state_file: PathBuf,
    pub config_file: PathBuf,
    pub manifest_file: PathBuf,
    /// Manual completion script suggested when no desktop session is present
    pub finish_script: PathBuf,
}

impl InstallPaths {
    /// Default layout under `home` with the default install root
    pub fn for_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        let install_root = home.join(".local/share/omakub");
        Self::with_root(home, install_root)
    }

    /// Default layout under `home` with an explicit install root
    pub fn with_root(home: impl Into<PathBuf>, install_root: impl Into<PathBuf>) -> Self {
        let home = home.into();
        let install_root = install_root.into();
        Self {
            state_file: home.join(STATE_FILE_NAME),
            config_file: home.join(CONFIG_FILE_NAME),
            manifest_file: install_root.join(MANIFEST_RELATIVE),
            finish_script: home.join(FINISH_SCRIPT_NAME),
            home,
            install_root,
        }
    }

    /// Resolve from the process environment
    pub fn from_env() -> Result<Self> {
        let home = home::home_dir()
            .ok_or_else(|| BentoError::config("could not determine home directory"))?;

        let mut paths = match non_empty_env(INSTALL_ROOT_ENV) {
            Some(root) => Self::with_root(home, root),
            None => Self::for_home(home),
        };
        if let Some(manifest) = non_empty_env(MANIFEST_ENV) {
            paths.manifest_file = PathBuf::from(manifest);
        }

        tracing::debug!(?paths, "Resolved install paths");
        Ok(paths)
    }

    /// Use an alternate configuration document
    pub fn with_config_file(mut self, config: Option<&Path>) -> Self {
        if let Some(config) = config {
            self.config_file = config.to_path_buf();
        }
        self
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
