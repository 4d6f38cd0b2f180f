//! Configuration document handling
//!
//! The desktop configuration editor writes a YAML document; the orchestrator
//! reads it once at startup and never writes it back. Only
//! `desktop.optional_apps` drives unit selection, so only a broken selection
//! (or YAML that does not parse) makes the document malformed. Every other
//! field is read leniently: a value of the wrong shape is logged and dropped
//! to its default. The file itself stays on disk for the downstream scripts
//! that read it.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::types::ConfigMode;

/// Top-level configuration document
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct InstallConfig {
    /// Raw `mode` value; see [`InstallConfig::mode`]
    #[serde(deserialize_with = "lenient")]
    pub mode: String,
    #[serde(deserialize_with = "null_as_default")]
    pub desktop: DesktopConfig,
    #[serde(deserialize_with = "lenient")]
    pub languages: Vec<String>,
    #[serde(deserialize_with = "lenient")]
    pub containers: Vec<String>,
    #[serde(deserialize_with = "lenient")]
    pub security: BTreeMap<String, Value>,
    #[serde(deserialize_with = "lenient")]
    pub settings: BTreeMap<String, Value>,
}

/// `desktop:` section
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DesktopConfig {
    /// Optional unit identifiers the user picked
    #[serde(deserialize_with = "null_as_default")]
    pub optional_apps: Vec<String>,
    #[serde(deserialize_with = "lenient")]
    pub theme: Option<String>,
    // Toggles read by the post-run scripts; `None` when absent or not a bool
    #[serde(deserialize_with = "lenient")]
    pub install_fonts: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub install_ia_fonts: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub set_wallpaper: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub apply_gnome_settings: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub apply_hotkeys: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub install_extensions: Option<bool>,
}

/// Accept any YAML value; fall back to the default when it has the wrong shape
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(T::default());
    }
    Ok(T::deserialize(value).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Ignoring config value of unexpected type");
        T::default()
    }))
}

/// Strict, except an explicit `null` reads as the default
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Where the effective configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File,
    /// No document at the path
    Missing,
    /// Document present but unreadable; carries the reason
    Malformed(String),
}

impl InstallConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read configuration from {:?}", path.as_ref()))?;

        // An empty document is a valid "all defaults" configuration
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Self =
            serde_yaml::from_str(&content).context("Failed to parse configuration YAML")?;
        Ok(config)
    }

    /// Load the document, falling back to interactive defaults when it is
    /// missing or malformed. Never fails.
    pub fn load_or_default(path: &Path) -> (Self, ConfigSource) {
        if !path.exists() {
            tracing::info!(path = %path.display(), "No config file found, using defaults");
            return (Self::default(), ConfigSource::Missing);
        }

        match Self::load_from_file(path) {
            Ok(config) => {
                tracing::info!(path = %path.display(), mode = %config.mode(), "Loaded config");
                (config, ConfigSource::File)
            }
            Err(e) => {
                let reason = format!("{:#}", e);
                tracing::warn!(path = %path.display(), error = %reason, "Ignoring malformed config, using defaults");
                (Self::default(), ConfigSource::Malformed(reason))
            }
        }
    }

    pub fn selected_apps(&self) -> &[String] {
        &self.desktop.optional_apps
    }

    /// Run mode. Values other than `interactive`/`unattended` pass through
    /// to the scripts untouched and read as interactive here.
    pub fn mode(&self) -> ConfigMode {
        self.mode.parse().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const EDITOR_OUTPUT: &str = r#"
mode: unattended
desktop:
  optional_apps:
  - spotify
  - 1password
  - github-cli
  theme: tokyo-night
  install_fonts: true
  install_ia_fonts: false
  set_wallpaper: true
  apply_gnome_settings: true
  apply_hotkeys: true
  install_extensions: false
languages:
- ruby
- go
containers:
- postgres
settings:
  auto_reboot: false
  verbose: true
"#;

    fn write_temp(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_parse_editor_document() {
        let file = write_temp(EDITOR_OUTPUT);
        let config = InstallConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.mode(), ConfigMode::Unattended);
        assert_eq!(config.selected_apps(), ["spotify", "1password", "github-cli"]);
        assert_eq!(config.desktop.theme.as_deref(), Some("tokyo-night"));
        assert_eq!(config.desktop.install_ia_fonts, Some(false));
        assert_eq!(config.languages, vec!["ruby", "go"]);
        assert_eq!(config.containers, vec!["postgres"]);
        assert_eq!(config.settings.get("verbose"), Some(&Value::Bool(true)));
        assert!(config.security.is_empty());
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let file = write_temp("desktop:\n  optional_apps: [zoom]\n");
        let config = InstallConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.mode(), ConfigMode::Interactive);
        assert_eq!(config.selected_apps(), ["zoom"]);
        assert_eq!(config.desktop.install_fonts, None);
        assert!(config.languages.is_empty());
    }

    #[test]
    fn test_unknown_keys_are_tolerated() {
        let file = write_temp("mode: interactive\nwallpaper_provider: unsplash\n");
        assert!(InstallConfig::load_from_file(file.path()).is_ok());
    }

    #[test]
    fn test_empty_document_is_default() {
        let file = write_temp("   \n");
        assert_eq!(InstallConfig::load_from_file(file.path()).unwrap(), InstallConfig::default());
    }

    #[test]
    fn test_missing_file_falls_back() {
        let (config, source) =
            InstallConfig::load_or_default(Path::new("/nonexistent/.bentobox-config.yaml"));
        assert_eq!(source, ConfigSource::Missing);
        assert_eq!(config.mode(), ConfigMode::Interactive);
        assert!(config.selected_apps().is_empty());
    }

    #[test]
    fn test_malformed_file_falls_back() {
        let file = write_temp("desktop: [this is: not, a mapping\n");
        let (config, source) = InstallConfig::load_or_default(file.path());
        assert!(matches!(source, ConfigSource::Malformed(_)));
        assert_eq!(config, InstallConfig::default());
    }

    #[test]
    fn test_unexpected_passthrough_values_keep_selection() {
        let file = write_temp(
            "mode: custom\n\
             languages:\n\
             containers: postgres\n\
             security:\n  firewall: \"yes\"\n  ssh_hardening: true\n\
             settings: [verbose]\n\
             desktop:\n  optional_apps: [zoom]\n  install_fonts: maybe\n  theme: [dark]\n",
        );
        let (config, source) = InstallConfig::load_or_default(file.path());

        assert_eq!(source, ConfigSource::File);
        assert_eq!(config.selected_apps(), ["zoom"]);
        assert_eq!(config.mode, "custom");
        assert_eq!(config.mode(), ConfigMode::Interactive);
        assert!(config.languages.is_empty());
        assert!(config.containers.is_empty());
        assert_eq!(config.security.get("firewall"), Some(&Value::from("yes")));
        assert_eq!(config.security.get("ssh_hardening"), Some(&Value::Bool(true)));
        assert!(config.settings.is_empty());
        assert_eq!(config.desktop.install_fonts, None);
        assert_eq!(config.desktop.theme, None);
    }

    #[test]
    fn test_null_selection_reads_as_empty() {
        let file = write_temp("desktop:\n  optional_apps:\n");
        let (config, source) = InstallConfig::load_or_default(file.path());
        assert_eq!(source, ConfigSource::File);
        assert!(config.selected_apps().is_empty());
    }

    #[test]
    fn test_broken_selection_is_malformed() {
        let file = write_temp("mode: unattended\ndesktop:\n  optional_apps: zoom\n");
        let (config, source) = InstallConfig::load_or_default(file.path());
        assert!(matches!(source, ConfigSource::Malformed(_)));
        assert_eq!(config, InstallConfig::default());
    }
}
