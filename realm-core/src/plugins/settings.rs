//! Host settings - module directories and the disabled list

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use super::error::PluginHostError;

fn default_debounce_ms() -> u64 {
    500
}

/// Settings of the plugin host
///
/// Stored as TOML in `~/.config/realm/host.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSettings {
    /// Directory scanned for module libraries
    pub module_dir: PathBuf,
    /// Directory holding one `<name>.toml` per module
    pub config_dir: PathBuf,
    /// Root of the per-module data directories
    pub data_dir: PathBuf,
    /// Module names or file stems that are never loaded or initialized
    pub disabled: BTreeSet<String>,
    /// Re-read module configs when files in `config_dir` change
    pub watch_config: bool,
    /// Quiet period before a config change is applied
    #[serde(default = "default_debounce_ms")]
    pub config_debounce_ms: u64,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            module_dir: realm_paths::module_dir(),
            config_dir: realm_paths::module_config_dir(),
            data_dir: realm_paths::module_data_dir(),
            disabled: BTreeSet::new(),
            watch_config: false,
            config_debounce_ms: default_debounce_ms(),
        }
    }
}

impl HostSettings {
    /// Settings rooted at a single directory, used by tests and ad hoc runs
    pub fn rooted(root: &Path) -> Self {
        Self {
            module_dir: root.join("modules"),
            config_dir: root.join("config"),
            data_dir: root.join("data"),
            ..Self::default()
        }
    }

    /// Default location of the settings file
    pub fn default_path() -> PathBuf {
        realm_paths::host_settings_path()
    }

    /// Load settings from a TOML file
    ///
    /// Returns defaults if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self, PluginHostError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let settings: Self =
            toml::from_str(&content).map_err(|e| PluginHostError::Settings(e.to_string()))?;
        Ok(settings)
    }

    /// Save settings to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), PluginHostError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| PluginHostError::Settings(e.to_string()))?;

        if let Some(parent) = path.parent().filter(|p| !p.exists()) {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check if a module name or file stem is disabled
    pub fn is_disabled(&self, name: &str) -> bool {
        self.disabled.contains(name)
    }

    /// Disable a module. Returns false if it already was.
    pub fn disable(&mut self, name: &str) -> bool {
        self.disabled.insert(name.to_string())
    }

    /// Re-enable a module. Returns false if it was not disabled.
    pub fn enable(&mut self, name: &str) -> bool {
        self.disabled.remove(name)
    }

    /// Path of the config file for `module`
    pub fn module_config_path(&self, module: &str) -> PathBuf {
        self.config_dir.join(format!("{module}.toml"))
    }

    /// Data directory reserved for `module`
    pub fn module_data_dir(&self, module: &str) -> PathBuf {
        self.data_dir.join(module)
    }
}
