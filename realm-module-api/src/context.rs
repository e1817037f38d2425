//! ModuleContext - a module's view of the host during lifecycle hooks

use crate::config::ModuleConfig;
use crate::error::ModuleError;
use serde::{Serialize, de::DeserializeOwned};
use std::path::{Path, PathBuf};

/// Module's interface to host-provided resources.
///
/// The host owns one context per loaded module and passes it to every
/// lifecycle hook. It provides:
/// - Module configuration (TOML key-value store, optionally file-backed)
/// - A data directory for module-specific persistence
/// - Logging helpers tagged with the module name
#[derive(Debug)]
pub struct ModuleContext {
    module_name: String,
    data_dir: PathBuf,
    config_path: Option<PathBuf>,
    config: ModuleConfig,
}

impl ModuleContext {
    /// Create a new context with an empty config
    pub fn new(module_name: String, data_dir: PathBuf) -> Self {
        Self {
            module_name,
            data_dir,
            config_path: None,
            config: ModuleConfig::new(),
        }
    }

    /// Create a context with a pre-loaded config
    pub fn with_config(module_name: String, data_dir: PathBuf, config: ModuleConfig) -> Self {
        Self {
            module_name,
            data_dir,
            config_path: None,
            config,
        }
    }

    /// Builder: remember the file the config was read from
    pub fn with_config_path(mut self, path: PathBuf) -> Self {
        self.config_path = Some(path);
        self
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// Directory reserved for this module's data files
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    // ─── Configuration ───────────────────────────────────────────────

    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ModuleConfig {
        &mut self.config
    }

    /// Read a configuration value
    ///
    /// # Example
    /// ```ignore
    /// let item: Option<u32> = ctx.config_get("rewards.item");
    /// ```
    pub fn config_get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.config.get(key)
    }

    /// Write a configuration value
    pub fn config_set<T: Serialize>(&mut self, key: &str, value: T) -> Result<(), ModuleError> {
        self.config.set(key, value)
    }

    /// Re-read the config from its file, replacing in-memory values.
    ///
    /// A context without a config file keeps its current values.
    pub fn reload_config(&mut self) -> Result<(), ModuleError> {
        if let Some(path) = &self.config_path {
            self.config = ModuleConfig::load(path)?;
        }
        Ok(())
    }

    /// Persist the config to its file if it has unsaved changes
    pub fn save_config(&mut self) -> Result<(), ModuleError> {
        match &self.config_path {
            Some(path) if self.config.is_dirty() => self.config.save(path),
            _ => Ok(()),
        }
    }

    // ─── Logging ─────────────────────────────────────────────────────

    /// Log an info message (automatically tagged with the module name)
    pub fn log_info(&self, message: &str) {
        tracing::info!(module = %self.module_name, "{}", message);
    }

    pub fn log_warn(&self, message: &str) {
        tracing::warn!(module = %self.module_name, "{}", message);
    }

    pub fn log_error(&self, message: &str) {
        tracing::error!(module = %self.module_name, "{}", message);
    }

    pub fn log_debug(&self, message: &str) {
        tracing::debug!(module = %self.module_name, "{}", message);
    }
}
