//! ModuleConfig - typed key/value configuration backed by TOML
//!
//! Keys are dotted paths: `"rewards.item"` addresses the `item` key inside the
//! `[rewards]` section. Getters never fail; a missing key or a value of the
//! wrong type yields the supplied default.

use crate::error::ModuleError;
use serde::{Serialize, de::DeserializeOwned};
use std::path::Path;

/// Module configuration - persistent key-value store backed by TOML
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleConfig {
    values: toml::Table,
    dirty: bool,
}

impl ModuleConfig {
    /// Create a new empty config
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    ///
    /// Returns an empty config if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self, ModuleError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, ModuleError> {
        let values: toml::Table =
            toml::from_str(content).map_err(|e| ModuleError::Config(e.to_string()))?;
        Ok(Self {
            values,
            dirty: false,
        })
    }

    /// Save configuration to a TOML file
    pub fn save(&mut self, path: &Path) -> Result<(), ModuleError> {
        let content = self.to_toml_string()?;

        if let Some(parent) = path.parent().filter(|p| !p.exists()) {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        self.dirty = false;
        Ok(())
    }

    /// Render the configuration as TOML text
    pub fn to_toml_string(&self) -> Result<String, ModuleError> {
        toml::to_string_pretty(&self.values).map_err(|e| ModuleError::Serialization(e.to_string()))
    }

    // ─── Generic Access ──────────────────────────────────────────────

    /// Get a configuration value
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.lookup(key).and_then(|v| v.clone().try_into().ok())
    }

    /// Set a configuration value, creating intermediate sections as needed
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<(), ModuleError> {
        let value =
            toml::Value::try_from(value).map_err(|e| ModuleError::Serialization(e.to_string()))?;
        let (table, leaf) = self.parent_table_mut(key)?;
        table.insert(leaf.to_string(), value);
        self.dirty = true;
        Ok(())
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// Remove a key; returns true if it existed
    pub fn remove_key(&mut self, key: &str) -> bool {
        let (path, leaf) = match key.rsplit_once('.') {
            Some((path, leaf)) => (Some(path), leaf),
            None => (None, key),
        };

        let table = match path {
            Some(path) => match self.lookup_mut(path).and_then(toml::Value::as_table_mut) {
                Some(table) => table,
                None => return false,
            },
            None => &mut self.values,
        };

        let removed = table.remove(leaf).is_some();
        self.dirty |= removed;
        removed
    }

    /// Remove every key
    pub fn clear(&mut self) {
        if !self.values.is_empty() {
            self.values.clear();
            self.dirty = true;
        }
    }

    /// All leaf keys as dotted paths, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        collect_keys(&self.values, "", &mut keys);
        keys.sort();
        keys
    }

    /// Number of leaf keys
    pub fn len(&self) -> usize {
        self.keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ─── Typed Getters ───────────────────────────────────────────────

    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.lookup(key)
            .and_then(toml::Value::as_str)
            .map_or_else(|| default.to_string(), str::to_string)
    }

    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.lookup(key)
            .and_then(toml::Value::as_integer)
            .unwrap_or(default)
    }

    /// Negative values are treated as missing
    pub fn get_uint(&self, key: &str, default: u64) -> u64 {
        self.lookup(key)
            .and_then(toml::Value::as_integer)
            .and_then(|v| u64::try_from(v).ok())
            .unwrap_or(default)
    }

    /// Integers are widened to floats
    pub fn get_float(&self, key: &str, default: f64) -> f64 {
        match self.lookup(key) {
            Some(toml::Value::Float(f)) => *f,
            Some(toml::Value::Integer(i)) => *i as f64,
            _ => default,
        }
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.lookup(key)
            .and_then(toml::Value::as_bool)
            .unwrap_or(default)
    }

    /// String array; non-string elements are skipped
    pub fn get_string_array(&self, key: &str) -> Vec<String> {
        self.array(key)
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    }

    /// Integer array; non-integer elements are skipped
    pub fn get_int_array(&self, key: &str) -> Vec<i64> {
        self.array(key).filter_map(toml::Value::as_integer).collect()
    }

    pub fn get_float_array(&self, key: &str) -> Vec<f64> {
        self.array(key)
            .filter_map(|v| match v {
                toml::Value::Float(f) => Some(*f),
                toml::Value::Integer(i) => Some(*i as f64),
                _ => None,
            })
            .collect()
    }

    // ─── Sections ────────────────────────────────────────────────────

    /// Copy of a section as its own config (empty if absent)
    pub fn section(&self, name: &str) -> ModuleConfig {
        let values = self
            .lookup(name)
            .and_then(toml::Value::as_table)
            .cloned()
            .unwrap_or_default();
        ModuleConfig {
            values,
            dirty: false,
        }
    }

    /// Replace a section wholesale
    pub fn set_section(&mut self, name: &str, section: ModuleConfig) -> Result<(), ModuleError> {
        let (table, leaf) = self.parent_table_mut(name)?;
        table.insert(leaf.to_string(), toml::Value::Table(section.values));
        self.dirty = true;
        Ok(())
    }

    /// Names of top-level sections, sorted
    pub fn section_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .values
            .iter()
            .filter(|(_, v)| v.is_table())
            .map(|(k, _)| k.clone())
            .collect();
        names.sort();
        names
    }

    // ─── Dirty Tracking ──────────────────────────────────────────────

    /// Check if the config has been modified since loading/saving
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    // ─── Internals ───────────────────────────────────────────────────

    fn lookup(&self, key: &str) -> Option<&toml::Value> {
        let mut segments = key.split('.');
        let mut current = self.values.get(segments.next()?)?;
        for segment in segments {
            current = current.as_table()?.get(segment)?;
        }
        Some(current)
    }

    fn lookup_mut(&mut self, key: &str) -> Option<&mut toml::Value> {
        let mut segments = key.split('.');
        let mut current = self.values.get_mut(segments.next()?)?;
        for segment in segments {
            current = current.as_table_mut()?.get_mut(segment)?;
        }
        Some(current)
    }

    fn array(&self, key: &str) -> impl Iterator<Item = &toml::Value> {
        self.lookup(key)
            .and_then(toml::Value::as_array)
            .into_iter()
            .flatten()
    }

    fn parent_table_mut<'k>(
        &mut self,
        key: &'k str,
    ) -> Result<(&mut toml::Table, &'k str), ModuleError> {
        let (path, leaf) = match key.rsplit_once('.') {
            Some((path, leaf)) => (Some(path), leaf),
            None => (None, key),
        };
        if leaf.is_empty() {
            return Err(ModuleError::config(format!("invalid key '{}'", key)));
        }

        let mut table = &mut self.values;
        for segment in path.into_iter().flat_map(|p| p.split('.')) {
            let entry = table
                .entry(segment.to_string())
                .or_insert(toml::Value::Table(toml::Table::new()));
            table = match entry {
                toml::Value::Table(inner) => inner,
                _ => {
                    return Err(ModuleError::config(format!(
                        "'{}' in key '{}' is not a section",
                        segment, key
                    )));
                }
            };
        }
        Ok((table, leaf))
    }
}

fn collect_keys(table: &toml::Table, prefix: &str, out: &mut Vec<String>) {
    for (key, value) in table {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            toml::Value::Table(inner) => collect_keys(inner, &path, out),
            _ => out.push(path),
        }
    }
}
