//! Filesystem layout of a realm server.
//!
//! Everything the host reads or writes lives under two XDG base directories,
//! on every platform:
//!
//! ```text
//! $XDG_CONFIG_HOME/realm/            (~/.config/realm)
//!     host.toml                      host settings
//!     modules/                       module libraries, scanned at startup
//!     module-config/<name>.toml      one config file per module
//! $XDG_DATA_HOME/realm/              (~/.local/share/realm)
//!     modules/<name>/                data a module writes at runtime
//! ```
//!
//! realm-core's `HostSettings` starts from these defaults; each directory
//! can be moved in `host.toml`.

use std::path::PathBuf;

/// `$<var>/realm`, falling back to `<home>/<fallback>/realm`
fn base_dir(var: &str, fallback: &str) -> PathBuf {
    match std::env::var_os(var) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir).join("realm"),
        _ => dirs::home_dir()
            .unwrap_or_default()
            .join(fallback)
            .join("realm"),
    }
}

/// Root of everything an operator edits: host settings, module libraries and
/// module configs.
///
/// Returns `$XDG_CONFIG_HOME/realm` if set, otherwise `~/.config/realm`.
///
/// # Examples
///
/// ```
/// use realm_paths::config_dir;
///
/// let overrides = config_dir().join("module-config/welcome.toml");
/// assert!(overrides.ends_with("realm/module-config/welcome.toml"));
/// ```
pub fn config_dir() -> PathBuf {
    base_dir("XDG_CONFIG_HOME", ".config")
}

/// Root of state modules produce while the server runs.
///
/// Returns `$XDG_DATA_HOME/realm` if set, otherwise `~/.local/share/realm`.
pub fn data_dir() -> PathBuf {
    base_dir("XDG_DATA_HOME", ".local/share")
}

/// The host settings file read by `realm serve` and `realm modules`
pub fn host_settings_path() -> PathBuf {
    config_dir().join("host.toml")
}

/// Default directory scanned for module libraries
pub fn module_dir() -> PathBuf {
    config_dir().join("modules")
}

/// Default directory holding `<module>.toml` config files
pub fn module_config_dir() -> PathBuf {
    config_dir().join("module-config")
}

/// Default root for per-module data directories.
///
/// # Examples
///
/// ```
/// use realm_paths::module_data_dir;
///
/// let stats = module_data_dir().join("welcome").join("stats.json");
/// assert!(stats.ends_with("realm/modules/welcome/stats.json"));
/// ```
pub fn module_data_dir() -> PathBuf {
    data_dir().join("modules")
}
