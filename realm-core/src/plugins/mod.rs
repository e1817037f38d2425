//! Module host for realm
//!
//! This module provides the infrastructure for loading and driving modules:
//!
//! - [`PluginHost`]: loads, initializes, starts, stops and unloads modules and
//!   fans out engine events to the running ones
//! - [`UnitLoader`]: opens code units ([`NativeLoader`] for shared libraries,
//!   [`StaticLoader`] for linked-in constructors)
//! - [`EventDispatcher`]: priority-ordered handler snapshots
//! - [`HostSettings`]: module directories and the disabled list
//! - [`ConfigWatcher`]: reloads module configs when their files change
//!
//! # Lifecycle
//!
//! ```text
//! Unloaded -load-> Loaded -initialize-> Initialized -start-> Running
//!                    ^                                          |
//!                    +------------------stop--------------------+
//! ```
//!
//! A failing hook moves the module to `Error`, from which it can only be
//! unloaded.
//!
//! # Example
//!
//! ```ignore
//! use realm_core::plugins::{HostSettings, PluginHost};
//!
//! let settings = HostSettings::load(&HostSettings::default_path())?;
//! let host = PluginHost::new(settings.clone());
//!
//! host.load_all_plugins(&settings.module_dir)?;
//! host.initialize_all_plugins();
//! host.start_all_plugins();
//!
//! host.on_world_update(50);
//! ```

mod dispatch;
mod error;
mod host;
mod lifecycle;
mod loader;
mod resolver;
mod settings;
mod watcher;

pub use dispatch::{EventDispatcher, HandlerRef};
pub use error::{PluginHostError, ReloadStep};
pub use host::{BulkReport, LoadReport, PluginHost, PluginInfo};
pub use lifecycle::{Lifecycle, Transition};
pub use loader::{
    LoadedUnit, ModuleInstance, ModuleInterface, NativeLoader, StaticLoader, UnitLoader,
    is_module_library, library_extension,
};
pub use resolver::{Resolution, resolve};
pub use settings::HostSettings;
pub use watcher::ConfigWatcher;
