//! realm-core: module host for the realm server
//!
//! The host loads independently built modules from native libraries, drives
//! each through its lifecycle in dependency order, and delivers engine events
//! to the running ones by priority.
//!
//! - **Loading** - [`plugins::NativeLoader`] opens shared libraries exporting
//!   the `realm-module-api` entry points
//! - **Lifecycle** - [`PluginHost`] tracks every module's state and refuses
//!   illegal transitions
//! - **Ordering** - dependencies are initialized first; cycles are reported
//! - **Dispatch** - events reach running handlers highest priority first
//!
//! Module authors depend on `realm-module-api`, re-exported here as [`api`].

pub mod plugins;

pub use plugins::{
    BulkReport, ConfigWatcher, HostSettings, LoadReport, PluginHost, PluginHostError, PluginInfo,
};
pub use realm_module_api as api;
