//! realm-module-api - Module API for the realm server host
//!
//! This crate provides the traits and types needed to write modules for realm.
//! Modules are native Rust dynamic libraries that the host loads at startup,
//! drives through a fixed lifecycle, and notifies about engine events.
//!
//! # Example
//!
//! ```ignore
//! use realm_module_api::{
//!     Module, ModuleContext, ModuleDescriptor, ModuleError, ModuleState, export_module,
//! };
//!
//! pub struct MyModule {
//!     descriptor: ModuleDescriptor,
//!     state: ModuleState,
//! }
//!
//! impl Default for MyModule {
//!     fn default() -> Self {
//!         Self {
//!             descriptor: ModuleDescriptor {
//!                 name: "my-module".to_string(),
//!                 version: "0.1.0".to_string(),
//!                 ..Default::default()
//!             },
//!             state: ModuleState::Unloaded,
//!         }
//!     }
//! }
//!
//! impl Module for MyModule {
//!     fn descriptor(&self) -> &ModuleDescriptor { &self.descriptor }
//!     fn state(&self) -> ModuleState { self.state }
//!
//!     fn load(&mut self, ctx: &mut ModuleContext) -> Result<(), ModuleError> {
//!         ctx.log_info("loaded");
//!         self.state = ModuleState::Loaded;
//!         Ok(())
//!     }
//!     // initialize / start / stop / unload ...
//! }
//!
//! export_module!(MyModule);
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod types;

pub use config::ModuleConfig;
pub use context::ModuleContext;
pub use error::ModuleError;
pub use event::EventHandler;
pub use types::*;

use std::any::Any;
use std::sync::Arc;

/// Symbol of the mandatory constructor entry point
pub const CREATE_SYMBOL: &str = "_realm_module_create";

/// Symbol of the optional unit-level cleanup entry point
pub const DESTROY_SYMBOL: &str = "_realm_module_destroy";

/// Constructor exported by a module library. Returns null on failure.
#[allow(improper_ctypes_definitions)]
pub type CreateModuleFn = unsafe extern "C-unwind" fn() -> *mut dyn Module;

/// Unit-level cleanup exported by a module library, called just before it is closed.
pub type DestroyModuleFn = unsafe extern "C-unwind" fn();

/// The core module trait - implement this to create a realm module.
///
/// The host calls the lifecycle hooks in order:
/// `load` → `initialize` → `start` → `stop` → `unload`, possibly cycling
/// `initialize`/`start`/`stop` several times. A hook returning an error moves
/// the module into [`ModuleState::Error`], after which only `unload` is called.
pub trait Module: Send {
    /// Identity and metadata. Must not change once the module is loaded.
    fn descriptor(&self) -> &ModuleDescriptor;

    /// The module's own view of its lifecycle state
    fn state(&self) -> ModuleState;

    /// Called right after construction. Read persisted state here.
    fn load(&mut self, ctx: &mut ModuleContext) -> Result<(), ModuleError>;

    /// Called once every declared dependency is initialized
    fn initialize(&mut self, ctx: &mut ModuleContext) -> Result<(), ModuleError>;

    /// Called when the server starts delivering events
    fn start(&mut self, ctx: &mut ModuleContext) -> Result<(), ModuleError>;

    /// Called when event delivery stops
    fn stop(&mut self, ctx: &mut ModuleContext) -> Result<(), ModuleError>;

    /// Called right before the instance is destroyed
    fn unload(&mut self) -> Result<(), ModuleError>;

    /// Event-handler capability, if the module reacts to engine events.
    ///
    /// Queried once per initialization. The host holds the returned handler
    /// until the module stops and hands dispatch only weak references to it.
    fn event_handler(&self) -> Option<Arc<dyn EventHandler>> {
        None
    }

    /// Names of modules that must be initialized first
    fn dependencies(&self) -> &[String] {
        &self.descriptor().dependencies
    }

    /// Whether every declared dependency is currently loaded and initialized
    fn check_dependencies(&self, lookup: &dyn DependencyLookup) -> bool {
        self.dependencies()
            .iter()
            .all(|dep| lookup.state_of(dep).is_some_and(ModuleState::is_initialized))
    }

    /// Called after the host re-read this module's config file
    fn reload_config(&mut self, _ctx: &mut ModuleContext) {}

    /// A named service other modules may use, e.g. `"economy.ledger"`.
    ///
    /// Callers downcast the value to the concrete type both sides agree on.
    fn interface(&self, _name: &str) -> Option<Arc<dyn Any + Send + Sync>> {
        None
    }

    fn has_interface(&self, name: &str) -> bool {
        self.interface(name).is_some()
    }
}

/// Export a module type for dynamic loading.
///
/// This macro generates the C ABI entry points that realm uses to construct
/// a module instance and to clean up the library before it is closed.
///
/// # Usage
///
/// ```ignore
/// realm_module_api::export_module!(MyModule);
///
/// // with a unit-level cleanup routine
/// realm_module_api::export_module!(MyModule, || flush_global_state());
/// ```
///
/// # Generated Functions
///
/// - `_realm_module_create()`: Creates a new module instance (`Default`)
/// - `_realm_module_destroy()`: Runs the cleanup routine
#[macro_export]
macro_rules! export_module {
    ($module_type:ty) => {
        $crate::export_module!($module_type, || {});
    };
    ($module_type:ty, $cleanup:expr) => {
        #[allow(improper_ctypes_definitions)]
        #[unsafe(no_mangle)]
        pub extern "C-unwind" fn _realm_module_create() -> *mut dyn $crate::Module {
            let module: Box<dyn $crate::Module> = Box::new(<$module_type>::default());
            Box::into_raw(module)
        }

        #[unsafe(no_mangle)]
        pub extern "C-unwind" fn _realm_module_destroy() {
            let cleanup: fn() = $cleanup;
            cleanup();
        }
    };
}
