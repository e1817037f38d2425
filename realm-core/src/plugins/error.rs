//! Plugin host error types

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use realm_module_api::ModuleState;

/// Errors that can occur in the plugin host
#[derive(Error, Debug)]
pub enum PluginHostError {
    /// Module library path does not exist
    #[error("Module file not found: {path}")]
    FileNotFound { path: PathBuf },

    /// The OS loader rejected the library
    #[error("Failed to load module library {path}: {message}")]
    LoadFailure { path: PathBuf, message: String },

    /// The mandatory constructor symbol is absent
    #[error("Module library {path} does not export '{symbol}'")]
    MissingEntryPoint { path: PathBuf, symbol: String },

    /// Descriptor has an empty name or version
    #[error("Invalid module descriptor: {reason}")]
    InvalidDescriptor { reason: String },

    /// A module with the same name is already loaded
    #[error("Module '{name}' is already loaded")]
    DuplicateName { name: String },

    /// Module not found
    #[error("Module '{name}' not found")]
    NotFound { name: String },

    /// A declared dependency is missing or not yet initialized
    #[error("Dependencies not met for module '{name}': {}", .missing.join(", "))]
    DependenciesNotMet { name: String, missing: Vec<String> },

    /// The module's initialize hook failed
    #[error("Module '{name}' failed to initialize: {reason}")]
    InitializeFailed { name: String, reason: String },

    /// The constructor returned null or panicked
    #[error("Module library {path} failed to construct an instance")]
    ConstructionFailed { path: PathBuf },

    /// Declared dependencies form a cycle
    #[error("Circular dependency: {}", .cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },

    /// Lifecycle operation not legal in the module's current state
    #[error("Cannot {operation} module '{name}' while it is {state}")]
    InvalidState {
        name: String,
        state: ModuleState,
        operation: &'static str,
    },

    /// A load/start/stop/unload hook failed
    #[error("Module '{name}' {hook} hook failed: {reason}")]
    LifecycleFailed {
        name: String,
        hook: &'static str,
        reason: String,
    },

    /// One step of a reload failed
    #[error("Reload of module '{name}' failed during {step}: {source}")]
    ReloadFailed {
        name: String,
        step: ReloadStep,
        #[source]
        source: Box<PluginHostError>,
    },

    /// Host settings could not be parsed or written
    #[error("Settings error: {0}")]
    Settings(String),

    /// Config directory watch failed
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The step of a reload that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadStep {
    Stop,
    Unload,
    Load,
    Initialize,
    Start,
}

impl fmt::Display for ReloadStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stop => "stop",
            Self::Unload => "unload",
            Self::Load => "load",
            Self::Initialize => "initialize",
            Self::Start => "start",
        };
        f.write_str(s)
    }
}
