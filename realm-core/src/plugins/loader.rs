//! Code-unit loading: native libraries and linked-in constructors
//!
//! A [`LoadedUnit`] owns the code backing a module. Every [`ModuleInstance`]
//! holds an `Arc` to its unit and drops its module before that `Arc`, so the
//! library can never be closed while an instance or handler created from it
//! is still alive.

use libloading::Library;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use realm_module_api::{
    CREATE_SYMBOL, CreateModuleFn, DESTROY_SYMBOL, DestroyModuleFn, Module,
};

use super::error::PluginHostError;

type Constructor = Box<dyn Fn() -> Option<Box<dyn Module>> + Send + Sync>;
type Cleanup = Box<dyn Fn() + Send + Sync>;

/// File extension of native module libraries on this platform
pub fn library_extension() -> &'static str {
    std::env::consts::DLL_EXTENSION
}

/// Whether a path looks like a native module library
pub fn is_module_library(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == library_extension())
}

/// Opens code units from files
pub trait UnitLoader: Send + Sync {
    /// Open the unit at `path` and resolve its entry points
    fn open(&self, path: &Path) -> Result<LoadedUnit, PluginHostError>;
}

/// An opened code unit with resolved entry points
pub struct LoadedUnit {
    path: PathBuf,
    constructor: Constructor,
    cleanup: Option<Cleanup>,
    /// Declared last: fields drop in order, so the library outlives both entry points
    library: Option<Library>,
}

impl LoadedUnit {
    /// Wrap a native library and its exported entry points
    fn native(
        path: PathBuf,
        library: Library,
        create: CreateModuleFn,
        destroy: Option<DestroyModuleFn>,
    ) -> Self {
        let constructor: Constructor = Box::new(move || {
            // SAFETY: `create` was resolved from `library`, which this unit keeps open
            // for as long as the closure exists.
            let raw = unsafe { create() };
            if raw.is_null() {
                None
            } else {
                // SAFETY: the export_module! constructor hands out a pointer obtained
                // from `Box::into_raw`, transferring ownership to us.
                Some(unsafe { Box::from_raw(raw) })
            }
        });

        let cleanup = destroy.map(|destroy| -> Cleanup {
            // SAFETY: same library lifetime argument as for `create`.
            Box::new(move || unsafe { destroy() })
        });

        Self {
            path,
            constructor,
            cleanup,
            library: Some(library),
        }
    }

    /// Wrap an in-process constructor
    pub fn linked<F>(path: PathBuf, constructor: F) -> Self
    where
        F: Fn() -> Box<dyn Module> + Send + Sync + 'static,
    {
        Self {
            path,
            constructor: Box::new(move || Some(constructor())),
            cleanup: None,
            library: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_native(&self) -> bool {
        self.library.is_some()
    }

    /// Construct one module instance bound to this unit.
    ///
    /// A null result or a panic inside the constructor is reported as
    /// [`PluginHostError::ConstructionFailed`].
    pub fn instantiate(self: &Arc<Self>) -> Result<ModuleInstance, PluginHostError> {
        let constructed = std::panic::catch_unwind(AssertUnwindSafe(|| (self.constructor)()));
        match constructed {
            Ok(Some(module)) => Ok(ModuleInstance {
                module,
                unit: Arc::clone(self),
            }),
            Ok(None) | Err(_) => Err(PluginHostError::ConstructionFailed {
                path: self.path.clone(),
            }),
        }
    }
}

impl Drop for LoadedUnit {
    fn drop(&mut self) {
        if let Some(cleanup) = self.cleanup.take()
            && std::panic::catch_unwind(AssertUnwindSafe(|| cleanup())).is_err()
        {
            tracing::warn!(path = %self.path.display(), "Module cleanup routine panicked");
        }

        if self.library.take().is_some() {
            tracing::debug!(path = %self.path.display(), "Module library closed");
        }
    }
}

impl std::fmt::Debug for LoadedUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedUnit")
            .field("path", &self.path)
            .field("native", &self.is_native())
            .finish()
    }
}

/// A module instance together with the unit whose code it runs.
pub struct ModuleInstance {
    module: Box<dyn Module>,
    /// Declared after `module` so the unit is released only once the module is gone
    unit: Arc<LoadedUnit>,
}

impl ModuleInstance {
    pub fn module(&self) -> &dyn Module {
        self.module.as_ref()
    }

    pub fn module_mut(&mut self) -> &mut dyn Module {
        self.module.as_mut()
    }

    pub fn unit(&self) -> &Arc<LoadedUnit> {
        &self.unit
    }
}

/// A service published by a module through [`Module::interface`].
///
/// Holds the unit that produced the value, so the value's code stays mapped
/// for as long as any caller keeps the handle, even past an unload.
pub struct ModuleInterface {
    value: Arc<dyn Any + Send + Sync>,
    /// Declared after `value` so the value is released before the unit
    _unit: Arc<LoadedUnit>,
}

impl ModuleInterface {
    pub(crate) fn new(value: Arc<dyn Any + Send + Sync>, unit: Arc<LoadedUnit>) -> Self {
        Self { value, _unit: unit }
    }

    /// The service as its concrete type, if it is a `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }
}

impl std::fmt::Debug for ModuleInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleInterface")
            .field("unit", &self._unit.path())
            .finish_non_exhaustive()
    }
}

// ─── Native Loader ───────────────────────────────────────────────────

/// Loads modules from native dynamic libraries
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeLoader;

impl UnitLoader for NativeLoader {
    fn open(&self, path: &Path) -> Result<LoadedUnit, PluginHostError> {
        if !path.exists() {
            return Err(PluginHostError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        // SAFETY: loading a library runs its initializers. Module libraries are
        // trusted collaborators placed in the module directory by the operator.
        let library = unsafe { Library::new(path) }.map_err(|e| PluginHostError::LoadFailure {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        // SAFETY: the symbol type matches the one emitted by `export_module!`.
        let create = unsafe { library.get::<CreateModuleFn>(CREATE_SYMBOL.as_bytes()) }
            .map(|symbol| *symbol)
            .map_err(|_| PluginHostError::MissingEntryPoint {
                path: path.to_path_buf(),
                symbol: CREATE_SYMBOL.to_string(),
            })?;

        // SAFETY: as above; the cleanup symbol is optional.
        let destroy = unsafe { library.get::<DestroyModuleFn>(DESTROY_SYMBOL.as_bytes()) }
            .map(|symbol| *symbol)
            .ok();

        Ok(LoadedUnit::native(
            path.to_path_buf(),
            library,
            create,
            destroy,
        ))
    }
}

// ─── Static Loader ───────────────────────────────────────────────────

type SharedConstructor = Arc<dyn Fn() -> Box<dyn Module> + Send + Sync>;
type SharedCleanup = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone)]
struct Registration {
    constructor: SharedConstructor,
    cleanup: Option<SharedCleanup>,
}

/// Loads modules from constructors registered against file paths.
///
/// Used for modules linked into the server binary and for tests. The file
/// must still exist, mirroring what the native loader requires.
#[derive(Default)]
pub struct StaticLoader {
    registrations: RwLock<HashMap<PathBuf, Registration>>,
}

impl StaticLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the constructor served for `path`
    pub fn register<F>(&self, path: impl Into<PathBuf>, constructor: F)
    where
        F: Fn() -> Box<dyn Module> + Send + Sync + 'static,
    {
        self.registrations.write().insert(
            path.into(),
            Registration {
                constructor: Arc::new(constructor),
                cleanup: None,
            },
        );
    }

    /// Register a constructor plus a unit-level cleanup run whenever a unit
    /// opened from `path` is closed
    pub fn register_with_cleanup<F, C>(&self, path: impl Into<PathBuf>, constructor: F, cleanup: C)
    where
        F: Fn() -> Box<dyn Module> + Send + Sync + 'static,
        C: Fn() + Send + Sync + 'static,
    {
        self.registrations.write().insert(
            path.into(),
            Registration {
                constructor: Arc::new(constructor),
                cleanup: Some(Arc::new(cleanup)),
            },
        );
    }

    /// Builder form of [`StaticLoader::register`]
    pub fn with_module<F>(self, path: impl Into<PathBuf>, constructor: F) -> Self
    where
        F: Fn() -> Box<dyn Module> + Send + Sync + 'static,
    {
        self.register(path, constructor);
        self
    }
}

impl UnitLoader for StaticLoader {
    fn open(&self, path: &Path) -> Result<LoadedUnit, PluginHostError> {
        if !path.exists() {
            return Err(PluginHostError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let Registration {
            constructor,
            cleanup,
        } = self.registrations.read().get(path).cloned().ok_or_else(|| {
            PluginHostError::MissingEntryPoint {
                path: path.to_path_buf(),
                symbol: CREATE_SYMBOL.to_string(),
            }
        })?;

        let mut unit = LoadedUnit::linked(path.to_path_buf(), move || constructor());
        unit.cleanup = cleanup.map(|cleanup| -> Cleanup { Box::new(move || cleanup()) });
        Ok(unit)
    }
}
