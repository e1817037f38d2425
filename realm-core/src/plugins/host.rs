//! PluginHost - manages module lifecycle and event dispatch

use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use realm_module_api::{
    ChatMessage, Creature, DependencyLookup, EventHandler, GameObject, MapRef, ModuleConfig,
    ModuleContext, ModuleDescriptor, ModuleError, ModuleState, Packet, Player, Session, Unit,
};

use super::dispatch::EventDispatcher;
use super::error::{PluginHostError, ReloadStep};
use super::lifecycle::{Lifecycle, Transition};
use super::loader::{self, ModuleInstance, ModuleInterface, NativeLoader, UnitLoader};
use super::resolver::{self, Resolution};
use super::settings::HostSettings;

/// A loaded module with its runtime state
struct LoadedModule {
    /// Strong handler reference; the dispatcher only sees a weak one.
    /// Declared before `instance` so it is released before the code unit.
    handler: Option<Arc<dyn EventHandler>>,
    instance: ModuleInstance,
    context: ModuleContext,
    lifecycle: Lifecycle,
    descriptor: ModuleDescriptor,
    /// `Module::dependencies()` captured at load time
    dependencies: Vec<String>,
    path: PathBuf,
}

impl LoadedModule {
    fn state(&self) -> ModuleState {
        self.lifecycle.state()
    }
}

type Registry = HashMap<String, LoadedModule>;

/// Dependency lookup over the host's own view of module states
struct RegistryView<'a>(&'a Registry);

impl DependencyLookup for RegistryView<'_> {
    fn state_of(&self, name: &str) -> Option<ModuleState> {
        self.0.get(name).map(LoadedModule::state)
    }
}

/// Information about a loaded module
#[derive(Debug, Clone)]
pub struct PluginInfo {
    /// Module name
    pub name: String,
    /// Descriptor captured at load time
    pub descriptor: ModuleDescriptor,
    /// Host-tracked lifecycle state
    pub state: ModuleState,
    /// State the module reports about itself
    pub reported_state: ModuleState,
    /// Library the module was loaded from
    pub path: PathBuf,
}

/// Outcome of a directory scan
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    pub failed: Vec<(PathBuf, PluginHostError)>,
    pub skipped: Vec<PathBuf>,
}

/// Outcome of a bulk lifecycle operation
#[derive(Debug, Default)]
pub struct BulkReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, PluginHostError)>,
    pub skipped: Vec<String>,
}

impl BulkReport {
    /// True when no module failed
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_names(&self) -> Vec<&str> {
        self.failed.iter().map(|(name, _)| name.as_str()).collect()
    }
}

/// The plugin host loads modules, drives their lifecycle and fans out events.
///
/// All lifecycle and query operations hold the registry lock for their whole
/// duration. The dispatcher's handler table is locked strictly inside it.
pub struct PluginHost {
    modules: Mutex<Registry>,
    dispatcher: EventDispatcher,
    loader: Arc<dyn UnitLoader>,
    settings: HostSettings,
    last_error: Mutex<Option<String>>,
}

impl PluginHost {
    /// Create a host that loads native libraries
    pub fn new(settings: HostSettings) -> Self {
        Self::with_loader(settings, Arc::new(NativeLoader))
    }

    /// Create a host with a custom unit loader
    pub fn with_loader(settings: HostSettings, loader: Arc<dyn UnitLoader>) -> Self {
        Self {
            modules: Mutex::new(HashMap::new()),
            dispatcher: EventDispatcher::new(),
            loader,
            settings,
            last_error: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &HostSettings {
        &self.settings
    }

    /// Message of the most recent failed host operation
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    fn record<T>(
        &self,
        operation: &'static str,
        result: Result<T, PluginHostError>,
    ) -> Result<T, PluginHostError> {
        if let Err(e) = &result {
            self.note_failure(operation, e);
        }
        result
    }

    fn note_failure(&self, operation: &'static str, error: &PluginHostError) {
        tracing::error!(operation, error = %error, "Module operation failed");
        *self.last_error.lock() = Some(error.to_string());
    }

    // ─── Loading ─────────────────────────────────────────────────────

    /// Load every module library found directly inside `dir`.
    ///
    /// Files whose stem is disabled are skipped; a file that fails to load is
    /// logged and the scan continues.
    pub fn load_all_plugins(&self, dir: &Path) -> Result<LoadReport, PluginHostError> {
        let mut report = LoadReport::default();

        if !dir.exists() {
            tracing::warn!(dir = %dir.display(), "Module directory does not exist");
            return Ok(report);
        }

        let mut candidates = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if loader::is_module_library(&path) {
                candidates.push(path);
            }
        }
        candidates.sort();

        for path in candidates {
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
            if self.settings.is_disabled(stem) {
                tracing::debug!(path = %path.display(), "Module disabled, skipping");
                report.skipped.push(path);
                continue;
            }

            match self.load_plugin(&path) {
                Ok(name) => report.loaded.push(name),
                Err(e) => report.failed.push((path, e)),
            }
        }

        Ok(report)
    }

    /// Load one module library and run its `load` hook. Returns the module name.
    pub fn load_plugin(&self, path: &Path) -> Result<String, PluginHostError> {
        let result = self.load_locked(&mut self.modules.lock(), path);
        self.record("load", result)
    }

    fn load_locked(&self, registry: &mut Registry, path: &Path) -> Result<String, PluginHostError> {
        if !path.exists() {
            return Err(PluginHostError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        if let Some(existing) = registry.values().find(|m| same_library(&m.path, path)) {
            return Err(PluginHostError::DuplicateName {
                name: existing.descriptor.name.clone(),
            });
        }

        let unit = Arc::new(self.loader.open(path)?);
        let mut instance = unit.instantiate()?;
        drop(unit);

        let queried = std::panic::catch_unwind(AssertUnwindSafe(|| {
            let module = instance.module();
            (module.descriptor().clone(), module.dependencies().to_vec())
        }));
        let (descriptor, dependencies) = queried.map_err(|payload| {
            PluginHostError::InvalidDescriptor {
                reason: format!(
                    "descriptor query panicked: {}",
                    panic_message(payload.as_ref())
                ),
            }
        })?;
        let name = descriptor.name.clone();

        if registry.contains_key(&name) {
            return Err(PluginHostError::DuplicateName { name });
        }
        validate_descriptor(&descriptor)?;

        let config_path = self.settings.module_config_path(&name);
        let config = ModuleConfig::load(&config_path).unwrap_or_else(|e| {
            tracing::warn!(module = %name, error = %e, "Failed to read module config, using defaults");
            ModuleConfig::new()
        });
        let mut context =
            ModuleContext::with_config(name.clone(), self.settings.module_data_dir(&name), config)
                .with_config_path(config_path);

        let mut lifecycle = Lifecycle::new(&name);
        lifecycle.begin(Transition::Load)?;
        if let Err(reason) = run_hook(|| instance.module_mut().load(&mut context)) {
            lifecycle.fail();
            return Err(PluginHostError::LifecycleFailed {
                name,
                hook: "load",
                reason,
            });
        }
        lifecycle.complete();

        tracing::info!(
            module = %name,
            version = %descriptor.version,
            path = %path.display(),
            "Module loaded"
        );

        registry.insert(
            name.clone(),
            LoadedModule {
                handler: None,
                instance,
                context,
                lifecycle,
                descriptor,
                dependencies,
                path: path.to_path_buf(),
            },
        );
        Ok(name)
    }

    // ─── Unloading ───────────────────────────────────────────────────

    /// Stop (if running) and unload a module, then close its library
    pub fn unload_plugin(&self, name: &str) -> Result<(), PluginHostError> {
        let result = self.unload_locked(&mut self.modules.lock(), name);
        self.record("unload", result)
    }

    fn unload_locked(&self, registry: &mut Registry, name: &str) -> Result<(), PluginHostError> {
        let mut module = registry
            .remove(name)
            .ok_or_else(|| PluginHostError::NotFound {
                name: name.to_string(),
            })?;

        if module.state() == ModuleState::Running
            && let Err(e) = self.stop_module(&mut module)
        {
            tracing::warn!(module = %name, error = %e, "Stop failed during unload");
        }

        self.dispatcher.unregister(name);
        module.handler = None;

        if let Err(e) = module.lifecycle.begin(Transition::Unload) {
            tracing::warn!(module = %name, error = %e, "Unloading module from unexpected state");
        }
        if let Err(reason) = run_hook(|| module.instance.module_mut().unload()) {
            tracing::warn!(module = %name, reason = %reason, "Module unload hook failed");
        }
        module.lifecycle.complete();

        drop(module);
        tracing::info!(module = %name, "Module unloaded");
        Ok(())
    }

    /// Unload every module, dependents before their dependencies
    pub fn unload_all_plugins(&self) -> BulkReport {
        let mut registry = self.modules.lock();
        let mut report = BulkReport::default();

        let mut order = full_order(&registry);
        order.reverse();

        for name in order {
            match self.unload_locked(&mut registry, &name) {
                Ok(()) => report.succeeded.push(name),
                Err(e) => {
                    self.note_failure("unload", &e);
                    report.failed.push((name, e));
                }
            }
        }
        report
    }

    // ─── Initialization ──────────────────────────────────────────────

    /// Initialize one module once its dependencies are initialized
    pub fn initialize_plugin(&self, name: &str) -> Result<(), PluginHostError> {
        let result = self.initialize_locked(&mut self.modules.lock(), name);
        self.record("initialize", result)
    }

    fn initialize_locked(&self, registry: &mut Registry, name: &str) -> Result<(), PluginHostError> {
        let module = registry.get(name).ok_or_else(|| PluginHostError::NotFound {
            name: name.to_string(),
        })?;
        module.lifecycle.ensure(Transition::Initialize)?;

        let view = RegistryView(registry);
        let satisfied = std::panic::catch_unwind(AssertUnwindSafe(|| {
            module.instance.module().check_dependencies(&view)
        }))
        .unwrap_or(false);

        if !satisfied {
            let declared = &module.dependencies;
            let mut missing: Vec<String> = declared
                .iter()
                .filter(|dep| !view.state_of(dep).is_some_and(ModuleState::is_initialized))
                .cloned()
                .collect();
            if missing.is_empty() {
                missing = declared.clone();
            }
            return Err(PluginHostError::DependenciesNotMet {
                name: name.to_string(),
                missing,
            });
        }

        let module = registry.get_mut(name).ok_or_else(|| PluginHostError::NotFound {
            name: name.to_string(),
        })?;
        module.lifecycle.begin(Transition::Initialize)?;
        if let Err(reason) =
            run_hook(|| module.instance.module_mut().initialize(&mut module.context))
        {
            module.lifecycle.fail();
            return Err(PluginHostError::InitializeFailed {
                name: name.to_string(),
                reason,
            });
        }
        module.lifecycle.complete();

        let handler = std::panic::catch_unwind(AssertUnwindSafe(|| {
            module.instance.module().event_handler()
        }))
        .unwrap_or_else(|_| {
            tracing::warn!(module = %name, "event_handler() panicked, no events will be delivered");
            None
        });

        if let Some(handler) = &handler {
            self.dispatcher.register(
                name,
                module.descriptor.priority,
                handler,
                module.instance.unit(),
            );
        }
        module.handler = handler;

        tracing::info!(module = %name, "Module initialized");
        Ok(())
    }

    /// Initialize every loaded module in dependency order.
    ///
    /// Modules with `auto_load = false`, disabled modules and modules that
    /// are not in the `Loaded` state are skipped. Modules on a dependency
    /// cycle fail with `CircularDependency`; the rest proceed.
    pub fn initialize_all_plugins(&self) -> BulkReport {
        let mut registry = self.modules.lock();
        let mut report = BulkReport::default();

        let resolution = resolve_registry(&registry);
        for cycle in &resolution.cycles {
            let members = &cycle[..cycle.len().saturating_sub(1)];
            for member in members {
                if report.failed.iter().any(|(name, _)| name == member)
                    || report.skipped.contains(member)
                {
                    continue;
                }
                if registry
                    .get(member)
                    .is_some_and(|m| !self.wants_initialize(m))
                {
                    report.skipped.push(member.clone());
                    continue;
                }
                let error = PluginHostError::CircularDependency {
                    cycle: cycle.clone(),
                };
                self.note_failure("initialize", &error);
                report.failed.push((member.clone(), error));
            }
        }

        for name in resolution.order {
            let Some(module) = registry.get(&name) else {
                continue;
            };
            if !self.wants_initialize(module) {
                tracing::debug!(module = %name, state = %module.state(), "Skipping initialization");
                report.skipped.push(name);
                continue;
            }

            match self.initialize_locked(&mut registry, &name) {
                Ok(()) => report.succeeded.push(name),
                Err(e) => {
                    self.note_failure("initialize", &e);
                    report.failed.push((name, e));
                }
            }
        }

        report
    }

    /// Whether a bulk initialization should touch this module
    fn wants_initialize(&self, module: &LoadedModule) -> bool {
        module.descriptor.auto_load
            && !self.settings.is_disabled(&module.descriptor.name)
            && module.state() == ModuleState::Loaded
    }

    // ─── Start / Stop ────────────────────────────────────────────────

    /// Start an initialized module; its handler begins receiving events
    pub fn start_plugin(&self, name: &str) -> Result<(), PluginHostError> {
        let result = self.start_locked(&mut self.modules.lock(), name);
        self.record("start", result)
    }

    fn start_locked(&self, registry: &mut Registry, name: &str) -> Result<(), PluginHostError> {
        let module = registry
            .get_mut(name)
            .ok_or_else(|| PluginHostError::NotFound {
                name: name.to_string(),
            })?;
        module.lifecycle.begin(Transition::Start)?;
        if let Err(reason) = run_hook(|| module.instance.module_mut().start(&mut module.context)) {
            module.lifecycle.fail();
            self.dispatcher.unregister(name);
            module.handler = None;
            return Err(PluginHostError::LifecycleFailed {
                name: name.to_string(),
                hook: "start",
                reason,
            });
        }
        module.lifecycle.complete();

        self.dispatcher.set_running(name, true);
        tracing::info!(module = %name, "Module started");
        Ok(())
    }

    /// Stop a running module and remove its handler registration
    pub fn stop_plugin(&self, name: &str) -> Result<(), PluginHostError> {
        let result = self.stop_locked(&mut self.modules.lock(), name);
        self.record("stop", result)
    }

    fn stop_locked(&self, registry: &mut Registry, name: &str) -> Result<(), PluginHostError> {
        let module = registry
            .get_mut(name)
            .ok_or_else(|| PluginHostError::NotFound {
                name: name.to_string(),
            })?;
        self.stop_module(module)
    }

    fn stop_module(&self, module: &mut LoadedModule) -> Result<(), PluginHostError> {
        let name = module.descriptor.name.clone();
        module.lifecycle.ensure(Transition::Stop)?;

        self.dispatcher.unregister(&name);
        module.handler = None;

        module.lifecycle.begin(Transition::Stop)?;
        if let Err(reason) = run_hook(|| module.instance.module_mut().stop(&mut module.context)) {
            module.lifecycle.fail();
            return Err(PluginHostError::LifecycleFailed {
                name,
                hook: "stop",
                reason,
            });
        }
        module.lifecycle.complete();

        tracing::info!(module = %name, "Module stopped");
        Ok(())
    }

    /// Start every initialized module in dependency order
    pub fn start_all_plugins(&self) -> BulkReport {
        let mut registry = self.modules.lock();
        let mut report = BulkReport::default();

        for name in full_order(&registry) {
            if registry.get(&name).map(LoadedModule::state) != Some(ModuleState::Initialized) {
                report.skipped.push(name);
                continue;
            }
            match self.start_locked(&mut registry, &name) {
                Ok(()) => report.succeeded.push(name),
                Err(e) => {
                    self.note_failure("start", &e);
                    report.failed.push((name, e));
                }
            }
        }
        report
    }

    /// Stop every running module, dependents first
    pub fn stop_all_plugins(&self) -> BulkReport {
        let mut registry = self.modules.lock();
        let mut report = BulkReport::default();

        let mut order = full_order(&registry);
        order.reverse();

        for name in order {
            if registry.get(&name).map(LoadedModule::state) != Some(ModuleState::Running) {
                report.skipped.push(name);
                continue;
            }
            match self.stop_locked(&mut registry, &name) {
                Ok(()) => report.succeeded.push(name),
                Err(e) => {
                    self.note_failure("stop", &e);
                    report.failed.push((name, e));
                }
            }
        }
        report
    }

    // ─── Reload ──────────────────────────────────────────────────────

    /// Replace a module with a fresh instance from the same library.
    ///
    /// Runs stop (if running), unload, load and initialize, then start again
    /// if the module was running. The first failing step is reported.
    pub fn reload_plugin(&self, name: &str) -> Result<(), PluginHostError> {
        let result = self.reload_locked(&mut self.modules.lock(), name);
        self.record("reload", result)
    }

    fn reload_locked(&self, registry: &mut Registry, name: &str) -> Result<(), PluginHostError> {
        let (path, was_running) = registry
            .get(name)
            .map(|m| (m.path.clone(), m.state() == ModuleState::Running))
            .ok_or_else(|| PluginHostError::NotFound {
                name: name.to_string(),
            })?;

        let step = |step: ReloadStep| {
            move |source: PluginHostError| PluginHostError::ReloadFailed {
                name: name.to_string(),
                step,
                source: Box::new(source),
            }
        };

        if was_running {
            self.stop_locked(registry, name)
                .map_err(step(ReloadStep::Stop))?;
        }
        self.unload_locked(registry, name)
            .map_err(step(ReloadStep::Unload))?;
        let reloaded = self
            .load_locked(registry, &path)
            .map_err(step(ReloadStep::Load))?;
        self.initialize_locked(registry, &reloaded)
            .map_err(step(ReloadStep::Initialize))?;
        if was_running {
            self.start_locked(registry, &reloaded)
                .map_err(step(ReloadStep::Start))?;
        }

        tracing::info!(module = %reloaded, "Module reloaded");
        Ok(())
    }

    // ─── Configuration ───────────────────────────────────────────────

    /// Re-read every module's config file, notify the modules, then
    /// dispatch `on_config_reload` to running handlers.
    pub fn reload_plugin_configs(&self) -> BulkReport {
        let mut report = BulkReport::default();
        {
            let mut registry = self.modules.lock();
            let mut names: Vec<String> = registry.keys().cloned().collect();
            names.sort();

            for name in names {
                let Some(module) = registry.get_mut(&name) else {
                    continue;
                };
                let result = match module.context.reload_config() {
                    Ok(()) => run_hook(|| {
                        module.instance.module_mut().reload_config(&mut module.context);
                        Ok(())
                    }),
                    Err(e) => Err(e.to_string()),
                };

                match result {
                    Ok(()) => report.succeeded.push(name),
                    Err(reason) => {
                        let error = PluginHostError::LifecycleFailed {
                            name: name.clone(),
                            hook: "reload_config",
                            reason,
                        };
                        self.note_failure("reload_config", &error);
                        report.failed.push((name, error));
                    }
                }
            }
        }

        self.on_config_reload();
        tracing::info!(reloaded = report.succeeded.len(), "Module configs reloaded");
        report
    }

    // ─── Queries ─────────────────────────────────────────────────────

    /// Dependency-respecting initialization order of the loaded modules
    pub fn get_plugin_load_order(&self) -> Result<Vec<String>, PluginHostError> {
        let resolution = resolve_registry(&self.modules.lock());
        let result = match resolution.cycles.into_iter().next() {
            Some(cycle) => Err(PluginHostError::CircularDependency { cycle }),
            None => Ok(resolution.order),
        };
        self.record("load_order", result)
    }

    pub fn get_plugin_info(&self, name: &str) -> Option<PluginInfo> {
        self.modules.lock().get(name).map(plugin_info)
    }

    /// Info for every loaded module, sorted by name
    pub fn list_plugins(&self) -> Vec<PluginInfo> {
        let registry = self.modules.lock();
        let mut infos: Vec<PluginInfo> = registry.values().map(plugin_info).collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    pub fn loaded_plugin_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.modules.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn plugins_by_state(&self, state: ModuleState) -> Vec<String> {
        let mut names: Vec<String> = self
            .modules
            .lock()
            .iter()
            .filter(|(_, m)| m.state() == state)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn is_plugin_loaded(&self, name: &str) -> bool {
        self.modules.lock().contains_key(name)
    }

    pub fn plugin_count(&self) -> usize {
        self.modules.lock().len()
    }

    pub fn plugin_state(&self, name: &str) -> Option<ModuleState> {
        self.modules.lock().get(name).map(LoadedModule::state)
    }

    /// Look up a service another module publishes under `interface`.
    ///
    /// Only initialized or running modules answer. The returned handle keeps
    /// the publishing module's code loaded while it is held.
    pub fn get_plugin_interface(&self, plugin: &str, interface: &str) -> Option<ModuleInterface> {
        let registry = self.modules.lock();
        let module = registry.get(plugin)?;
        if !module.state().is_initialized() {
            return None;
        }

        let value = std::panic::catch_unwind(AssertUnwindSafe(|| {
            module.instance.module().interface(interface)
        }))
        .unwrap_or_else(|payload| {
            tracing::warn!(
                module = %plugin,
                interface,
                reason = %panic_message(payload.as_ref()),
                "interface() panicked"
            );
            None
        })?;

        Some(ModuleInterface::new(value, Arc::clone(module.instance.unit())))
    }

    /// Whether `name` currently has an event handler registration
    pub fn has_event_handler(&self, name: &str) -> bool {
        self.dispatcher.is_registered(name)
    }

    // ─── Events ──────────────────────────────────────────────────────

    pub fn on_player_login(&self, player: &Player) {
        self.dispatcher
            .notify("player_login", |h| h.on_player_login(player));
    }

    pub fn on_player_logout(&self, player: &Player) {
        self.dispatcher
            .notify("player_logout", |h| h.on_player_logout(player));
    }

    pub fn on_player_level_changed(&self, player: &Player, old_level: u8) {
        self.dispatcher.notify("player_level_changed", |h| {
            h.on_player_level_changed(player, old_level)
        });
    }

    /// Handlers see the message in priority order and may rewrite it
    pub fn on_player_chat(&self, player: &Player, message: &mut ChatMessage) {
        self.dispatcher
            .notify("player_chat", |h| h.on_player_chat(player, message));
    }

    pub fn on_player_kill(&self, killer: &Player, victim: &Player) {
        self.dispatcher
            .notify("player_kill", |h| h.on_player_kill(killer, victim));
    }

    pub fn on_player_kill_creature(&self, killer: &Player, victim: &Creature) {
        self.dispatcher.notify("player_kill_creature", |h| {
            h.on_player_kill_creature(killer, victim)
        });
    }

    pub fn on_creature_kill(&self, killer: &Creature, victim: &Unit) {
        self.dispatcher
            .notify("creature_kill", |h| h.on_creature_kill(killer, victim));
    }

    pub fn on_creature_death(&self, creature: &Creature, killer: Option<&Unit>) {
        self.dispatcher
            .notify("creature_death", |h| h.on_creature_death(creature, killer));
    }

    pub fn on_creature_respawn(&self, creature: &Creature) {
        self.dispatcher
            .notify("creature_respawn", |h| h.on_creature_respawn(creature));
    }

    pub fn on_game_object_use(&self, object: &GameObject, player: &Player) {
        self.dispatcher
            .notify("game_object_use", |h| h.on_game_object_use(object, player));
    }

    pub fn on_game_object_destroyed(&self, object: &GameObject, player: Option<&Player>) {
        self.dispatcher.notify("game_object_destroyed", |h| {
            h.on_game_object_destroyed(object, player)
        });
    }

    pub fn on_world_update(&self, diff_ms: u32) {
        self.dispatcher
            .notify("world_update", |h| h.on_world_update(diff_ms));
    }

    pub fn on_map_update(&self, map: &MapRef, diff_ms: u32) {
        self.dispatcher
            .notify("map_update", |h| h.on_map_update(map, diff_ms));
    }

    /// Returns false if any running handler rejected the packet
    pub fn on_packet_receive(&self, session: &Session, packet: &mut Packet) -> bool {
        self.dispatcher
            .request("packet_receive", |h| h.on_packet_receive(session, packet))
    }

    /// Returns false if any running handler rejected the packet
    pub fn on_packet_send(&self, session: &Session, packet: &Packet) -> bool {
        self.dispatcher
            .request("packet_send", |h| h.on_packet_send(session, packet))
    }

    pub fn on_server_start(&self) {
        self.dispatcher.notify("server_start", |h| h.on_server_start());
    }

    pub fn on_server_stop(&self) {
        self.dispatcher.notify("server_stop", |h| h.on_server_stop());
    }

    pub fn on_config_reload(&self) {
        self.dispatcher
            .notify("config_reload", |h| h.on_config_reload());
    }
}

impl Drop for PluginHost {
    fn drop(&mut self) {
        let report = self.unload_all_plugins();
        if !report.succeeded.is_empty() {
            tracing::debug!(count = report.succeeded.len(), "Unloaded modules on shutdown");
        }
    }
}

fn validate_descriptor(descriptor: &ModuleDescriptor) -> Result<(), PluginHostError> {
    if descriptor.name.trim().is_empty() {
        return Err(PluginHostError::InvalidDescriptor {
            reason: "module name is empty".to_string(),
        });
    }
    if descriptor.version.trim().is_empty() {
        return Err(PluginHostError::InvalidDescriptor {
            reason: format!("module '{}' has an empty version", descriptor.name),
        });
    }
    Ok(())
}

/// Same file, either literally or after resolving links
fn same_library(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn plugin_info(module: &LoadedModule) -> PluginInfo {
    let reported_state =
        std::panic::catch_unwind(AssertUnwindSafe(|| module.instance.module().state()))
            .unwrap_or_else(|_| {
                tracing::warn!(module = %module.descriptor.name, "state() panicked");
                ModuleState::Error
            });

    PluginInfo {
        name: module.descriptor.name.clone(),
        descriptor: module.descriptor.clone(),
        state: module.state(),
        reported_state,
        path: module.path.clone(),
    }
}

fn resolve_registry(registry: &Registry) -> Resolution {
    let mut names: Vec<String> = registry.keys().cloned().collect();
    names.sort();
    resolver::resolve(&names, |name| {
        registry.get(name).map(|m| m.dependencies.as_slice())
    })
}

/// Load order followed by any modules left out of it (cycle members)
fn full_order(registry: &Registry) -> Vec<String> {
    let resolution = resolve_registry(registry);
    let mut order = resolution.order;
    let mut rest: Vec<String> = registry
        .keys()
        .filter(|name| !order.contains(name))
        .cloned()
        .collect();
    rest.sort();
    order.extend(rest);
    order
}

/// Run a module hook, turning errors and panics into a reason string
fn run_hook<F>(hook: F) -> Result<(), String>
where
    F: FnOnce() -> Result<(), ModuleError>,
{
    match std::panic::catch_unwind(AssertUnwindSafe(hook)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(payload) => Err(format!("panicked: {}", panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
