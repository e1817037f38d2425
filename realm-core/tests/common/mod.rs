//! Shared fixtures: recording test modules served by a `StaticLoader`

#![allow(dead_code)]

use parking_lot::Mutex;
use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use tempfile::TempDir;

use realm_core::api::{
    ChatMessage, EventHandler, Module, ModuleContext, ModuleDescriptor, ModuleError,
    ModulePriority, ModuleState, Packet, Player, Session,
};
use realm_core::plugins::{HostSettings, PluginHost, StaticLoader, library_extension};

/// Every hook and event call, formatted as `<module>:<call>`
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// How a test module behaves
#[derive(Debug, Clone)]
pub struct ModuleSpec {
    pub name: String,
    pub version: String,
    pub deps: Vec<String>,
    pub priority: ModulePriority,
    pub auto_load: bool,
    pub fail_in: Option<&'static str>,
    pub panic_in: Option<&'static str>,
    pub reject_packets: bool,
    pub panic_on_events: bool,
    pub with_handler: bool,
    /// Returned by `dependencies()` instead of the descriptor's list
    pub runtime_deps: Option<Vec<String>>,
    /// Interface names answered with a `String` of the form `<module>/<name>`
    pub interfaces: Vec<String>,
}

impl ModuleSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            deps: Vec::new(),
            priority: ModulePriority::Normal,
            auto_load: true,
            fail_in: None,
            panic_in: None,
            reject_packets: false,
            panic_on_events: false,
            with_handler: true,
            runtime_deps: None,
            interfaces: Vec::new(),
        }
    }

    pub fn depends_on(mut self, deps: &[&str]) -> Self {
        self.deps = deps.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn priority(mut self, priority: ModulePriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn manual(mut self) -> Self {
        self.auto_load = false;
        self
    }

    pub fn version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    /// Return an error from the named hook
    pub fn failing(mut self, hook: &'static str) -> Self {
        self.fail_in = Some(hook);
        self
    }

    /// Panic inside the named hook
    pub fn panicking(mut self, hook: &'static str) -> Self {
        self.panic_in = Some(hook);
        self
    }

    pub fn rejecting_packets(mut self) -> Self {
        self.reject_packets = true;
        self
    }

    pub fn panicking_on_events(mut self) -> Self {
        self.panic_on_events = true;
        self
    }

    pub fn without_handler(mut self) -> Self {
        self.with_handler = false;
        self
    }

    /// Report `deps` from `dependencies()` while the descriptor keeps its own list
    pub fn runtime_deps(mut self, deps: &[&str]) -> Self {
        self.runtime_deps = Some(deps.iter().map(|d| d.to_string()).collect());
        self
    }

    pub fn publishing(mut self, interfaces: &[&str]) -> Self {
        self.interfaces = interfaces.iter().map(|i| i.to_string()).collect();
        self
    }
}

/// Event handler that records what it receives
pub struct Recorder {
    name: String,
    log: CallLog,
    logins: AtomicU32,
    reject_packets: bool,
    panic_on_events: bool,
}

impl Recorder {
    fn push(&self, call: impl std::fmt::Display) {
        if self.panic_on_events {
            panic!("{} handler exploded", self.name);
        }
        self.log.lock().push(format!("{}:{}", self.name, call));
    }
}

impl EventHandler for Recorder {
    fn on_player_login(&self, player: &Player) {
        let count = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
        self.push(format!("login:{}#{}", player.name, count));
    }

    fn on_player_chat(&self, _player: &Player, message: &mut ChatMessage) {
        self.push("chat");
        message.text.push_str(&format!(" [{}]", self.name));
    }

    fn on_world_update(&self, diff_ms: u32) {
        self.push(format!("update:{diff_ms}"));
    }

    fn on_packet_receive(&self, _session: &Session, _packet: &mut Packet) -> bool {
        self.push("packet");
        !self.reject_packets
    }

    fn on_server_start(&self) {
        self.push("server_start");
    }

    fn on_config_reload(&self) {
        self.push("config_reload");
    }
}

/// Module whose hooks append to the shared log
pub struct TestModule {
    descriptor: ModuleDescriptor,
    state: ModuleState,
    spec: ModuleSpec,
    log: CallLog,
    handler: Arc<Recorder>,
}

impl TestModule {
    pub fn new(spec: ModuleSpec, log: CallLog) -> Self {
        let descriptor = ModuleDescriptor {
            name: spec.name.clone(),
            version: spec.version.clone(),
            author: "realm tests".to_string(),
            dependencies: spec.deps.clone(),
            priority: spec.priority,
            auto_load: spec.auto_load,
            ..Default::default()
        };
        let handler = Arc::new(Recorder {
            name: spec.name.clone(),
            log: Arc::clone(&log),
            logins: AtomicU32::new(0),
            reject_packets: spec.reject_packets,
            panic_on_events: spec.panic_on_events,
        });
        Self {
            descriptor,
            state: ModuleState::Unloaded,
            spec,
            log,
            handler,
        }
    }

    /// Panic if the spec asks a query method to explode
    fn query(&self, method: &'static str) {
        if self.spec.panic_in == Some(method) {
            panic!("{} exploded in {}", self.spec.name, method);
        }
    }

    fn hook(&mut self, hook: &'static str, next: ModuleState) -> Result<(), ModuleError> {
        self.log.lock().push(format!("{}:{}", self.spec.name, hook));
        if self.spec.panic_in == Some(hook) {
            panic!("{} exploded in {}", self.spec.name, hook);
        }
        if self.spec.fail_in == Some(hook) {
            self.state = ModuleState::Error;
            return Err(ModuleError::custom(format!("{hook} refused")));
        }
        self.state = next;
        Ok(())
    }
}

impl Module for TestModule {
    fn descriptor(&self) -> &ModuleDescriptor {
        self.query("descriptor");
        &self.descriptor
    }

    fn state(&self) -> ModuleState {
        self.query("state");
        self.state
    }

    fn dependencies(&self) -> &[String] {
        self.query("dependencies");
        self.spec
            .runtime_deps
            .as_deref()
            .unwrap_or(&self.descriptor.dependencies)
    }

    fn interface(&self, name: &str) -> Option<Arc<dyn Any + Send + Sync>> {
        self.query("interface");
        self.spec
            .interfaces
            .iter()
            .any(|i| i == name)
            .then(|| Arc::new(format!("{}/{}", self.spec.name, name)) as Arc<dyn Any + Send + Sync>)
    }

    fn load(&mut self, _ctx: &mut ModuleContext) -> Result<(), ModuleError> {
        self.hook("load", ModuleState::Loaded)
    }

    fn initialize(&mut self, _ctx: &mut ModuleContext) -> Result<(), ModuleError> {
        self.hook("initialize", ModuleState::Initialized)
    }

    fn start(&mut self, _ctx: &mut ModuleContext) -> Result<(), ModuleError> {
        self.hook("start", ModuleState::Running)
    }

    fn stop(&mut self, _ctx: &mut ModuleContext) -> Result<(), ModuleError> {
        self.hook("stop", ModuleState::Loaded)
    }

    fn unload(&mut self) -> Result<(), ModuleError> {
        self.hook("unload", ModuleState::Unloaded)
    }

    fn event_handler(&self) -> Option<Arc<dyn EventHandler>> {
        if self.spec.with_handler {
            Some(self.handler.clone() as Arc<dyn EventHandler>)
        } else {
            None
        }
    }

    fn reload_config(&mut self, ctx: &mut ModuleContext) {
        let greeting = ctx.config().get_string("greeting", "<none>");
        self.log
            .lock()
            .push(format!("{}:reload_config:{}", self.spec.name, greeting));
    }
}

/// A module directory, a loader and a call log shared by every test module
pub struct Fixture {
    pub dir: TempDir,
    pub loader: Arc<StaticLoader>,
    pub log: CallLog,
    constructed: Arc<AtomicUsize>,
    cleanups: Arc<AtomicUsize>,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("modules")).unwrap();
        Self {
            dir,
            loader: Arc::new(StaticLoader::new()),
            log: Arc::new(Mutex::new(Vec::new())),
            constructed: Arc::new(AtomicUsize::new(0)),
            cleanups: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn settings(&self) -> HostSettings {
        HostSettings::rooted(self.dir.path())
    }

    pub fn module_dir(&self) -> PathBuf {
        self.settings().module_dir
    }

    /// Library path for a file stem inside the module directory
    pub fn path_of(&self, stem: &str) -> PathBuf {
        self.module_dir()
            .join(format!("{stem}.{}", library_extension()))
    }

    /// Create a library file for `spec` and register its constructor
    pub fn add(&self, spec: ModuleSpec) -> PathBuf {
        let path = self.path_of(&spec.name);
        self.add_at(&path, spec);
        path
    }

    pub fn add_at(&self, path: &PathBuf, spec: ModuleSpec) {
        std::fs::write(path, b"").unwrap();
        let log = Arc::clone(&self.log);
        let constructed = Arc::clone(&self.constructed);
        let cleanups = Arc::clone(&self.cleanups);
        self.loader.register_with_cleanup(
            path.clone(),
            move || {
                constructed.fetch_add(1, Ordering::SeqCst);
                Box::new(TestModule::new(spec.clone(), Arc::clone(&log)))
            },
            move || {
                cleanups.fetch_add(1, Ordering::SeqCst);
            },
        );
    }

    pub fn host(&self) -> PluginHost {
        self.host_with(self.settings())
    }

    pub fn host_with(&self, settings: HostSettings) -> PluginHost {
        PluginHost::with_loader(settings, self.loader.clone())
    }

    /// Number of module instances constructed so far
    pub fn constructed(&self) -> usize {
        self.constructed.load(Ordering::SeqCst)
    }

    /// Number of units closed so far
    pub fn cleanups(&self) -> usize {
        self.cleanups.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    /// Calls recorded by one module, without the name prefix
    pub fn calls_for(&self, name: &str) -> Vec<String> {
        let prefix = format!("{name}:");
        self.log
            .lock()
            .iter()
            .filter_map(|c| c.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    /// Event calls only, in order, with the module prefix kept
    pub fn events(&self, event: &str) -> Vec<String> {
        let needle = format!(":{event}");
        self.log
            .lock()
            .iter()
            .filter(|c| c.contains(&needle))
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.log.lock().clear();
    }
}

/// Load every spec, initialize and start them all
pub fn running_host(fixture: &Fixture, specs: Vec<ModuleSpec>) -> PluginHost {
    for spec in specs {
        fixture.add(spec);
    }
    let host = fixture.host();
    let loaded = host.load_all_plugins(&fixture.module_dir()).unwrap();
    assert!(loaded.failed.is_empty(), "load failures: {:?}", loaded.failed);
    let init = host.initialize_all_plugins();
    assert!(init.is_complete(), "init failures: {:?}", init.failed);
    let start = host.start_all_plugins();
    assert!(start.is_complete(), "start failures: {:?}", start.failed);
    host
}

pub fn player(name: &str) -> Player {
    Player {
        guid: 1,
        name: name.to_string(),
        level: 1,
        account_id: 1,
    }
}
