//! Welcome module - an example module for realm
//!
//! This module demonstrates:
//! - Basic module structure with the `export_module!` macro
//! - Reading settings from the module's config file and reacting to reloads
//! - An event handler sharing state with the module behind interior mutability
//! - Writing statistics to the module's data directory
//!
//! It greets players on login, counts logins, online players and level-ups,
//! and queues an item reward whenever a player levels up.
//!
//! Statistics are flushed to `stats.json` for external tooling but never
//! read back: every instance, including one created by a reload, counts
//! from zero.
//!
//! ## Configuration
//!
//! ```toml
//! [welcome]
//! enabled = true
//! message = "Welcome to the server!"
//!
//! [rewards]
//! enabled = true
//! item = 6948
//! count = 1
//!
//! [stats]
//! update_interval_ms = 10000
//! ```
//!
//! ## Installing
//!
//! ```bash
//! cargo build --release -p realm-welcome
//! cp target/release/librealm_welcome.so ~/.config/realm/modules/
//! realm modules info welcome
//! ```

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use realm_module_api::{
    ChatMessage, EventHandler, Module, ModuleConfig, ModuleContext, ModuleDescriptor, ModuleError,
    ModulePriority, ModuleState, Player, export_module,
};

/// File in the module's data directory the statistics are flushed to
pub const STATS_FILE: &str = "stats.json";

/// Settings read from `welcome.toml`
#[derive(Debug, Clone, PartialEq)]
pub struct WelcomeSettings {
    pub welcome_enabled: bool,
    pub welcome_message: String,
    pub rewards_enabled: bool,
    /// Item template granted on level-up
    pub reward_item: u32,
    pub reward_count: u32,
    /// How often statistics are flushed to disk
    pub update_interval_ms: u64,
}

impl Default for WelcomeSettings {
    fn default() -> Self {
        Self {
            welcome_enabled: true,
            welcome_message: "Welcome to the server!".to_string(),
            rewards_enabled: false,
            reward_item: 0,
            reward_count: 1,
            update_interval_ms: 10_000,
        }
    }
}

impl WelcomeSettings {
    /// Read settings, falling back to defaults for missing or mistyped keys
    pub fn from_config(config: &ModuleConfig) -> Self {
        let defaults = Self::default();
        Self {
            welcome_enabled: config.get_bool("welcome.enabled", defaults.welcome_enabled),
            welcome_message: config.get_string("welcome.message", &defaults.welcome_message),
            rewards_enabled: config.get_bool("rewards.enabled", defaults.rewards_enabled),
            reward_item: config
                .get("rewards.item")
                .unwrap_or(defaults.reward_item),
            reward_count: config
                .get("rewards.count")
                .unwrap_or(defaults.reward_count),
            update_interval_ms: config
                .get_uint("stats.update_interval_ms", defaults.update_interval_ms),
        }
    }
}

/// Counters for the current instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub total_logins: u64,
    pub total_level_ups: u64,
    /// Players online right now; never written out
    #[serde(skip)]
    pub online_players: u32,
}

/// An item owed to a player for reaching a new level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardGrant {
    pub player_guid: u64,
    pub level: u8,
    pub item: u32,
    pub count: u32,
}

/// State shared between the module and its event handler
#[derive(Default)]
pub struct Welcome {
    settings: RwLock<WelcomeSettings>,
    stats: Mutex<Stats>,
    rewards: Mutex<Vec<RewardGrant>>,
    greetings: Mutex<Vec<(u64, String)>>,
    stats_path: RwLock<Option<PathBuf>>,
    since_save_ms: AtomicU64,
}

impl Welcome {
    pub fn settings(&self) -> WelcomeSettings {
        self.settings.read().clone()
    }

    pub fn stats(&self) -> Stats {
        self.stats.lock().clone()
    }

    /// Drain rewards waiting to be delivered
    pub fn take_rewards(&self) -> Vec<RewardGrant> {
        std::mem::take(&mut *self.rewards.lock())
    }

    /// Drain welcome messages waiting to be delivered, keyed by player guid
    pub fn take_greetings(&self) -> Vec<(u64, String)> {
        std::mem::take(&mut *self.greetings.lock())
    }

    fn apply_config(&self, config: &ModuleConfig) {
        *self.settings.write() = WelcomeSettings::from_config(config);
    }

    fn set_stats_path(&self, path: PathBuf) {
        *self.stats_path.write() = Some(path);
    }

    fn save_stats(&self) {
        let Some(path) = self.stats_path.read().clone() else {
            return;
        };
        let stats = self.stats();
        match write_stats(&path, &stats) {
            Ok(()) => {
                self.since_save_ms.store(0, Ordering::Relaxed);
                tracing::debug!(module = "welcome", path = %path.display(), "Saved statistics");
            }
            Err(e) => {
                tracing::warn!(module = "welcome", path = %path.display(), error = %e, "Failed to save statistics");
            }
        }
    }
}

fn write_stats(path: &Path, stats: &Stats) -> Result<(), ModuleError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content =
        serde_json::to_string_pretty(stats).map_err(|e| ModuleError::Serialization(e.to_string()))?;
    std::fs::write(path, content)?;
    Ok(())
}

impl EventHandler for Welcome {
    fn on_player_login(&self, player: &Player) {
        let online = {
            let mut stats = self.stats.lock();
            stats.total_logins += 1;
            stats.online_players += 1;
            stats.online_players
        };
        tracing::debug!(module = "welcome", player = %player.name, online, "Player logged in");

        let settings = self.settings.read();
        if settings.welcome_enabled {
            let message = settings.welcome_message.replace("{player}", &player.name);
            tracing::info!(module = "welcome", player = %player.name, "{message}");
            self.greetings.lock().push((player.guid, message));
        }
    }

    fn on_player_logout(&self, player: &Player) {
        let mut stats = self.stats.lock();
        stats.online_players = stats.online_players.saturating_sub(1);
        tracing::debug!(module = "welcome", player = %player.name, online = stats.online_players, "Player logged out");
    }

    fn on_player_level_changed(&self, player: &Player, old_level: u8) {
        if player.level <= old_level {
            return;
        }
        self.stats.lock().total_level_ups += 1;

        let settings = self.settings.read();
        if !settings.rewards_enabled || settings.reward_item == 0 || settings.reward_count == 0 {
            return;
        }
        tracing::info!(
            module = "welcome",
            player = %player.name,
            level = player.level,
            item = settings.reward_item,
            count = settings.reward_count,
            "Granting level-up reward"
        );
        self.rewards.lock().push(RewardGrant {
            player_guid: player.guid,
            level: player.level,
            item: settings.reward_item,
            count: settings.reward_count,
        });
    }

    fn on_player_chat(&self, player: &Player, message: &mut ChatMessage) {
        tracing::debug!(
            module = "welcome",
            player = %player.name,
            guid = player.guid,
            kind = message.kind,
            "said: {}",
            message.text
        );
    }

    fn on_world_update(&self, diff_ms: u32) {
        let elapsed = self.since_save_ms.fetch_add(u64::from(diff_ms), Ordering::Relaxed)
            + u64::from(diff_ms);
        if elapsed >= self.settings.read().update_interval_ms {
            self.save_stats();
        }
    }

    fn on_server_start(&self) {
        tracing::info!(module = "welcome", "Server started");
    }

    fn on_server_stop(&self) {
        tracing::info!(module = "welcome", "Server stopping");
        self.save_stats();
    }

    fn on_config_reload(&self) {
        tracing::info!(module = "welcome", "Configuration reloaded");
    }
}

/// The welcome module
pub struct WelcomeModule {
    descriptor: ModuleDescriptor,
    state: ModuleState,
    welcome: Arc<Welcome>,
}

impl Default for WelcomeModule {
    fn default() -> Self {
        Self {
            descriptor: ModuleDescriptor {
                name: "welcome".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                author: "realm".to_string(),
                description: "Greets players, tracks logins and rewards level-ups".to_string(),
                priority: ModulePriority::Normal,
                auto_load: true,
                ..Default::default()
            },
            state: ModuleState::Unloaded,
            welcome: Arc::new(Welcome::default()),
        }
    }
}

impl WelcomeModule {
    /// Shared state, as seen by the event handler
    pub fn welcome(&self) -> &Arc<Welcome> {
        &self.welcome
    }
}

impl Module for WelcomeModule {
    fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    fn state(&self) -> ModuleState {
        self.state
    }

    fn load(&mut self, ctx: &mut ModuleContext) -> Result<(), ModuleError> {
        self.welcome.set_stats_path(ctx.data_dir().join(STATS_FILE));
        self.welcome.apply_config(ctx.config());

        ctx.log_info("Loaded");
        self.state = ModuleState::Loaded;
        Ok(())
    }

    fn initialize(&mut self, ctx: &mut ModuleContext) -> Result<(), ModuleError> {
        self.welcome.apply_config(ctx.config());
        let settings = self.welcome.settings();
        if settings.update_interval_ms == 0 {
            return Err(ModuleError::config("stats.update_interval_ms must be positive"));
        }
        self.state = ModuleState::Initialized;
        Ok(())
    }

    fn start(&mut self, ctx: &mut ModuleContext) -> Result<(), ModuleError> {
        self.welcome.since_save_ms.store(0, Ordering::Relaxed);
        ctx.log_info("Started");
        self.state = ModuleState::Running;
        Ok(())
    }

    fn stop(&mut self, ctx: &mut ModuleContext) -> Result<(), ModuleError> {
        self.welcome.save_stats();
        ctx.log_info("Stopped");
        self.state = ModuleState::Loaded;
        Ok(())
    }

    fn unload(&mut self) -> Result<(), ModuleError> {
        self.state = ModuleState::Unloaded;
        Ok(())
    }

    fn event_handler(&self) -> Option<Arc<dyn EventHandler>> {
        Some(Arc::clone(&self.welcome) as Arc<dyn EventHandler>)
    }

    fn reload_config(&mut self, ctx: &mut ModuleContext) {
        self.welcome.apply_config(ctx.config());
    }
}

export_module!(WelcomeModule);
