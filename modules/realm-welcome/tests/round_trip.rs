//! Host-driven tests for the welcome module
//!
//! The module is linked in through a `StaticLoader`, so the host exercises
//! the same lifecycle a native load would.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use realm_core::api::{ModuleState, Player};
use realm_core::plugins::{HostSettings, PluginHost, StaticLoader, library_extension};
use realm_welcome::{STATS_FILE, Stats, WelcomeModule};

fn host(dir: &TempDir) -> (PluginHost, PathBuf) {
    let settings = HostSettings::rooted(dir.path());
    std::fs::create_dir_all(&settings.module_dir).unwrap();
    let path = settings
        .module_dir
        .join(format!("welcome.{}", library_extension()));
    std::fs::write(&path, b"").unwrap();

    let loader = StaticLoader::new().with_module(&path, || Box::new(WelcomeModule::default()));
    (PluginHost::with_loader(settings, Arc::new(loader)), path)
}

fn written_stats(path: &Path) -> Stats {
    let content = std::fs::read_to_string(path).unwrap();
    serde_json::from_str(&content).unwrap()
}

fn player(guid: u64, name: &str) -> Player {
    Player {
        guid,
        name: name.to_string(),
        level: 1,
        account_id: 1,
    }
}

#[test]
fn every_load_starts_with_zeroed_stats() {
    let dir = TempDir::new().unwrap();
    let (host, path) = host(&dir);
    let stats_path = host.settings().module_data_dir("welcome").join(STATS_FILE);

    for round in 1..=3 {
        assert_eq!(host.load_plugin(&path).unwrap(), "welcome");
        host.initialize_plugin("welcome").unwrap();
        host.start_plugin("welcome").unwrap();

        host.on_player_login(&player(round, "Jaina"));
        host.stop_plugin("welcome").unwrap();

        let written = written_stats(&stats_path);
        assert_eq!(written.total_logins, 1, "round {round}");
        assert_eq!(written.online_players, 0);

        host.unload_plugin("welcome").unwrap();
    }
}

#[test]
fn reload_resets_counters() {
    let dir = TempDir::new().unwrap();
    let (host, path) = host(&dir);
    let stats_path = host.settings().module_data_dir("welcome").join(STATS_FILE);

    host.load_plugin(&path).unwrap();
    host.initialize_plugin("welcome").unwrap();
    host.start_plugin("welcome").unwrap();
    host.on_player_login(&player(1, "Jaina"));
    host.on_player_login(&player(2, "Thrall"));

    // The reload's stop flushes the old instance's counters
    host.reload_plugin("welcome").unwrap();
    assert_eq!(written_stats(&stats_path).total_logins, 2);
    assert_eq!(host.plugin_state("welcome"), Some(ModuleState::Running));

    host.on_player_login(&player(3, "Anduin"));
    host.on_server_stop();
    assert_eq!(written_stats(&stats_path).total_logins, 1);
}
