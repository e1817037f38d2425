//! Config watcher tests

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Fixture, ModuleSpec, running_host};
use realm_core::ConfigWatcher;

async fn wait_for(fixture: &Fixture, entry: &str) -> bool {
    for _ in 0..100 {
        if fixture.calls().iter().any(|c| c == entry) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn config_change_triggers_reload() {
    let fixture = Fixture::new();
    let host = Arc::new(running_host(&fixture, vec![ModuleSpec::new("welcome")]));
    let config_path = host.settings().module_config_path("welcome");

    let watcher =
        ConfigWatcher::watch(Arc::clone(&host), &host.settings().config_dir, Duration::from_millis(100))
            .unwrap();
    assert_eq!(watcher.dir(), host.settings().config_dir.as_path());

    // Give the backend a moment to arm
    tokio::time::sleep(Duration::from_millis(100)).await;
    std::fs::write(&config_path, "greeting = \"hello\"\n").unwrap();

    assert!(
        wait_for(&fixture, "welcome:reload_config:hello").await,
        "calls: {:?}",
        fixture.calls()
    );
    assert!(wait_for(&fixture, "welcome:config_reload").await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn non_config_files_are_ignored() {
    let fixture = Fixture::new();
    let host = Arc::new(running_host(&fixture, vec![ModuleSpec::new("welcome")]));
    let dir = host.settings().config_dir.clone();

    let _watcher = ConfigWatcher::watch(Arc::clone(&host), &dir, Duration::from_millis(50)).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    std::fs::write(dir.join("notes.txt"), "not a config").unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(
        !fixture
            .calls()
            .iter()
            .any(|c| c.contains("reload_config"))
    );
}
