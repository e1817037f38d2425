//! Module config watcher with debouncing

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher, recommended_watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::error::PluginHostError;
use super::host::PluginHost;

/// Watches the module config directory and reloads module configs on change.
///
/// Must be created inside a tokio runtime. Dropping the watcher stops it.
pub struct ConfigWatcher {
    dir: PathBuf,
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl ConfigWatcher {
    /// Watch the host's configured module config directory
    pub fn spawn(host: Arc<PluginHost>) -> Result<Self, PluginHostError> {
        let dir = host.settings().config_dir.clone();
        let debounce = Duration::from_millis(host.settings().config_debounce_ms);
        Self::watch(host, &dir, debounce)
    }

    /// Watch `dir`, calling [`PluginHost::reload_plugin_configs`] once no
    /// config change has been seen for `debounce`.
    pub fn watch(
        host: Arc<PluginHost>,
        dir: &Path,
        debounce: Duration,
    ) -> Result<Self, PluginHostError> {
        std::fs::create_dir_all(dir)?;

        let (tx, rx) = mpsc::channel::<notify::Result<notify::Event>>(100);
        let mut watcher = recommended_watcher(move |event| {
            // Runs on the notify thread
            let _ = tx.blocking_send(event);
        })?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        tracing::debug!(dir = %dir.display(), "Watching module configs");

        let task = tokio::spawn(debounce_loop(rx, host, debounce));

        Ok(Self {
            dir: dir.to_path_buf(),
            _watcher: watcher,
            task,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Drop for ConfigWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Whether an event touches a module config file
fn is_config_change(event: &notify::Event) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) && event
        .paths
        .iter()
        .any(|p| p.extension().is_some_and(|ext| ext == "toml"))
}

async fn debounce_loop(
    mut rx: mpsc::Receiver<notify::Result<notify::Event>>,
    host: Arc<PluginHost>,
    debounce: Duration,
) {
    loop {
        // Wait for the first relevant change
        loop {
            match rx.recv().await {
                Some(Ok(event)) if is_config_change(&event) => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => tracing::warn!(error = %e, "Config watch error"),
                None => return,
            }
        }

        tracing::debug!("Config change detected, starting debounce");

        // Wait for a quiet period
        loop {
            match tokio::time::timeout(debounce, rx.recv()).await {
                Ok(Some(_)) => {}
                Ok(None) => return,
                Err(_) => break,
            }
        }

        let host = Arc::clone(&host);
        match tokio::task::spawn_blocking(move || host.reload_plugin_configs()).await {
            Ok(report) if report.is_complete() => {}
            Ok(report) => {
                tracing::warn!(failed = ?report.failed_names(), "Some module configs failed to reload");
            }
            Err(e) => tracing::error!(error = %e, "Config reload task failed"),
        }
    }
}
