//! realm serve command: host every module and drive the world loop
//!
//! Serving loads the module directory, brings every module up in dependency
//! order, then ticks `on_world_update` until Ctrl-C. Shutdown runs the
//! lifecycle in reverse.

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use realm_core::{BulkReport, ConfigWatcher, HostSettings, PluginHost};

/// Default world tick in milliseconds
pub const DEFAULT_TICK_MS: u64 = 50;

/// Arguments for the serve command
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Module directory (defaults to the configured one)
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// World update interval in milliseconds
    #[arg(long, default_value_t = DEFAULT_TICK_MS, value_parser = clap::value_parser!(u64).range(1..))]
    pub tick_ms: u64,

    /// Reload module configs when files in the config directory change
    #[arg(long)]
    pub watch: bool,
}

/// Run the serve command
pub async fn run(args: ServeArgs, settings_path: &Path) -> Result<()> {
    let settings = HostSettings::load(settings_path)
        .with_context(|| format!("reading {}", settings_path.display()))?;
    let watch = args.watch || settings.watch_config;
    let dir = args.dir.unwrap_or_else(|| settings.module_dir.clone());

    let host = Arc::new(PluginHost::new(settings));
    start_host(&host, &dir)?;

    let _watcher = if watch {
        match ConfigWatcher::spawn(Arc::clone(&host)) {
            Ok(watcher) => {
                info!(dir = %watcher.dir().display(), "Watching module configs");
                Some(watcher)
            }
            Err(e) => {
                warn!(error = %e, "Config watcher unavailable");
                None
            }
        }
    } else {
        None
    };

    host.on_server_start();
    info!(
        modules = host.plugin_count(),
        tick_ms = args.tick_ms,
        "Server running, press Ctrl-C to stop"
    );

    world_loop(&host, Duration::from_millis(args.tick_ms)).await;

    info!("Shutting down");
    host.on_server_stop();
    summarize("stop", &host.stop_all_plugins());
    summarize("unload", &host.unload_all_plugins());
    Ok(())
}

/// Load, initialize and start every module found in `dir`
fn start_host(host: &PluginHost, dir: &Path) -> Result<()> {
    let report = host.load_all_plugins(dir)?;
    info!(
        dir = %dir.display(),
        loaded = report.loaded.len(),
        failed = report.failed.len(),
        skipped = report.skipped.len(),
        "Scanned module directory"
    );

    summarize("initialize", &host.initialize_all_plugins());
    summarize("start", &host.start_all_plugins());
    Ok(())
}

/// Tick world updates until Ctrl-C
async fn world_loop(host: &PluginHost, tick: Duration) {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut last = Instant::now();

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = Instant::now();
                let diff = u32::try_from(now.duration_since(last).as_millis()).unwrap_or(u32::MAX);
                last = now;
                host.on_world_update(diff);
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                }
                break;
            }
        }
    }
}

fn summarize(operation: &str, report: &BulkReport) {
    for (name, error) in &report.failed {
        warn!(module = %name, error = %error, "Failed to {operation} module");
    }
    info!(
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        skipped = report.skipped.len(),
        "{operation} complete"
    );
}
