//! Module management commands

use anyhow::{Context, Result, bail};
use clap::{Args, Subcommand};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use std::path::{Path, PathBuf};

use realm_core::api::ModuleState;
use realm_core::{HostSettings, PluginHost, PluginHostError};

/// Module management arguments
#[derive(Args)]
pub struct ModulesArgs {
    #[command(subcommand)]
    pub command: ModulesCommands,
}

/// Module subcommands
#[derive(Subcommand)]
pub enum ModulesCommands {
    /// List modules found in the module directory
    List {
        /// Module directory (defaults to the configured one)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Print the dependency load order
    Order {
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Show module details
    Info {
        /// Module name
        name: String,
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Stop a module from being loaded
    Disable {
        /// Module name or library file stem
        name: String,
    },
    /// Allow a disabled module to load again
    Enable {
        /// Module name or library file stem
        name: String,
    },
}

/// Run module command
pub fn run(args: ModulesArgs, settings_path: &Path) -> Result<()> {
    let settings = HostSettings::load(settings_path)
        .with_context(|| format!("reading {}", settings_path.display()))?;

    match args.command {
        ModulesCommands::List { dir } => list_modules(settings, dir),
        ModulesCommands::Order { dir } => show_order(settings, dir),
        ModulesCommands::Info { name, dir } => show_info(settings, dir, &name),
        ModulesCommands::Disable { name } => set_disabled(settings, settings_path, &name, true),
        ModulesCommands::Enable { name } => set_disabled(settings, settings_path, &name, false),
    }
}

/// Build a host and load every module from `dir` (or the configured directory)
fn load_host(settings: HostSettings, dir: Option<PathBuf>) -> Result<PluginHost> {
    let dir = dir.unwrap_or_else(|| settings.module_dir.clone());
    let host = PluginHost::new(settings);
    let report = host.load_all_plugins(&dir)?;

    for (path, error) in &report.failed {
        eprintln!("✗ {}: {}", path.display(), error);
    }
    for path in &report.skipped {
        tracing::debug!(path = %path.display(), "Skipped disabled module");
    }
    Ok(host)
}

fn list_modules(settings: HostSettings, dir: Option<PathBuf>) -> Result<()> {
    let module_dir = dir.clone().unwrap_or_else(|| settings.module_dir.clone());
    let host = load_host(settings, dir)?;
    let modules = host.list_plugins();

    if modules.is_empty() {
        println!("No modules loaded");
        println!();
        println!("Module directory: {}", module_dir.display());
        println!();
        println!("To install a module:");
        println!("  1. Build it: cargo build --release -p my-module");
        println!(
            "  2. Copy the library: cp target/release/libmy_module.{} {}/",
            realm_core::plugins::library_extension(),
            module_dir.display()
        );
        println!("  3. Check it loads: realm modules list");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Name").fg(Color::Cyan),
        Cell::new("Version").fg(Color::Cyan),
        Cell::new("Priority").fg(Color::Cyan),
        Cell::new("Author").fg(Color::Cyan),
        Cell::new("State").fg(Color::Cyan),
        Cell::new("Description").fg(Color::Cyan),
    ]);

    for info in modules {
        let d = &info.descriptor;
        table.add_row(vec![
            Cell::new(&d.name),
            Cell::new(&d.version),
            Cell::new(d.priority),
            Cell::new(or_placeholder(&d.author, "Unknown")),
            Cell::new(info.state).fg(state_color(info.state)),
            Cell::new(or_placeholder(&d.description, "No description")),
        ]);
    }

    println!("{table}");
    Ok(())
}

fn show_order(settings: HostSettings, dir: Option<PathBuf>) -> Result<()> {
    let host = load_host(settings, dir)?;

    match host.get_plugin_load_order() {
        Ok(order) if order.is_empty() => println!("No modules loaded"),
        Ok(order) => {
            for (i, name) in order.iter().enumerate() {
                println!("{:>3}. {}", i + 1, name);
            }
        }
        Err(PluginHostError::CircularDependency { cycle }) => {
            bail!("dependency cycle: {}", cycle.join(" -> "));
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

fn show_info(settings: HostSettings, dir: Option<PathBuf>, name: &str) -> Result<()> {
    let host = load_host(settings, dir)?;

    let Some(info) = host.get_plugin_info(name) else {
        println!("Module '{}' not found", name);
        println!();
        println!("The module might not be installed, or it may be disabled.");
        println!("Run 'realm modules list' to see loaded modules.");
        return Ok(());
    };

    let d = &info.descriptor;
    println!("Name:         {}", d.name);
    println!("Version:      {}", d.version);
    println!("Author:       {}", or_placeholder(&d.author, "Unknown"));
    println!("Description:  {}", or_placeholder(&d.description, "No description"));
    if !d.website.is_empty() {
        println!("Website:      {}", d.website);
    }
    println!("Priority:     {}", d.priority);
    println!("Auto-load:    {}", if d.auto_load { "yes" } else { "no" });
    println!(
        "Dependencies: {}",
        if d.dependencies.is_empty() {
            "none".to_string()
        } else {
            d.dependencies.join(", ")
        }
    );
    println!("State:        {}", info.state);
    println!("Library:      {}", info.path.display());
    Ok(())
}

fn set_disabled(
    mut settings: HostSettings,
    settings_path: &Path,
    name: &str,
    disabled: bool,
) -> Result<()> {
    let changed = if disabled {
        settings.disable(name)
    } else {
        settings.enable(name)
    };

    if !changed {
        println!(
            "Module '{}' is already {}",
            name,
            if disabled { "disabled" } else { "enabled" }
        );
        return Ok(());
    }

    settings.save(settings_path)?;
    if disabled {
        println!("Disabled module: {}", name);
    } else {
        println!("Enabled module: {}", name);
        println!("Run 'realm modules list' to verify the module loads correctly.");
    }
    Ok(())
}

fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.is_empty() { placeholder } else { value }
}

fn state_color(state: ModuleState) -> Color {
    match state {
        ModuleState::Running => Color::Green,
        ModuleState::Error => Color::Red,
        ModuleState::Unloaded => Color::DarkGrey,
        _ => Color::Reset,
    }
}
