use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "realm", about = "Module host for the realm server")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Host settings file (defaults to ~/.config/realm/host.toml)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and manage modules
    Modules(commands::modules::ModulesArgs),
    /// Load all modules and drive the world loop
    Serve(commands::serve::ServeArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings_path = cli
        .settings
        .unwrap_or_else(realm_core::HostSettings::default_path);

    match cli.command {
        Commands::Modules(args) => commands::modules::run(args, &settings_path),
        Commands::Serve(args) => commands::serve::run(args, &settings_path).await,
    }
}
