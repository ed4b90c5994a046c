//! l3vpn — L3 VPN service reconciler for provider edge routers.
//!
//! # Usage
//!
//! ```text
//! l3vpn [--config <path>] [-v] reconcile [--commit] [--yes] [--host <name>]... [--json]
//! l3vpn [--config <path>] catalog [--site <name>] [--json]
//! l3vpn [--config <path>] inventory [--json]
//! ```

mod commands;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use commands::{catalog::CatalogArgs, inventory::InventoryArgs, reconcile::ReconcileArgs};
use l3vpn_core::RunConfig;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "l3vpn",
    version,
    about = "Reconcile L3 VPN services on provider edge routers",
    long_about = None,
)]
struct Cli {
    /// Run configuration file.
    #[arg(long, global = true, env = "L3VPN_CONFIG", default_value = "config.yaml")]
    config: PathBuf,

    /// Log progress to stderr (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Bring every device in line with the service catalog.
    Reconcile(ReconcileArgs),

    /// List catalog services, or one site's assignments.
    Catalog(CatalogArgs),

    /// List hosts with their resolved site and homing mode.
    Inventory(InventoryArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Reconcile(args) => args.run(&cli.config, cli.verbose),
        Commands::Catalog(args) => args.run(&cli.config).map(|()| ExitCode::SUCCESS),
        Commands::Inventory(args) => args.run(&cli.config).map(|()| ExitCode::SUCCESS),
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Load the run configuration, naming the file on failure.
pub(crate) fn load_config(path: &Path) -> Result<RunConfig> {
    RunConfig::load_at(path)
        .with_context(|| format!("failed to load run configuration {}", path.display()))
}
