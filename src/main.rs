//! `dockship` application entry point.
//!
//! Uses `eyre` for opaque error handling at the application boundary,
//! converting domain-specific errors into human-readable reports.
//!
//! Configuration is loaded with layered precedence via `OrthoConfig`:
//! 1. Application defaults
//! 2. Configuration file (`~/.config/dockship/config.toml` or path from `DOCKSHIP_CONFIG_PATH`)
//! 3. Environment variables (`DOCKSHIP_*`)
//! 4. Command-line arguments

use clap::Parser;
use dockship::config::{AppConfig, Cli, Commands, InitArgs, TerminalPrompter, load_config};
use dockship::error::Result as DockshipResult;
use dockship::{deploy, logging};
use eyre::{Report, Result as EyreResult};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Application entry point.
///
/// Loads configuration with layered precedence, then dispatches to the
/// subcommand handler. Any unrecovered error is reported and the process
/// exits non-zero.
#[tokio::main]
async fn main() -> EyreResult<()> {
    let cli = Cli::parse();
    logging::init(cli.debug);

    let config = load_config(&cli).map_err(Report::from)?;

    run(&cli, &config).await.map_err(Report::from)
}

/// Execute the CLI command, returning domain-specific errors.
async fn run(cli: &Cli, config: &AppConfig) -> DockshipResult<()> {
    match &cli.command {
        Commands::Deploy(_) => run_deploy(config).await,
        Commands::Validate(_) => deploy::validate(config).map(drop),
        Commands::Init(args) => run_init(args),
    }
}

/// Reconcile the declared services, stopping between steps on Ctrl-C.
async fn run_deploy(config: &AppConfig) -> DockshipResult<()> {
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted; stopping after the current step");
            interrupt.cancel();
        }
    });

    let mut stdout = tokio::io::stdout();
    let result = deploy::deploy(config, &cancel, &mut stdout).await;
    watcher.abort();

    let report = result?;
    for outcome in &report.services {
        info!(
            service = %outcome.service,
            container = %outcome.container.id,
            replaced = outcome.replaced.is_some(),
            "deployed"
        );
    }
    Ok(())
}

fn run_init(args: &InitArgs) -> DockshipResult<()> {
    deploy::init(args, &TerminalPrompter::new()).map(drop)
}

