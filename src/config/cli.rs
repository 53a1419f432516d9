//! Command-line argument definitions for dockship.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

/// Command-line interface for dockship.
#[derive(Debug, Parser)]
#[command(name = "dockship")]
#[command(
    author,
    version,
    about = "Deploy containerised services to a remote Docker host over SSH"
)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the application configuration file.
    #[arg(long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Enable debug logging.
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Interactively write a deployment declaration.
    Init(InitArgs),

    /// Connect to the remote host and reconcile the declared services.
    Deploy(DeployArgs),

    /// Load and validate a deployment declaration without connecting.
    Validate(ValidateArgs),
}

/// Arguments for the `init` subcommand.
#[derive(Debug, Parser)]
pub struct InitArgs {
    /// Where to write the declaration.
    #[arg(long, short, default_value = "dockship.toml")]
    pub output: Utf8PathBuf,

    /// Overwrite an existing file.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `deploy` subcommand.
#[derive(Debug, Parser)]
pub struct DeployArgs {
    /// Path to the deployment declaration.
    #[arg(long, short)]
    pub file: Option<Utf8PathBuf>,

    /// Remote address in `user@host[:port]` form.
    #[arg(long)]
    pub remote: Option<String>,

    /// Path to the private key used for authentication.
    #[arg(long)]
    pub key: Option<Utf8PathBuf>,

    /// Password used for authentication.
    #[arg(long)]
    pub password: Option<String>,

    /// Local path where the remote engine socket is exposed.
    #[arg(long)]
    pub local_socket: Option<Utf8PathBuf>,

    /// Path of the engine socket on the remote host.
    #[arg(long)]
    pub remote_socket: Option<String>,
}

/// Arguments for the `validate` subcommand.
#[derive(Debug, Parser)]
pub struct ValidateArgs {
    /// Path to the deployment declaration.
    #[arg(long, short)]
    pub file: Option<Utf8PathBuf>,
}
