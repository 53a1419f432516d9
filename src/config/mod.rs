//! Configuration system for dockship.
//!
//! Two documents are involved in a deployment:
//!
//! - The application configuration ([`AppConfig`]): where to connect and how.
//!   It is loaded with layered precedence (defaults < file < `DOCKSHIP_*`
//!   environment < CLI flags) by the `ortho_config` crate.
//! - The deployment declaration ([`Deployment`]): which services to run on the
//!   remote engine. It is a TOML document, `dockship.toml` by default.
//!
//! # Example Configuration
//!
//! ```toml
//! remote = "deploy@example.com:2222"
//! key_path = "/home/user/.ssh/id_ed25519"
//!
//! [ssh]
//! connect_timeout_secs = 10
//! host_key_policy = "known_hosts"
//!
//! [proxy]
//! local_socket = "/tmp/dockship-docker.sock"
//! remote_socket = "/var/run/docker.sock"
//!
//! [deploy]
//! file = "dockship.toml"
//! stop_timeout_secs = 60
//! ```

mod cli;
mod declaration;
mod loader;
mod prompt;
mod types;

#[cfg(test)]
mod tests;

pub use cli::{Cli, Commands, DeployArgs, InitArgs, ValidateArgs};
pub use declaration::{Deployment, PortSpec, ServiceDeclaration, VolumeMode, VolumeSpec};
pub use loader::{env_var_names, load_config};
pub use prompt::{Prompter, TerminalPrompter, prompt_deployment};
pub use types::{AppConfig, DeployConfig, HostKeyPolicy, ProxyConfig, SshConfig};
