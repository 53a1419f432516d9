//! Configuration data types for dockship.

use std::time::Duration;

use camino::Utf8PathBuf;
use clap::ValueEnum;
use ortho_config::{OrthoConfig, OrthoResult, PostMergeContext, PostMergeHook};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_STOP_TIMEOUT_SECS: u64 = 60;
const DEFAULT_LOCAL_SOCKET: &str = "/tmp/dockship-docker.sock";
const DEFAULT_REMOTE_SOCKET: &str = "/var/run/docker.sock";
const DEFAULT_DEPLOYMENT_FILE: &str = "dockship.toml";

/// How the remote host's identity is verified during the SSH handshake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostKeyPolicy {
    /// Accept any host key.
    ///
    /// Convenient for first contact with fresh hosts, but it offers no
    /// protection against an active man-in-the-middle.
    #[default]
    AcceptAny,

    /// Only accept host keys listed in an OpenSSH `known_hosts` file.
    KnownHosts,
}

/// Secure-shell connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SshConfig {
    /// Upper bound for dial plus handshake, in seconds.
    pub connect_timeout_secs: u64,

    /// Host identity verification policy.
    pub host_key_policy: HostKeyPolicy,

    /// Known-hosts file consulted by [`HostKeyPolicy::KnownHosts`].
    ///
    /// Defaults to `~/.ssh/known_hosts` when unset.
    pub known_hosts_path: Option<Utf8PathBuf>,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            host_key_policy: HostKeyPolicy::AcceptAny,
            known_hosts_path: None,
        }
    }
}

impl SshConfig {
    /// Return the connect timeout as a `Duration`.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Socket proxy settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Local filesystem path where the remote engine socket is exposed.
    pub local_socket: Utf8PathBuf,

    /// Engine control socket path on the remote host.
    pub remote_socket: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            local_socket: Utf8PathBuf::from(DEFAULT_LOCAL_SOCKET),
            remote_socket: String::from(DEFAULT_REMOTE_SOCKET),
        }
    }
}

/// Reconciliation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Path to the deployment declaration.
    pub file: Utf8PathBuf,

    /// Grace period granted to a container before it is killed, in seconds.
    pub stop_timeout_secs: u64,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            file: Utf8PathBuf::from(DEFAULT_DEPLOYMENT_FILE),
            stop_timeout_secs: DEFAULT_STOP_TIMEOUT_SECS,
        }
    }
}

/// Root application configuration.
///
/// This structure is loaded from configuration files, environment variables,
/// and command-line arguments with layered precedence. The precedence order
/// (lowest to highest) is: defaults, configuration file, environment variables,
/// command-line arguments.
///
/// Configuration files are discovered in this order:
/// 1. Path specified via `DOCKSHIP_CONFIG_PATH` environment variable
/// 2. `.dockship.toml` in the current working directory
/// 3. `.dockship.toml` in the home directory
/// 4. `~/.config/dockship/config.toml` (XDG default)
#[derive(Debug, Clone, Default, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(
    prefix = "DOCKSHIP",
    post_merge_hook,
    discovery(
        app_name = "dockship",
        env_var = "DOCKSHIP_CONFIG_PATH",
        config_file_name = "config.toml",
        dotfile_name = ".dockship.toml",
        config_cli_long = "config",
        config_cli_visible = true,
    )
)]
pub struct AppConfig {
    /// Remote address in `user@host[:port]` form.
    pub remote: Option<String>,

    /// Path to the private key used for authentication.
    pub key_path: Option<Utf8PathBuf>,

    /// Password used for authentication.
    pub password: Option<String>,

    /// Secure-shell connection settings.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub ssh: SshConfig,

    /// Socket proxy settings.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub proxy: ProxyConfig,

    /// Reconciliation settings.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub deploy: DeployConfig,
}

impl AppConfig {
    /// Return the configured remote address.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` when no remote address was
    /// supplied by any layer.
    pub fn require_remote(&self) -> Result<&str> {
        self.remote.as_deref().ok_or_else(|| {
            ConfigError::MissingRequired {
                field: String::from("remote"),
            }
            .into()
        })
    }

    /// Return the stop grace period as a `Duration`.
    #[must_use]
    pub const fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.deploy.stop_timeout_secs)
    }
}

impl PostMergeHook for AppConfig {
    fn post_merge(&mut self, _ctx: &PostMergeContext) -> OrthoResult<()> {
        // Empty strings from env or CLI mean "not supplied".
        self.remote = self.remote.take().filter(|value| !value.trim().is_empty());
        self.password = self.password.take().filter(|value| !value.is_empty());
        self.key_path = self.key_path.take().filter(|path| !path.as_str().is_empty());
        Ok(())
    }
}
