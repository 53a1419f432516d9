//! Credential selection for the SSH transport.
//!
//! Exactly one authentication method is attempted per session. The method is
//! chosen from what the operator supplied, in order of precedence:
//!
//! 1. a private key file,
//! 2. a password,
//! 3. the SSH agent advertised by `SSH_AUTH_SOCK`.
//!
//! When both a key and a password are given the key wins and the password is
//! ignored with a warning.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use russh::keys::PrivateKey;
use tracing::{debug, warn};

use super::address::RemoteAddress;
use crate::config::{AppConfig, HostKeyPolicy};
use crate::error::{ConfigError, DockshipError, TransportError};

/// Environment variable naming the SSH agent socket.
pub const AGENT_SOCKET_VAR: &str = "SSH_AUTH_SOCK";

/// The authentication method chosen for a session.
#[derive(Clone)]
pub enum AuthMethod {
    /// Public-key authentication with a decoded private key.
    PrivateKey {
        /// Where the key was read from.
        path: Utf8PathBuf,
        /// The decoded key.
        key: Arc<PrivateKey>,
    },

    /// Password authentication.
    Password(String),

    /// Authentication through a running SSH agent.
    Agent {
        /// The agent's Unix socket.
        socket: Utf8PathBuf,
    },
}

impl AuthMethod {
    /// Pick the authentication method from the supplied material.
    ///
    /// Key material is read and decoded here, before any network traffic, so
    /// a malformed key is reported without dialling.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::KeyLoadFailed` when the key file cannot be
    /// read or decoded, and `TransportError::NoCredentials` when nothing was
    /// supplied and no agent is advertised.
    pub fn select<E: mockable::Env>(
        address: &RemoteAddress,
        key_path: Option<&Utf8Path>,
        password: Option<&str>,
        env: &E,
    ) -> Result<Self, TransportError> {
        if let Some(path) = key_path {
            if password.is_some() {
                warn!(
                    key = %path,
                    "both a private key and a password were supplied; using the key"
                );
            }
            let key = load_private_key(path)?;
            return Ok(Self::PrivateKey {
                path: path.to_owned(),
                key: Arc::new(key),
            });
        }

        if let Some(secret) = password {
            return Ok(Self::Password(String::from(secret)));
        }

        env.string(AGENT_SOCKET_VAR)
            .filter(|socket| !socket.is_empty())
            .map(|socket| {
                debug!(agent = %socket, "no key or password supplied; using SSH agent");
                Self::Agent {
                    socket: Utf8PathBuf::from(socket),
                }
            })
            .ok_or_else(|| TransportError::NoCredentials {
                user: address.user.clone(),
                host: address.host.clone(),
            })
    }

    /// Short label used in logs and errors.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::PrivateKey { .. } => "private key",
            Self::Password(_) => "password",
            Self::Agent { .. } => "agent",
        }
    }
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PrivateKey { path, .. } => f
                .debug_struct("PrivateKey")
                .field("path", path)
                .finish_non_exhaustive(),
            Self::Password(_) => f.write_str("Password(<redacted>)"),
            Self::Agent { socket } => f.debug_struct("Agent").field("socket", socket).finish(),
        }
    }
}

/// Read and decode an unencrypted private key file.
///
/// # Errors
///
/// Returns `TransportError::KeyLoadFailed` when the file cannot be read or
/// does not contain a supported private key.
pub fn load_private_key(path: &Utf8Path) -> Result<PrivateKey, TransportError> {
    let key_error = |message: String| TransportError::KeyLoadFailed {
        path: path.as_std_path().to_path_buf(),
        message,
    };

    let parent = path
        .parent()
        .filter(|dir| !dir.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| key_error(String::from("path does not name a file")))?;

    let dir = Dir::open_ambient_dir(parent, ambient_authority())
        .map_err(|e| key_error(e.to_string()))?;
    let contents = dir
        .read_to_string(file_name)
        .map_err(|e| key_error(e.to_string()))?;

    russh::keys::decode_secret_key(&contents, None).map_err(|e| key_error(e.to_string()))
}

/// Everything needed to open one authenticated session.
#[derive(Debug, Clone)]
pub struct ConnectionCredentials {
    /// Remote endpoint.
    pub address: RemoteAddress,
    /// The single authentication method to attempt.
    pub auth: AuthMethod,
    /// Upper bound for dial plus handshake.
    pub dial_timeout: Duration,
    /// Host identity verification policy.
    pub host_key_policy: HostKeyPolicy,
    /// Known-hosts file consulted under [`HostKeyPolicy::KnownHosts`].
    pub known_hosts_path: Option<Utf8PathBuf>,
}

impl ConnectionCredentials {
    /// Build credentials from the merged application configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` when no remote is configured or
    /// when known-hosts verification is requested without a usable path,
    /// `ConfigError::InvalidValue` for a malformed remote address or a zero
    /// dial timeout, and the
    /// errors of [`AuthMethod::select`].
    pub fn from_config<E: mockable::Env>(
        config: &AppConfig,
        env: &E,
    ) -> Result<Self, DockshipError> {
        let address: RemoteAddress = config.require_remote()?.parse()?;
        if config.ssh.connect_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: String::from("ssh.connect_timeout_secs"),
                reason: String::from("the dial timeout must be at least one second"),
            }
            .into());
        }
        let auth = AuthMethod::select(
            &address,
            config.key_path.as_deref(),
            config.password.as_deref(),
            env,
        )?;

        let known_hosts_path = match config.ssh.host_key_policy {
            HostKeyPolicy::AcceptAny => None,
            HostKeyPolicy::KnownHosts => Some(resolve_known_hosts(config, env)?),
        };

        Ok(Self {
            address,
            auth,
            dial_timeout: config.ssh.connect_timeout(),
            host_key_policy: config.ssh.host_key_policy,
            known_hosts_path,
        })
    }
}

fn resolve_known_hosts<E: mockable::Env>(
    config: &AppConfig,
    env: &E,
) -> Result<Utf8PathBuf, ConfigError> {
    if let Some(path) = config.ssh.known_hosts_path.clone() {
        return Ok(path);
    }
    env.string("HOME")
        .filter(|home| !home.is_empty())
        .map(|home| Utf8PathBuf::from(home).join(".ssh").join("known_hosts"))
        .ok_or_else(|| ConfigError::MissingRequired {
            field: String::from("ssh.known_hosts_path"),
        })
}
