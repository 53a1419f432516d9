//! Authenticated SSH sessions built on `russh`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use camino::Utf8PathBuf;
use russh::client::{self, Handle};
use russh::keys::agent::client::AgentClient;
use russh::keys::{PrivateKeyWithHashAlg, ssh_key};
use russh::Disconnect;
use tracing::{debug, info, warn};

use super::address::RemoteAddress;
use super::credentials::{AuthMethod, ConnectionCredentials};
use super::{Channel, ChannelOpener, OpenChannelFuture};
use crate::config::HostKeyPolicy;
use crate::error::TransportError;

/// Failures raised while the handshake runs.
#[derive(Debug, thiserror::Error)]
enum HandshakeError {
    #[error(transparent)]
    Ssh(#[from] russh::Error),

    #[error("{0}")]
    HostKey(String),
}

/// Client-side callbacks for one connection.
struct ClientHandler {
    host: String,
    port: u16,
    policy: HostKeyPolicy,
    known_hosts: Option<Utf8PathBuf>,
}

impl client::Handler for ClientHandler {
    type Error = HandshakeError;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        let HostKeyPolicy::KnownHosts = self.policy else {
            return Ok(true);
        };
        let Some(path) = self.known_hosts.as_ref() else {
            return Err(HandshakeError::HostKey(String::from(
                "no known_hosts file configured",
            )));
        };

        match russh::keys::check_known_hosts_path(&self.host, self.port, server_public_key, path)
        {
            Ok(true) => Ok(true),
            Ok(false) => Err(HandshakeError::HostKey(format!(
                "host is not listed in {path}"
            ))),
            Err(e) => Err(HandshakeError::HostKey(e.to_string())),
        }
    }
}

/// One-way open/closed flag shared by every user of a session.
#[derive(Debug, Default)]
pub(super) struct CloseLatch(AtomicBool);

impl CloseLatch {
    /// Mark the latch closed; returns `true` only for the call that closed it.
    pub(super) fn close(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }

    /// Fail with `TransportError::SessionClosed` once the latch is closed.
    pub(super) fn ensure_open(&self) -> Result<(), TransportError> {
        if self.0.load(Ordering::Acquire) {
            Err(TransportError::SessionClosed)
        } else {
            Ok(())
        }
    }
}

/// One authenticated connection to the remote host.
///
/// Channels opened from the session are multiplexed over the same
/// connection; [`SshSession::open_channel`] may be called concurrently.
/// Closing is idempotent.
pub struct SshSession {
    handle: Handle<ClientHandler>,
    address: RemoteAddress,
    closed: CloseLatch,
}

impl SshSession {
    /// Dial the remote host and authenticate with the selected method.
    ///
    /// Dial and handshake are bounded by the credentials' dial timeout. No
    /// retry is attempted.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::DialTimeout` or `TransportError::DialFailed`
    /// when the host cannot be reached, `TransportError::HostKeyRejected`
    /// when the host identity fails verification, and
    /// `TransportError::AuthenticationRejected` or
    /// `TransportError::AgentFailed` when authentication does not succeed.
    pub async fn authenticate(credentials: &ConnectionCredentials) -> Result<Self, TransportError> {
        let address = &credentials.address;
        if credentials.host_key_policy == HostKeyPolicy::AcceptAny {
            warn!(
                host = %address.host,
                "accepting any host key; the connection is not protected against interception"
            );
        }

        let handler = ClientHandler {
            host: address.host.clone(),
            port: address.port,
            policy: credentials.host_key_policy,
            known_hosts: credentials.known_hosts_path.clone(),
        };
        let config = Arc::new(client::Config::default());
        let dial = client::connect(config, (address.host.as_str(), address.port), handler);

        let mut handle = tokio::time::timeout(credentials.dial_timeout, dial)
            .await
            .map_err(|_| TransportError::DialTimeout {
                address: address.authority(),
                seconds: credentials.dial_timeout.as_secs(),
            })?
            .map_err(|e| match e {
                HandshakeError::HostKey(reason) => TransportError::HostKeyRejected {
                    host: address.host.clone(),
                    reason,
                },
                HandshakeError::Ssh(source) => TransportError::DialFailed {
                    address: address.authority(),
                    message: source.to_string(),
                },
            })?;
        debug!(address = %address.authority(), "handshake complete");

        let accepted = authenticate_with(&mut handle, &address.user, &credentials.auth)
            .await
            .map_err(|e| match e {
                AuthAttemptError::Agent(message) => TransportError::AgentFailed { message },
                AuthAttemptError::Ssh(source) => TransportError::DialFailed {
                    address: address.authority(),
                    message: source.to_string(),
                },
            })?;
        if !accepted {
            return Err(TransportError::AuthenticationRejected {
                user: address.user.clone(),
                host: address.host.clone(),
                method: String::from(credentials.auth.label()),
            });
        }

        info!(remote = %address, method = credentials.auth.label(), "authenticated");
        Ok(Self {
            handle,
            address: address.clone(),
            closed: CloseLatch::default(),
        })
    }

    /// The address this session is connected to.
    #[must_use]
    pub const fn address(&self) -> &RemoteAddress {
        &self.address
    }

    /// Open a duplex byte channel to a Unix socket on the remote host.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::SessionClosed` after [`SshSession::close`],
    /// and `TransportError::ChannelOpenFailed` when the remote side refuses
    /// the channel (for example because nothing listens on `remote_path`).
    pub async fn open_channel(&self, remote_path: &str) -> Result<Channel, TransportError> {
        self.closed.ensure_open()?;
        if self.handle.is_closed() {
            return Err(TransportError::SessionClosed);
        }
        let channel = self
            .handle
            .channel_open_direct_streamlocal(remote_path)
            .await
            .map_err(|e| TransportError::ChannelOpenFailed {
                path: String::from(remote_path),
                message: e.to_string(),
            })?;
        Ok(Box::new(channel.into_stream()))
    }

    /// Disconnect the session and every channel derived from it.
    ///
    /// Calling this more than once is harmless.
    pub async fn close(&self) {
        if !self.closed.close() {
            return;
        }
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
        {
            debug!(error = %e, "disconnect after the connection already ended");
        }
        debug!(remote = %self.address, "session closed");
    }
}

impl ChannelOpener for SshSession {
    fn open_channel<'a>(&'a self, remote_path: &'a str) -> OpenChannelFuture<'a> {
        Box::pin(async move { Self::open_channel(self, remote_path).await })
    }
}

enum AuthAttemptError {
    Ssh(russh::Error),
    Agent(String),
}

impl From<russh::Error> for AuthAttemptError {
    fn from(error: russh::Error) -> Self {
        Self::Ssh(error)
    }
}

/// Attempt the single selected method; `Ok(false)` means the server said no.
async fn authenticate_with(
    handle: &mut Handle<ClientHandler>,
    user: &str,
    auth: &AuthMethod,
) -> Result<bool, AuthAttemptError> {
    match auth {
        AuthMethod::PrivateKey { key, .. } => {
            let hash_alg = handle.best_supported_rsa_hash().await?.flatten();
            let result = handle
                .authenticate_publickey(user, PrivateKeyWithHashAlg::new(Arc::clone(key), hash_alg))
                .await?;
            Ok(result.success())
        }
        AuthMethod::Password(password) => {
            let result = handle.authenticate_password(user, password).await?;
            Ok(result.success())
        }
        AuthMethod::Agent { socket } => {
            let mut agent = AgentClient::connect_uds(socket.as_std_path())
                .await
                .map_err(|e| AuthAttemptError::Agent(e.to_string()))?;
            let identities = agent
                .request_identities()
                .await
                .map_err(|e| AuthAttemptError::Agent(e.to_string()))?;
            if identities.is_empty() {
                return Err(AuthAttemptError::Agent(String::from(
                    "the agent holds no identities",
                )));
            }

            for identity in identities {
                let hash_alg = handle.best_supported_rsa_hash().await?.flatten();
                let result = handle
                    .authenticate_publickey_with(user, identity, hash_alg, &mut agent)
                    .await
                    .map_err(|e| AuthAttemptError::Agent(e.to_string()))?;
                if result.success() {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}
