//! Local socket proxy for the remote engine's control socket.
//!
//! The proxy binds a Unix socket on this machine and relays every accepted
//! connection, byte for byte, to a fresh channel on the remote socket. It does
//! not parse the relayed protocol.
//!
//! Start-up is fail-fast: a stale socket file is removed, the listener is
//! bound, and one probe channel is opened before any connection is accepted.
//! If the probe fails the listener is dropped and the socket file removed.
//!
//! Forwarding is structured: the accept loop owns a set of per-connection
//! supervisors and each supervisor joins its two copy directions. A
//! cancellation token reaches every task; copy directions observe it only
//! between completed read/write cycles.

mod splice;


use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use tokio::io::AsyncWriteExt;
use tokio::net::{UnixListener, UnixStream};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ProxyError;
use crate::transport::ChannelOpener;

/// The pair of sockets the proxy connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    /// Path of the local listening socket. Must not be in use by another
    /// process; a leftover file from a crashed run is removed.
    pub local_socket: Utf8PathBuf,
    /// Path of the control socket on the remote host.
    pub remote_socket: String,
}

/// Starts socket proxies.
pub struct SocketProxy;

impl SocketProxy {
    /// Bind the local socket, probe the remote socket and start forwarding.
    ///
    /// The returned handle must be shut down with [`ProxyHandle::shutdown`]
    /// to stop forwarding and remove the socket file. Cancelling `cancel`
    /// also stops the accept loop.
    ///
    /// # Errors
    ///
    /// Returns `ProxyError::CleanupFailed` when a stale socket cannot be
    /// removed, `ProxyError::BindFailed` when the listener cannot be bound,
    /// and `ProxyError::ProbeFailed` when the remote socket is unreachable.
    pub async fn start<O>(
        endpoint: ProxyEndpoint,
        opener: Arc<O>,
        cancel: &CancellationToken,
    ) -> Result<ProxyHandle, ProxyError>
    where
        O: ChannelOpener + 'static,
    {
        let ProxyEndpoint {
            local_socket,
            remote_socket,
        } = endpoint;

        remove_socket_file(&local_socket).map_err(|e| ProxyError::CleanupFailed {
            path: local_socket.as_std_path().to_path_buf(),
            message: e.to_string(),
        })?;

        let listener = UnixListener::bind(&local_socket).map_err(|e| ProxyError::BindFailed {
            path: local_socket.as_std_path().to_path_buf(),
            message: e.to_string(),
        })?;

        match opener.open_channel(&remote_socket).await {
            Ok(mut probe) => {
                if let Err(e) = probe.shutdown().await {
                    debug!(error = %e, "probe channel did not close cleanly");
                }
            }
            Err(e) => {
                drop(listener);
                if let Err(cleanup) = remove_socket_file(&local_socket) {
                    warn!(path = %local_socket, error = %cleanup, "failed to remove socket after probe failure");
                }
                return Err(ProxyError::ProbeFailed(e));
            }
        }

        let token = cancel.child_token();
        let active = Arc::new(AtomicUsize::new(0));
        let accept_loop = tokio::spawn(accept_loop(
            listener,
            opener,
            Arc::from(remote_socket.as_str()),
            token.clone(),
            Arc::clone(&active),
        ));

        info!(local = %local_socket, remote = %remote_socket, "socket proxy listening");
        Ok(ProxyHandle {
            local_socket,
            cancel: token,
            accept_loop,
            active,
        })
    }
}

/// A running proxy.
#[derive(Debug)]
pub struct ProxyHandle {
    local_socket: Utf8PathBuf,
    cancel: CancellationToken,
    accept_loop: JoinHandle<()>,
    active: Arc<AtomicUsize>,
}

impl ProxyHandle {
    /// Path of the local listening socket.
    #[must_use]
    pub fn local_socket(&self) -> &Utf8Path {
        &self.local_socket
    }

    /// Number of connections currently being forwarded.
    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Stop accepting, wait for every forwarded connection to finish its
    /// current cycle, and remove the socket file.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.accept_loop.await {
            warn!(error = %e, "proxy accept loop ended abnormally");
        }
        if let Err(e) = remove_socket_file(&self.local_socket) {
            warn!(path = %self.local_socket, error = %e, "failed to remove proxy socket");
        }
        debug!(path = %self.local_socket, "socket proxy stopped");
    }
}

/// Remove a filesystem entry at `path`; a missing entry is not an error.
fn remove_socket_file(path: &Utf8Path) -> std::io::Result<()> {
    let parent = path
        .parent()
        .filter(|dir| !dir.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let Some(file_name) = path.file_name() else {
        return Ok(());
    };

    let dir = match Dir::open_ambient_dir(parent, ambient_authority()) {
        Ok(dir) => dir,
        // A missing parent directory is reported when binding.
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    match dir.remove_file(file_name) {
        Ok(()) => {
            debug!(path = %path, "removed stale socket file");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Decrements the live connection count when a supervisor ends.
struct ConnectionGuard(Arc<AtomicUsize>);

impl ConnectionGuard {
    fn enter(active: &Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::AcqRel);
        Self(Arc::clone(active))
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

async fn accept_loop<O>(
    listener: UnixListener,
    opener: Arc<O>,
    remote_socket: Arc<str>,
    cancel: CancellationToken,
    active: Arc<AtomicUsize>,
) where
    O: ChannelOpener + 'static,
{
    let mut connections = JoinSet::new();
    let mut next_id: u64 = 0;

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    next_id = next_id.wrapping_add(1);
                    let guard = ConnectionGuard::enter(&active);
                    connections.spawn(forward_connection(
                        next_id,
                        stream,
                        Arc::clone(&opener),
                        Arc::clone(&remote_socket),
                        cancel.clone(),
                        guard,
                    ));
                }
                Err(e) => {
                    warn!(error = %e, "proxy listener failed; no longer accepting");
                    break;
                }
            },
            Some(joined) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = joined {
                    warn!(error = %e, "connection supervisor ended abnormally");
                }
            }
        }
    }

    drop(listener);
    while let Some(joined) = connections.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "connection supervisor ended abnormally");
        }
    }
}

/// Relay one accepted local connection until both directions finish.
async fn forward_connection<O>(
    id: u64,
    local: UnixStream,
    opener: Arc<O>,
    remote_socket: Arc<str>,
    cancel: CancellationToken,
    _guard: ConnectionGuard,
) where
    O: ChannelOpener + 'static,
{
    let opened = tokio::select! {
        biased;
        () = cancel.cancelled() => return,
        opened = opener.open_channel(&remote_socket) => opened,
    };
    let channel = match opened {
        Ok(channel) => channel,
        Err(e) => {
            warn!(connection = id, error = %e, "failed to open remote channel");
            return;
        }
    };
    debug!(connection = id, "forwarding connection");

    let (local_read, local_write) = local.into_split();
    let (remote_read, remote_write) = tokio::io::split(channel);

    let upstream = tokio::spawn(splice::pump(local_read, remote_write, cancel.clone()));
    let downstream = tokio::spawn(splice::pump(remote_read, local_write, cancel));
    let (sent, received) = tokio::join!(upstream, downstream);

    splice::report(id, splice::Direction::Upstream, sent);
    splice::report(id, splice::Direction::Downstream, received);
}
