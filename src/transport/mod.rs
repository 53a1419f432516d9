//! Secure-shell transport to the remote host.
//!
//! The transport authenticates once per invocation and then hands out logical
//! duplex channels to Unix sockets on the remote host. The socket proxy
//! consumes it through the [`ChannelOpener`] seam, so tests can substitute a
//! local opener without an SSH server.

mod address;
mod credentials;
mod session;


use std::future::Future;
use std::pin::Pin;

use tokio::io::{AsyncRead, AsyncWrite};

pub use address::{DEFAULT_SSH_PORT, RemoteAddress};
pub use credentials::{AGENT_SOCKET_VAR, AuthMethod, ConnectionCredentials, load_private_key};
pub use session::SshSession;

use crate::error::TransportError;

/// A byte stream that can be read and written concurrently from one task.
pub trait DuplexStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> DuplexStream for T {}

/// One logical channel to a remote socket.
pub type Channel = Box<dyn DuplexStream>;

/// Future returned by [`ChannelOpener::open_channel`].
pub type OpenChannelFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Channel, TransportError>> + Send + 'a>>;

/// Opens logical channels to sockets on the remote host.
///
/// Implementations must allow concurrent calls through a shared reference.
pub trait ChannelOpener: Send + Sync {
    /// Open a fresh duplex channel to `remote_path`.
    fn open_channel<'a>(&'a self, remote_path: &'a str) -> OpenChannelFuture<'a>;
}
