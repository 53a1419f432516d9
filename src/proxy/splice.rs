//! One direction of a forwarded connection.

use std::fmt;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const BUFFER_SIZE: usize = 16 * 1024;

/// Which way bytes flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Direction {
    /// Local client to remote socket.
    Upstream,
    /// Remote socket to local client.
    Downstream,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Upstream => "local->remote",
            Self::Downstream => "remote->local",
        })
    }
}

/// Copy bytes from `reader` to `writer` until end-of-stream, an error, or
/// cancellation.
///
/// Cancellation is only observed while waiting for input; a chunk that has
/// been read is always written in full. On a clean finish the writer is shut
/// down so the peer sees end-of-stream while the opposite direction keeps
/// running.
pub(super) async fn pump<R, W>(
    mut reader: R,
    mut writer: W,
    cancel: CancellationToken,
) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buffer = vec![0_u8; BUFFER_SIZE];
    let mut total: usize = 0;

    loop {
        let read = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = reader.read(&mut buffer) => result?,
        };
        let Some(chunk) = buffer.get(..read).filter(|bytes| !bytes.is_empty()) else {
            break;
        };
        writer.write_all(chunk).await?;
        writer.flush().await?;
        total = total.saturating_add(read);
    }

    writer.shutdown().await?;
    Ok(total)
}

/// Log how a direction ended. Failures stay local to the connection.
pub(super) fn report(
    connection: u64,
    direction: Direction,
    outcome: Result<std::io::Result<usize>, JoinError>,
) {
    match outcome {
        Ok(Ok(bytes)) => debug!(connection, %direction, bytes, "direction finished"),
        Ok(Err(e)) => warn!(connection, %direction, error = %e, "forwarding failed"),
        Err(e) => warn!(connection, %direction, error = %e, "forwarding task ended abnormally"),
    }
}
