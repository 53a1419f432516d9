//! Mapping of `bollard` failures onto semantic `ContainerError` variants.
//!
//! Connection set-up failures are classified by the underlying I/O error
//! kind; operation failures keep the engine's own message, which is what
//! the operator needs to see ("No such image", "port is already allocated").

use std::path::Path;

use bollard::errors::Error as BollardError;

use crate::error::ContainerError;

/// HTTP status returned when a container is already in the requested state.
const NOT_MODIFIED: u16 = 304;

/// HTTP status returned when a named resource already exists.
const CONFLICT: u16 = 409;

/// Extract the filesystem path from a `unix://` socket URI.
fn extract_socket_path(socket_uri: &str) -> Option<&Path> {
    socket_uri.strip_prefix("unix://").map(Path::new)
}

fn classify_io_error_kind(
    kind: std::io::ErrorKind,
    socket_path: Option<&Path>,
    error_msg: &str,
) -> ContainerError {
    let connection_failed = || ContainerError::ConnectionFailed {
        message: String::from(error_msg),
    };
    match kind {
        std::io::ErrorKind::PermissionDenied => {
            socket_path.map_or_else(connection_failed, |path| ContainerError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        std::io::ErrorKind::NotFound | std::io::ErrorKind::ConnectionRefused => socket_path
            .map_or_else(connection_failed, |path| ContainerError::SocketNotFound {
                path: path.to_path_buf(),
            }),
        _ => connection_failed(),
    }
}

/// Classify a client set-up error for the socket at `socket_uri`.
pub(super) fn classify_connection_error(
    bollard_error: &BollardError,
    socket_uri: &str,
) -> ContainerError {
    let socket_path = extract_socket_path(socket_uri);
    let error_msg = bollard_error.to_string();

    match bollard_error {
        BollardError::SocketNotFoundError(_) => {
            if let Some(path) = socket_path {
                return ContainerError::SocketNotFound {
                    path: path.to_path_buf(),
                };
            }
        }
        BollardError::IOError { err } => {
            let kind = io_error_kind_in_chain(err).unwrap_or_else(|| err.kind());
            return classify_io_error_kind(kind, socket_path, &error_msg);
        }
        _ => {}
    }

    io_error_kind_in_chain(bollard_error).map_or_else(
        || ContainerError::ConnectionFailed {
            message: error_msg.clone(),
        },
        |kind| classify_io_error_kind(kind, socket_path, &error_msg),
    )
}

/// The operator-facing message for an engine failure.
///
/// Server errors carry the engine's explanation; everything else falls back
/// to the client's description.
pub(super) fn engine_message(error: &BollardError) -> String {
    match error {
        BollardError::DockerResponseServerError { message, .. } => message.clone(),
        BollardError::DockerStreamError { error } => error.clone(),
        other => other.to_string(),
    }
}

/// Whether the engine reported that the resource already exists.
pub(super) const fn is_conflict(error: &BollardError) -> bool {
    matches!(
        error,
        BollardError::DockerResponseServerError {
            status_code: CONFLICT,
            ..
        }
    )
}

/// Whether the engine reported that nothing needed to change.
pub(super) const fn is_not_modified(error: &BollardError) -> bool {
    matches!(
        error,
        BollardError::DockerResponseServerError {
            status_code: NOT_MODIFIED,
            ..
        }
    )
}

/// Walk the error source chain looking for an `io::Error` kind.
fn io_error_kind_in_chain(error: &dyn std::error::Error) -> Option<std::io::ErrorKind> {
    let mut current: Option<&(dyn std::error::Error + 'static)> = error.source();
    while let Some(err) = current {
        if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
            return Some(io_err.kind());
        }
        current = err.source();
    }
    None
}
