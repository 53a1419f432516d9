//! Semantic error types for the dockship application.
//!
//! This module defines the error hierarchy for dockship, following the principle of
//! using semantic error enums (via `thiserror`) for conditions the caller might
//! inspect or map to an exit status, while reserving opaque errors
//! (`eyre::Report`) for the application boundary.
//!
//! Lookup misses (a network or container that does not exist yet) are not
//! errors: the engine client returns `Ok(None)` and the reconciler branches on
//! it.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found at the expected path.
    #[error("configuration file not found: {path}")]
    FileNotFound {
        /// The path where the configuration file was expected.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("failed to parse configuration file: {message}")]
    ParseError {
        /// A description of the parse error.
        message: String,
    },

    /// A required configuration value is missing.
    #[error("missing required configuration: {field}")]
    MissingRequired {
        /// The name of the missing field.
        field: String,
    },

    /// A configuration value failed validation.
    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue {
        /// The name of the invalid field.
        field: String,
        /// The reason the value is invalid.
        reason: String,
    },

    /// Two declared services share the same name.
    #[error("duplicate service name: {name}")]
    DuplicateService {
        /// The repeated service name.
        name: String,
    },

    /// Refused to overwrite an existing declaration document.
    #[error("refusing to overwrite existing file: {path} (use --force)")]
    AlreadyExists {
        /// The path that already exists.
        path: PathBuf,
    },

    /// An interactive prompt failed or was aborted.
    #[error("interactive prompt failed: {message}")]
    PromptFailed {
        /// A description of the prompt failure.
        message: String,
    },

    /// The `OrthoConfig` library returned an error during configuration loading.
    ///
    /// This wraps errors from the layered configuration system, including:
    /// - Configuration file parsing errors
    /// - Environment variable parsing errors
    /// - CLI argument parsing errors
    /// - Missing required fields after layer merging
    #[error("configuration loading failed: {0}")]
    OrthoConfig(Arc<ortho_config::OrthoError>),
}

/// Errors raised while establishing or using the secure-shell transport.
///
/// The first group corresponds to authentication failures; the second to
/// dial failures (host or remote socket unreachable).
#[derive(Debug, Error)]
pub enum TransportError {
    /// Neither a key, a password nor an agent was available.
    #[error("no credentials supplied for {user}@{host} and no SSH agent available")]
    NoCredentials {
        /// The remote user.
        user: String,
        /// The remote host.
        host: String,
    },

    /// The private key file could not be read or decoded.
    #[error("failed to load private key from '{path}': {message}")]
    KeyLoadFailed {
        /// The path to the key file.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// The server rejected every offered credential.
    #[error("authentication rejected for {user}@{host} using {method}")]
    AuthenticationRejected {
        /// The remote user.
        user: String,
        /// The remote host.
        host: String,
        /// The authentication method that was attempted.
        method: String,
    },

    /// The SSH agent could not be reached or failed to sign.
    #[error("SSH agent authentication failed: {message}")]
    AgentFailed {
        /// A description of the agent failure.
        message: String,
    },

    /// The server's host key was not accepted by the verification policy.
    #[error("host key for {host} was rejected: {reason}")]
    HostKeyRejected {
        /// The remote host.
        host: String,
        /// Why the key was rejected.
        reason: String,
    },

    /// The TCP connection or SSH handshake failed.
    #[error("failed to connect to {address}: {message}")]
    DialFailed {
        /// The `host:port` that was dialled.
        address: String,
        /// A description of the dial failure.
        message: String,
    },

    /// The TCP connection or SSH handshake did not finish in time.
    #[error("connection to {address} timed out after {seconds} seconds")]
    DialTimeout {
        /// The `host:port` that was dialled.
        address: String,
        /// The timeout duration in seconds.
        seconds: u64,
    },

    /// A logical channel to a remote socket could not be opened.
    #[error("failed to open channel to remote socket '{path}': {message}")]
    ChannelOpenFailed {
        /// The remote socket path.
        path: String,
        /// A description of the failure.
        message: String,
    },

    /// The session was already closed.
    #[error("transport session is closed")]
    SessionClosed,
}

/// Errors raised while starting the local socket proxy.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// A stale socket file could not be removed.
    #[error("failed to remove stale socket '{path}': {message}")]
    CleanupFailed {
        /// The local socket path.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// The local listener could not be bound.
    #[error("failed to bind local socket '{path}': {message}")]
    BindFailed {
        /// The local socket path.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// The probe channel to the remote socket failed.
    #[error("remote socket is unreachable: {0}")]
    ProbeFailed(#[source] TransportError),
}

/// Errors that can occur during container engine operations.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// Failed to connect to the container engine socket.
    #[error("failed to connect to container engine: {message}")]
    ConnectionFailed {
        /// A description of the connection failure.
        message: String,
    },

    /// The container engine socket was not found.
    #[error("container engine socket not found: {path}")]
    SocketNotFound {
        /// The path where the socket was expected.
        path: PathBuf,
    },

    /// Permission denied when accessing the container engine socket.
    #[error("permission denied accessing container socket: {path}")]
    PermissionDenied {
        /// The path to the socket.
        path: PathBuf,
    },

    /// The engine did not answer the readiness probe.
    #[error("container engine is not responding")]
    EngineNotReady,

    /// The engine returned a response that is missing mandatory data.
    #[error("malformed engine response: {message}")]
    Protocol {
        /// A description of what was missing or malformed.
        message: String,
    },

    /// Listing engine resources failed.
    #[error("failed to list {resource}: {message}")]
    ListFailed {
        /// The kind of resource being listed.
        resource: String,
        /// A description of the failure.
        message: String,
    },

    /// Failed to create a network.
    #[error("failed to create network '{name}': {message}")]
    NetworkCreateFailed {
        /// The network name.
        name: String,
        /// A description of the creation failure.
        message: String,
    },

    /// Failed to create a container.
    #[error("failed to create container '{name}': {message}")]
    CreateFailed {
        /// The container name.
        name: String,
        /// A description of the creation failure.
        message: String,
    },

    /// Failed to start a container.
    #[error("failed to start container '{container_id}': {message}")]
    StartFailed {
        /// The ID of the container that failed to start.
        container_id: String,
        /// A description of the start failure.
        message: String,
    },

    /// Failed to stop a container.
    #[error("failed to stop container '{container_id}': {message}")]
    StopFailed {
        /// The ID of the container that failed to stop.
        container_id: String,
        /// A description of the stop failure.
        message: String,
    },

    /// Failed to remove a container.
    #[error("failed to remove container '{container_id}': {message}")]
    RemoveFailed {
        /// The ID of the container that could not be removed.
        container_id: String,
        /// A description of the removal failure.
        message: String,
    },

    /// Failed to retrieve container logs.
    #[error("failed to read logs of container '{container_id}': {message}")]
    LogsFailed {
        /// The ID of the container.
        container_id: String,
        /// A description of the failure.
        message: String,
    },

    /// Building an image failed.
    #[error("failed to build image '{image}': {message}")]
    BuildFailed {
        /// The image tag being built.
        image: String,
        /// A description of the build failure.
        message: String,
    },
}

/// Errors that can occur during filesystem operations.
#[derive(Debug, Error)]
pub enum FilesystemError {
    /// A file or directory was not found.
    #[error("path not found: {path}")]
    NotFound {
        /// The path that was not found.
        path: PathBuf,
    },

    /// Permission denied when accessing a path.
    #[error("permission denied: {path}")]
    PermissionDenied {
        /// The path that could not be accessed.
        path: PathBuf,
    },

    /// An I/O error occurred.
    #[error("I/O error at '{path}': {message}")]
    IoError {
        /// The path where the error occurred.
        path: PathBuf,
        /// A description of the I/O error.
        message: String,
    },
}

/// One step of the per-service reconcile state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileStep {
    /// Build the service image from its declared context.
    BuildImage,
    /// Make sure every declared network exists.
    EnsureNetworks,
    /// Look up a container carrying the service name.
    LookupExistingContainer,
    /// Stop the container found by the lookup.
    StopExisting,
    /// Remove the container found by the lookup.
    RemoveExisting,
    /// Create the replacement container.
    CreateContainer,
    /// Start the replacement container.
    StartContainer,
    /// Copy the container's buffered logs to the operator.
    RetrieveLogs,
}

impl fmt::Display for ReconcileStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::BuildImage => "build image",
            Self::EnsureNetworks => "ensure networks",
            Self::LookupExistingContainer => "look up existing container",
            Self::StopExisting => "stop existing container",
            Self::RemoveExisting => "remove existing container",
            Self::CreateContainer => "create container",
            Self::StartContainer => "start container",
            Self::RetrieveLogs => "retrieve logs",
        };
        f.write_str(label)
    }
}

/// Top-level error type for the dockship application.
///
/// This enum aggregates all domain-specific errors into a single type that can
/// be used throughout the application. At the application boundary (main.rs),
/// these errors are converted to `eyre::Report` for human-readable reporting.
#[derive(Debug, Error)]
pub enum DockshipError {
    /// An error occurred during configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An error occurred in the secure-shell transport.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An error occurred while starting the socket proxy.
    #[error(transparent)]
    Proxy(#[from] ProxyError),

    /// An error occurred during container operations.
    #[error(transparent)]
    Container(#[from] ContainerError),

    /// An error occurred during filesystem operations.
    #[error(transparent)]
    Filesystem(#[from] FilesystemError),

    /// Reconciling one service failed at a given step.
    #[error("service '{service}' failed to {step}: {source}")]
    ServiceFailed {
        /// The service being reconciled.
        service: String,
        /// The step that failed.
        step: ReconcileStep,
        /// The underlying failure.
        #[source]
        source: Box<DockshipError>,
    },

    /// The operation was cancelled before it completed.
    #[error("operation cancelled")]
    Cancelled,
}

/// A specialised `Result` type for dockship operations.
pub type Result<T> = std::result::Result<T, DockshipError>;
