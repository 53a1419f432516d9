//! The `bollard` seam and the connection to the proxied engine socket.

use std::future::Future;
use std::pin::Pin;

use bollard::container::LogOutput;
use bollard::models::{
    BuildInfo, ContainerCreateBody, ContainerCreateResponse, ContainerSummary, Network,
    NetworkCreateRequest, NetworkCreateResponse, SystemVersion,
};
use bollard::query_parameters::{
    BuildImageOptions, CreateContainerOptions, ListContainersOptionsBuilder, ListNetworksOptions,
    LogsOptions, RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::{Docker, body_full};
use camino::Utf8Path;
use futures_util::Stream;

use super::error_classification::classify_connection_error;
use crate::error::{DockshipError, Result};

/// Request timeout applied by `bollard` to every engine call, in seconds.
const CONNECTION_TIMEOUT_SECS: u64 = 120;

/// Boxed future returned by [`EngineApi`] implementors.
pub type BollardFuture<'a, T> =
    Pin<Box<dyn Future<Output = std::result::Result<T, bollard::errors::Error>> + Send + 'a>>;

/// Boxed stream returned by [`EngineApi`] implementors.
pub type BollardStream<'a, T> =
    Pin<Box<dyn Stream<Item = std::result::Result<T, bollard::errors::Error>> + Send + 'a>>;

/// The raw engine calls the typed client is built from.
///
/// This abstraction keeps the engine client testable without a running
/// daemon; the production implementation is `bollard::Docker`.
pub trait EngineApi: Send + Sync {
    /// Fetch the engine version report.
    fn version(&self) -> BollardFuture<'_, SystemVersion>;

    /// List every network.
    fn list_networks(&self) -> BollardFuture<'_, Vec<Network>>;

    /// Create a network.
    fn create_network(
        &self,
        request: NetworkCreateRequest,
    ) -> BollardFuture<'_, NetworkCreateResponse>;

    /// List every container, running or not.
    fn list_containers(&self) -> BollardFuture<'_, Vec<ContainerSummary>>;

    /// Create a container.
    fn create_container(
        &self,
        options: Option<CreateContainerOptions>,
        body: ContainerCreateBody,
    ) -> BollardFuture<'_, ContainerCreateResponse>;

    /// Start a created container.
    fn start_container(&self, container_id: &str) -> BollardFuture<'_, ()>;

    /// Stop a running container.
    fn stop_container(
        &self,
        container_id: &str,
        options: Option<StopContainerOptions>,
    ) -> BollardFuture<'_, ()>;

    /// Remove a container.
    fn remove_container(
        &self,
        container_id: &str,
        options: Option<RemoveContainerOptions>,
    ) -> BollardFuture<'_, ()>;

    /// Read a container's log output.
    fn logs(&self, container_id: &str, options: Option<LogsOptions>)
    -> BollardStream<'_, LogOutput>;

    /// Build an image from a tar archive of the build context.
    fn build_image(
        &self,
        options: BuildImageOptions,
        context: Vec<u8>,
    ) -> BollardStream<'_, BuildInfo>;
}

impl EngineApi for Docker {
    fn version(&self) -> BollardFuture<'_, SystemVersion> {
        Box::pin(async move { Self::version(self).await })
    }

    fn list_networks(&self) -> BollardFuture<'_, Vec<Network>> {
        Box::pin(async move { Self::list_networks(self, None::<ListNetworksOptions>).await })
    }

    fn create_network(
        &self,
        request: NetworkCreateRequest,
    ) -> BollardFuture<'_, NetworkCreateResponse> {
        Box::pin(async move { Self::create_network(self, request).await })
    }

    fn list_containers(&self) -> BollardFuture<'_, Vec<ContainerSummary>> {
        let options = ListContainersOptionsBuilder::new().all(true).build();
        Box::pin(async move { Self::list_containers(self, Some(options)).await })
    }

    fn create_container(
        &self,
        options: Option<CreateContainerOptions>,
        body: ContainerCreateBody,
    ) -> BollardFuture<'_, ContainerCreateResponse> {
        Box::pin(async move { Self::create_container(self, options, body).await })
    }

    fn start_container(&self, container_id: &str) -> BollardFuture<'_, ()> {
        let container_id_owned = String::from(container_id);
        Box::pin(async move {
            Self::start_container(self, &container_id_owned, None::<StartContainerOptions>).await
        })
    }

    fn stop_container(
        &self,
        container_id: &str,
        options: Option<StopContainerOptions>,
    ) -> BollardFuture<'_, ()> {
        let container_id_owned = String::from(container_id);
        Box::pin(async move { Self::stop_container(self, &container_id_owned, options).await })
    }

    fn remove_container(
        &self,
        container_id: &str,
        options: Option<RemoveContainerOptions>,
    ) -> BollardFuture<'_, ()> {
        let container_id_owned = String::from(container_id);
        Box::pin(async move { Self::remove_container(self, &container_id_owned, options).await })
    }

    fn logs(
        &self,
        container_id: &str,
        options: Option<LogsOptions>,
    ) -> BollardStream<'_, LogOutput> {
        Box::pin(Self::logs(self, container_id, options))
    }

    fn build_image(
        &self,
        options: BuildImageOptions,
        context: Vec<u8>,
    ) -> BollardStream<'_, BuildInfo> {
        Box::pin(Self::build_image(
            self,
            options,
            None,
            Some(body_full(context.into())),
        ))
    }
}

/// Opens `bollard` clients on local engine sockets.
pub struct EngineConnector;

impl EngineConnector {
    /// Create a client for the engine socket at `socket_path`.
    ///
    /// The client is lazy: no request is made until the first call.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::SocketNotFound`,
    /// `ContainerError::PermissionDenied` or
    /// `ContainerError::ConnectionFailed` when the client cannot be set up.
    pub fn connect(socket_path: &Utf8Path) -> Result<Docker> {
        let socket_uri = format!("unix://{socket_path}");
        Docker::connect_with_socket(
            &socket_uri,
            CONNECTION_TIMEOUT_SECS,
            bollard::API_DEFAULT_VERSION,
        )
        .map_err(|e| DockshipError::from(classify_connection_error(&e, &socket_uri)))
    }
}
