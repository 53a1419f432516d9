//! An in-memory engine daemon answering the raw engine calls.
//!
//! The daemon keeps just enough state (networks, containers, a call log) to
//! let scenarios observe what the typed client and reconciler asked for.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bollard::container::LogOutput;
use bollard::errors::Error as BollardError;
use bollard::models::{
    BuildInfo, ContainerCreateBody, ContainerCreateResponse, ContainerSummary, Network,
    NetworkCreateRequest, NetworkCreateResponse, SystemVersion,
};
use bollard::query_parameters::{
    BuildImageOptions, CreateContainerOptions, LogsOptions, RemoveContainerOptions,
    StopContainerOptions,
};
use dockship::engine::{BollardFuture, BollardStream, EngineApi};
use futures_util::stream;

/// A container held by the daemon.
#[derive(Debug, Clone)]
pub(crate) struct StoredContainer {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) body: ContainerCreateBody,
    pub(crate) running: bool,
}

#[derive(Debug, Default)]
struct DaemonState {
    networks: Vec<Network>,
    containers: Vec<StoredContainer>,
    rejected_images: Vec<String>,
    calls: Vec<String>,
    next_id: u32,
}

impl DaemonState {
    fn allocate_id(&mut self, prefix: &str) -> String {
        self.next_id = self.next_id.saturating_add(1);
        format!("{prefix}-{}", self.next_id)
    }

    fn position(&self, container_id: &str) -> Option<usize> {
        self.containers
            .iter()
            .position(|container| container.id == container_id)
    }
}

/// Shared handle to one in-memory daemon.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeDaemon {
    state: Arc<Mutex<DaemonState>>,
}

fn server_error(status_code: u16, message: String) -> BollardError {
    BollardError::DockerResponseServerError {
        status_code,
        message,
    }
}

fn no_such_container(container_id: &str) -> BollardError {
    server_error(404, format!("No such container: {container_id}"))
}

impl FakeDaemon {
    fn state(&self) -> MutexGuard<'_, DaemonState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a running container created outside the scenario.
    pub(crate) fn seed_container(&self, name: &str, id: &str) {
        self.state().containers.push(StoredContainer {
            id: String::from(id),
            name: String::from(name),
            body: ContainerCreateBody::default(),
            running: true,
        });
    }

    /// Make container creation fail for `image`.
    pub(crate) fn reject_image(&self, image: &str) {
        self.state().rejected_images.push(String::from(image));
    }

    /// Every container currently called `name`.
    pub(crate) fn containers_named(&self, name: &str) -> Vec<StoredContainer> {
        self.state()
            .containers
            .iter()
            .filter(|container| container.name == name)
            .cloned()
            .collect()
    }

    /// The calls received so far, in order.
    pub(crate) fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }
}

impl EngineApi for FakeDaemon {
    fn version(&self) -> BollardFuture<'_, SystemVersion> {
        let report = SystemVersion {
            version: Some(String::from("27.3.1")),
            ..SystemVersion::default()
        };
        Box::pin(async move { Ok(report) })
    }

    fn list_networks(&self) -> BollardFuture<'_, Vec<Network>> {
        let networks = self.state().networks.clone();
        Box::pin(async move { Ok(networks) })
    }

    fn create_network(
        &self,
        request: NetworkCreateRequest,
    ) -> BollardFuture<'_, NetworkCreateResponse> {
        let mut state = self.state();
        state.calls.push(format!("create_network {}", request.name));
        let exists = state
            .networks
            .iter()
            .any(|network| network.name.as_deref() == Some(request.name.as_str()));
        let result = if exists {
            Err(server_error(
                409,
                format!("network with name {} already exists", request.name),
            ))
        } else {
            let id = state.allocate_id("net");
            state.networks.push(Network {
                id: Some(id.clone()),
                name: Some(request.name),
                driver: request.driver,
                ..Network::default()
            });
            Ok(NetworkCreateResponse {
                id,
                warning: String::new(),
            })
        };
        drop(state);
        Box::pin(async move { result })
    }

    fn list_containers(&self) -> BollardFuture<'_, Vec<ContainerSummary>> {
        let summaries: Vec<ContainerSummary> = self
            .state()
            .containers
            .iter()
            .map(|container| ContainerSummary {
                id: Some(container.id.clone()),
                names: Some(vec![format!("/{}", container.name)]),
                image: container.body.image.clone(),
                ..ContainerSummary::default()
            })
            .collect();
        Box::pin(async move { Ok(summaries) })
    }

    fn create_container(
        &self,
        options: Option<CreateContainerOptions>,
        body: ContainerCreateBody,
    ) -> BollardFuture<'_, ContainerCreateResponse> {
        let mut state = self.state();
        let name = options.and_then(|opts| opts.name).unwrap_or_default();
        state.calls.push(format!("create_container {name}"));
        let image = body.image.clone().unwrap_or_default();

        let result = if state.rejected_images.contains(&image) {
            Err(server_error(404, format!("No such image: {image}")))
        } else if state.containers.iter().any(|c| c.name == name) {
            Err(server_error(
                409,
                format!("Conflict. The container name \"/{name}\" is already in use"),
            ))
        } else {
            let id = state.allocate_id(&name);
            state.containers.push(StoredContainer {
                id: id.clone(),
                name,
                body,
                running: false,
            });
            Ok(ContainerCreateResponse {
                id,
                warnings: vec![],
            })
        };
        drop(state);
        Box::pin(async move { result })
    }

    fn start_container(&self, container_id: &str) -> BollardFuture<'_, ()> {
        let mut state = self.state();
        state.calls.push(format!("start_container {container_id}"));
        let result = match state
            .containers
            .iter_mut()
            .find(|container| container.id == container_id)
        {
            Some(container) if container.running => {
                Err(server_error(304, String::from("container already started")))
            }
            Some(container) => {
                container.running = true;
                Ok(())
            }
            None => Err(no_such_container(container_id)),
        };
        drop(state);
        Box::pin(async move { result })
    }

    fn stop_container(
        &self,
        container_id: &str,
        options: Option<StopContainerOptions>,
    ) -> BollardFuture<'_, ()> {
        let mut state = self.state();
        let grace = options
            .and_then(|opts| opts.t)
            .map_or_else(|| String::from("default"), |seconds| seconds.to_string());
        state
            .calls
            .push(format!("stop_container {container_id} t={grace}"));
        let result = match state
            .containers
            .iter_mut()
            .find(|container| container.id == container_id)
        {
            Some(container) if container.running => {
                container.running = false;
                Ok(())
            }
            Some(_) => Err(server_error(304, String::from("container already stopped"))),
            None => Err(no_such_container(container_id)),
        };
        drop(state);
        Box::pin(async move { result })
    }

    fn remove_container(
        &self,
        container_id: &str,
        _options: Option<RemoveContainerOptions>,
    ) -> BollardFuture<'_, ()> {
        let mut state = self.state();
        state.calls.push(format!("remove_container {container_id}"));
        let result = match state.position(container_id) {
            Some(index) => {
                state.containers.remove(index);
                Ok(())
            }
            None => Err(no_such_container(container_id)),
        };
        drop(state);
        Box::pin(async move { result })
    }

    fn logs(
        &self,
        container_id: &str,
        _options: Option<LogsOptions>,
    ) -> BollardStream<'_, LogOutput> {
        let state = self.state();
        let chunk = state
            .containers
            .iter()
            .find(|container| container.id == container_id)
            .map_or_else(
                || Err(no_such_container(container_id)),
                |container| {
                    Ok(LogOutput::StdOut {
                        message: format!("hello from {}\n", container.name).into_bytes().into(),
                    })
                },
            );
        drop(state);
        Box::pin(stream::iter(vec![chunk]))
    }

    fn build_image(
        &self,
        options: BuildImageOptions,
        _context: Vec<u8>,
    ) -> BollardStream<'_, BuildInfo> {
        let tag = options.t.unwrap_or_default();
        self.state().calls.push(format!("build_image {tag}"));
        let progress = BuildInfo {
            stream: Some(format!("Successfully tagged {tag}\n")),
            ..BuildInfo::default()
        };
        Box::pin(stream::iter(vec![Ok(progress)]))
    }
}
