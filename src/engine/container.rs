//! Container lookup, creation and lifecycle calls.

use std::collections::HashMap;
use std::time::Duration;

use bollard::models::{
    ContainerCreateBody, ContainerSummary, EndpointSettings, HostConfig, NetworkingConfig,
    PortBinding,
};
use bollard::query_parameters::{
    CreateContainerOptionsBuilder, RemoveContainerOptionsBuilder, StopContainerOptionsBuilder,
};
use tracing::{debug, info};

use super::error_classification::{engine_message, is_not_modified};
use super::{ContainerHandle, EngineApi, EngineClient};
use crate::config::{PortSpec, ServiceDeclaration};
use crate::error::{ContainerError, Result};

/// Host address every declared port is published on.
const PUBLISH_ALL_INTERFACES: &str = "0.0.0.0";

impl<C: EngineApi> EngineClient<C> {
    /// Find the container called exactly `name`, running or not.
    ///
    /// Engine container names carry a leading `/`; it is ignored when
    /// comparing.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::ListFailed` when the engine cannot list
    /// containers and `ContainerError::Protocol` when the match has no ID.
    pub async fn find_container(&self, name: &str) -> Result<Option<ContainerHandle>> {
        let containers =
            self.api
                .list_containers()
                .await
                .map_err(|e| ContainerError::ListFailed {
                    resource: String::from("containers"),
                    message: engine_message(&e),
                })?;

        containers
            .into_iter()
            .find(|summary| has_name(summary, name))
            .map(|summary| {
                let id = summary.id.ok_or_else(|| ContainerError::Protocol {
                    message: format!("container '{name}' was listed without an ID"),
                })?;
                Ok(ContainerHandle {
                    id,
                    name: String::from(name),
                })
            })
            .transpose()
    }

    /// Create the container for `service` without starting it.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::CreateFailed` when the engine rejects the
    /// request, for example an unknown image or a name still in use.
    pub async fn create_container(&self, service: &ServiceDeclaration) -> Result<ContainerHandle> {
        let options = CreateContainerOptionsBuilder::new()
            .name(&service.name)
            .build();
        let response = self
            .api
            .create_container(Some(options), container_create_body(service))
            .await
            .map_err(|e| ContainerError::CreateFailed {
                name: service.name.clone(),
                message: engine_message(&e),
            })?;

        for warning in &response.warnings {
            tracing::warn!(service = %service.name, warning = %warning, "engine warning");
        }
        info!(service = %service.name, id = %response.id, "created container");
        Ok(ContainerHandle {
            id: response.id,
            name: service.name.clone(),
        })
    }

    /// Start a created container.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::StartFailed` when the engine rejects the
    /// request. A container that is already running is not an error.
    pub async fn start_container(&self, container: &ContainerHandle) -> Result<()> {
        match self.api.start_container(&container.id).await {
            Ok(()) => {}
            Err(e) if is_not_modified(&e) => {
                debug!(container = %container.name, "container already running");
            }
            Err(e) => {
                return Err(ContainerError::StartFailed {
                    container_id: container.id.clone(),
                    message: engine_message(&e),
                }
                .into());
            }
        }
        info!(container = %container.name, "started container");
        Ok(())
    }

    /// Stop a container, giving it `grace` to exit before it is killed.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::StopFailed` when the engine rejects the
    /// request. A container that is already stopped is not an error.
    pub async fn stop_container(&self, container: &ContainerHandle, grace: Duration) -> Result<()> {
        let seconds = i32::try_from(grace.as_secs()).unwrap_or(i32::MAX);
        let options = StopContainerOptionsBuilder::new().t(seconds).build();
        match self.api.stop_container(&container.id, Some(options)).await {
            Ok(()) => {
                info!(container = %container.name, "stopped container");
                Ok(())
            }
            Err(e) if is_not_modified(&e) => {
                debug!(container = %container.name, "container already stopped");
                Ok(())
            }
            Err(e) => Err(ContainerError::StopFailed {
                container_id: container.id.clone(),
                message: engine_message(&e),
            }
            .into()),
        }
    }

    /// Remove a container, forcing removal if it is still running.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::RemoveFailed` when the engine rejects the
    /// request.
    pub async fn remove_container(&self, container: &ContainerHandle) -> Result<()> {
        let options = RemoveContainerOptionsBuilder::new().force(true).build();
        self.api
            .remove_container(&container.id, Some(options))
            .await
            .map_err(|e| ContainerError::RemoveFailed {
                container_id: container.id.clone(),
                message: engine_message(&e),
            })?;
        info!(container = %container.name, "removed container");
        Ok(())
    }
}

fn has_name(summary: &ContainerSummary, name: &str) -> bool {
    summary.names.as_ref().is_some_and(|names| {
        names
            .iter()
            .any(|candidate| candidate.trim_start_matches('/') == name)
    })
}

/// Translate a service declaration into the engine's create request.
///
/// Every declared container port is exposed and published on the same host
/// port on all interfaces; volumes become bind mounts; networks become
/// endpoint attachments.
pub(super) fn container_create_body(service: &ServiceDeclaration) -> ContainerCreateBody {
    let exposed_ports: Vec<String> = service.ports.iter().map(PortSpec::engine_key).collect();

    let port_bindings: HashMap<String, Option<Vec<PortBinding>>> = service
        .ports
        .iter()
        .map(|port| {
            let binding = PortBinding {
                host_ip: Some(String::from(PUBLISH_ALL_INTERFACES)),
                host_port: Some(port.container_port.to_string()),
            };
            (port.engine_key(), Some(vec![binding]))
        })
        .collect();

    let binds: Vec<String> = service.volumes.iter().map(|volume| volume.bind()).collect();

    let endpoints: HashMap<String, EndpointSettings> = service
        .networks
        .iter()
        .map(|network| (network.clone(), EndpointSettings::default()))
        .collect();

    let host_config = HostConfig {
        port_bindings: (!port_bindings.is_empty()).then_some(port_bindings),
        binds: (!binds.is_empty()).then_some(binds),
        ..HostConfig::default()
    };

    ContainerCreateBody {
        image: Some(service.image.clone()),
        hostname: Some(service.name.clone()),
        env: (!service.environment.is_empty()).then(|| service.environment.clone()),
        exposed_ports: (!exposed_ports.is_empty()).then_some(exposed_ports),
        host_config: Some(host_config),
        networking_config: (!endpoints.is_empty()).then_some(NetworkingConfig {
            endpoints_config: Some(endpoints),
        }),
        ..ContainerCreateBody::default()
    }
}
