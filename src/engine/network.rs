//! Network lookup and creation.

use bollard::models::{Network, NetworkCreateRequest};
use tracing::{debug, info};

use super::error_classification::{engine_message, is_conflict};
use super::{EngineApi, EngineClient, NetworkHandle};
use crate::error::{ContainerError, Result};

const BRIDGE_DRIVER: &str = "bridge";

impl<C: EngineApi> EngineClient<C> {
    /// Find the network called exactly `name`.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::ListFailed` when the engine cannot list
    /// networks and `ContainerError::Protocol` when the match has no ID.
    pub async fn find_network(&self, name: &str) -> Result<Option<NetworkHandle>> {
        let networks = self
            .api
            .list_networks()
            .await
            .map_err(|e| ContainerError::ListFailed {
                resource: String::from("networks"),
                message: engine_message(&e),
            })?;

        networks
            .into_iter()
            .find(|network| network.name.as_deref() == Some(name))
            .map(|network| network_handle(name, network))
            .transpose()
    }

    /// Return the network called `name`, creating a bridge network if none
    /// exists.
    ///
    /// When another client creates the same network between the lookup and
    /// the create call, the engine's conflict answer is resolved by looking
    /// the network up again.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::NetworkCreateFailed` when the engine rejects
    /// the creation, plus the errors of [`Self::find_network`].
    pub async fn ensure_network(&self, name: &str) -> Result<NetworkHandle> {
        if let Some(existing) = self.find_network(name).await? {
            debug!(network = name, id = %existing.id, "network already exists");
            return Ok(existing);
        }

        let request = NetworkCreateRequest {
            name: String::from(name),
            driver: Some(String::from(BRIDGE_DRIVER)),
            ..NetworkCreateRequest::default()
        };
        match self.api.create_network(request).await {
            Ok(response) => {
                info!(network = name, id = %response.id, "created network");
                Ok(NetworkHandle {
                    id: response.id,
                    name: String::from(name),
                })
            }
            Err(e) if is_conflict(&e) => {
                self.find_network(name)
                    .await?
                    .ok_or_else(|| network_create_failed(name, &e).into())
            }
            Err(e) => Err(network_create_failed(name, &e).into()),
        }
    }
}

fn network_create_failed(name: &str, error: &bollard::errors::Error) -> ContainerError {
    ContainerError::NetworkCreateFailed {
        name: String::from(name),
        message: engine_message(error),
    }
}

fn network_handle(name: &str, network: Network) -> Result<NetworkHandle> {
    let id = network.id.ok_or_else(|| ContainerError::Protocol {
        message: format!("network '{name}' was listed without an ID"),
    })?;
    Ok(NetworkHandle {
        id,
        name: String::from(name),
    })
}
