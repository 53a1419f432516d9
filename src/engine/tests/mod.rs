//! Unit tests for the typed engine client.
//!
//! The raw engine is replaced by a `mockall` mock of [`EngineApi`]; calls
//! that matter to an assertion are captured and inspected afterwards.


use std::sync::{Arc, Mutex};

use bollard::container::LogOutput;
use bollard::models::{
    BuildInfo, ContainerCreateBody, ContainerCreateResponse, ContainerSummary, Network,
    NetworkCreateRequest, NetworkCreateResponse, SystemVersion,
};
use bollard::query_parameters::{
    BuildImageOptions, CreateContainerOptions, LogsOptions, RemoveContainerOptions,
    StopContainerOptions,
};
use mockall::mock;
use rstest::fixture;

use super::{BollardFuture, BollardStream, EngineApi, EngineClient};

mock! {
    #[derive(Debug)]
    Api {}

    impl EngineApi for Api {
        fn version<'a>(&'a self) -> BollardFuture<'a, SystemVersion>;
        fn list_networks<'a>(&'a self) -> BollardFuture<'a, Vec<Network>>;
        fn create_network<'a>(
            &'a self,
            request: NetworkCreateRequest,
        ) -> BollardFuture<'a, NetworkCreateResponse>;
        fn list_containers<'a>(&'a self) -> BollardFuture<'a, Vec<ContainerSummary>>;
        fn create_container<'a>(
            &'a self,
            options: Option<CreateContainerOptions>,
            body: ContainerCreateBody,
        ) -> BollardFuture<'a, ContainerCreateResponse>;
        fn start_container<'a>(&'a self, container_id: &str) -> BollardFuture<'a, ()>;
        fn stop_container<'a>(
            &'a self,
            container_id: &str,
            options: Option<StopContainerOptions>,
        ) -> BollardFuture<'a, ()>;
        fn remove_container<'a>(
            &'a self,
            container_id: &str,
            options: Option<RemoveContainerOptions>,
        ) -> BollardFuture<'a, ()>;
        fn logs<'a>(
            &'a self,
            container_id: &str,
            options: Option<LogsOptions>,
        ) -> BollardStream<'a, LogOutput>;
        fn build_image<'a>(
            &'a self,
            options: BuildImageOptions,
            context: Vec<u8>,
        ) -> BollardStream<'a, BuildInfo>;
    }
}

type Client = EngineClient<MockApi>;

fn client(api: MockApi) -> Client {
    EngineClient::new(api)
}

fn server_error(status_code: u16, message: &str) -> bollard::errors::Error {
    bollard::errors::Error::DockerResponseServerError {
        status_code,
        message: String::from(message),
    }
}

fn network(id: Option<&str>, name: &str) -> Network {
    Network {
        id: id.map(String::from),
        name: Some(String::from(name)),
        ..Network::default()
    }
}

fn container_summary(id: &str, names: &[&str]) -> ContainerSummary {
    ContainerSummary {
        id: Some(String::from(id)),
        names: Some(names.iter().map(|name| String::from(*name)).collect()),
        ..ContainerSummary::default()
    }
}

/// Lock a capture, turning a poisoned mutex into a test failure.
fn lock<T>(captured: &Arc<Mutex<T>>) -> std::io::Result<std::sync::MutexGuard<'_, T>> {
    captured
        .lock()
        .map_err(|_| io_error("mock capture lock should succeed"))
}

fn io_error(message: impl Into<String>) -> std::io::Error {
    std::io::Error::other(message.into())
}

fn ensure(condition: bool, message: impl Into<String>) -> std::io::Result<()> {
    if condition {
        return Ok(());
    }

    Err(io_error(message))
}

#[fixture]
fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
}
