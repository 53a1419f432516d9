//! Typed client for the remote container engine.
//!
//! Once the socket proxy is running, the remote engine's control socket is
//! reachable at a local path. [`EngineConnector::connect`] opens a `bollard`
//! client on that path and [`EngineClient`] wraps it with the operations the
//! reconciler needs:
//!
//! - liveness ([`EngineClient::ping`])
//! - network lookup and creation
//! - container lookup, creation, start, stop and removal
//! - buffered log retrieval
//! - image builds from a local context directory
//!
//! Networks and containers are looked up by exact name over the full list;
//! a miss is `Ok(None)`, not an error. Once a container is created, the ID
//! the engine returned is used for every later lifecycle call.

mod build;
mod client;
mod container;
mod error_classification;
mod logs;
mod network;

#[cfg(test)]
mod tests;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use camino::Utf8Path;
use tokio::io::AsyncWrite;

pub use client::{BollardFuture, BollardStream, EngineApi, EngineConnector};

use crate::config::ServiceDeclaration;
use crate::error::Result;

/// Operator-facing output that logs and build progress are copied to.
pub type Output<'a> = &'a mut (dyn AsyncWrite + Send + Unpin);

/// Boxed future returned by [`ContainerEngine`] implementors.
pub type EngineFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// An engine-side network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkHandle {
    /// Engine-assigned network ID.
    pub id: String,
    /// Network name.
    pub name: String,
}

/// An engine-side container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    /// Engine-assigned container ID.
    pub id: String,
    /// Container name, without the engine's leading slash.
    pub name: String,
}

/// The engine operations the reconciler drives.
///
/// [`EngineClient`] is the production implementation; the trait keeps the
/// reconcile state machine testable against an in-memory engine.
pub trait ContainerEngine: Send + Sync {
    /// Return the existing network called `name`, creating a bridge network
    /// when there is none.
    fn ensure_network<'a>(&'a self, name: &'a str) -> EngineFuture<'a, NetworkHandle>;

    /// Find the container called `name`, running or not.
    fn find_container<'a>(&'a self, name: &'a str) -> EngineFuture<'a, Option<ContainerHandle>>;

    /// Create (but do not start) the container for `service`.
    fn create_container<'a>(
        &'a self,
        service: &'a ServiceDeclaration,
    ) -> EngineFuture<'a, ContainerHandle>;

    /// Start a created container.
    fn start_container<'a>(&'a self, container: &'a ContainerHandle) -> EngineFuture<'a, ()>;

    /// Stop a container, killing it after `grace`.
    fn stop_container<'a>(
        &'a self,
        container: &'a ContainerHandle,
        grace: Duration,
    ) -> EngineFuture<'a, ()>;

    /// Remove a container, forcing removal of a running one.
    fn remove_container<'a>(&'a self, container: &'a ContainerHandle) -> EngineFuture<'a, ()>;

    /// Copy the container's buffered stdout and stderr to `output`.
    fn stream_logs<'a>(
        &'a self,
        container: &'a ContainerHandle,
        output: Output<'a>,
    ) -> EngineFuture<'a, ()>;

    /// Build `image` from the directory at `context`, copying build progress
    /// to `output`.
    fn build_image<'a>(
        &'a self,
        image: &'a str,
        context: &'a Utf8Path,
        output: Output<'a>,
    ) -> EngineFuture<'a, ()>;
}

/// Typed engine client over an [`EngineApi`] implementation.
#[derive(Debug, Clone)]
pub struct EngineClient<C> {
    api: C,
}

impl<C: EngineApi> EngineClient<C> {
    /// Wrap a raw engine client.
    pub const fn new(api: C) -> Self {
        Self { api }
    }

    /// Check whether the engine answers with a usable version.
    ///
    /// This is a soft readiness probe: any failure, and an empty version
    /// string, yields `false` rather than an error.
    pub async fn ping(&self) -> bool {
        match self.api.version().await {
            Ok(report) => report
                .version
                .as_deref()
                .is_some_and(|version| !version.trim().is_empty()),
            Err(e) => {
                tracing::debug!(error = %e, "engine ping failed");
                false
            }
        }
    }
}

impl<C: EngineApi> ContainerEngine for EngineClient<C> {
    fn ensure_network<'a>(&'a self, name: &'a str) -> EngineFuture<'a, NetworkHandle> {
        Box::pin(Self::ensure_network(self, name))
    }

    fn find_container<'a>(&'a self, name: &'a str) -> EngineFuture<'a, Option<ContainerHandle>> {
        Box::pin(Self::find_container(self, name))
    }

    fn create_container<'a>(
        &'a self,
        service: &'a ServiceDeclaration,
    ) -> EngineFuture<'a, ContainerHandle> {
        Box::pin(Self::create_container(self, service))
    }

    fn start_container<'a>(&'a self, container: &'a ContainerHandle) -> EngineFuture<'a, ()> {
        Box::pin(Self::start_container(self, container))
    }

    fn stop_container<'a>(
        &'a self,
        container: &'a ContainerHandle,
        grace: Duration,
    ) -> EngineFuture<'a, ()> {
        Box::pin(Self::stop_container(self, container, grace))
    }

    fn remove_container<'a>(&'a self, container: &'a ContainerHandle) -> EngineFuture<'a, ()> {
        Box::pin(Self::remove_container(self, container))
    }

    fn stream_logs<'a>(
        &'a self,
        container: &'a ContainerHandle,
        output: Output<'a>,
    ) -> EngineFuture<'a, ()> {
        Box::pin(Self::stream_logs(self, container, output))
    }

    fn build_image<'a>(
        &'a self,
        image: &'a str,
        context: &'a Utf8Path,
        output: Output<'a>,
    ) -> EngineFuture<'a, ()> {
        Box::pin(Self::build_image(self, image, context, output))
    }
}
