//! Convergence of the remote engine onto a deployment declaration.
//!
//! Services are reconciled one at a time, in declaration order. For each
//! service the steps run strictly in this order:
//!
//! ```text
//! [BuildImage] -> EnsureNetworks -> LookupExistingContainer
//!     -> [StopExisting -> RemoveExisting] -> CreateContainer
//!     -> StartContainer -> RetrieveLogs
//! ```
//!
//! `BuildImage` only runs for services with a build context, and the stop and
//! remove steps only run when a container with the service name exists.
//! Replacement is destroy-then-recreate: the engine has no way to change the
//! image, ports or environment of an existing container.
//!
//! The first failing step aborts the whole pass. Services reconciled before
//! it keep their changes; services after it are not touched. Nothing is
//! rolled back, including on cancellation, so a service may be left stopped
//! without its replacement.


use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{Deployment, ServiceDeclaration};
use crate::engine::{ContainerEngine, ContainerHandle, NetworkHandle, Output};
use crate::error::{DockshipError, ReconcileStep, Result};

/// What reconciling one service did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceOutcome {
    /// The service name.
    pub service: String,
    /// The container now running the service.
    pub container: ContainerHandle,
    /// The container that was stopped and removed to make way, if any.
    pub replaced: Option<ContainerHandle>,
    /// The networks the container was attached to.
    pub networks: Vec<NetworkHandle>,
    /// Whether the image was built during this pass.
    pub image_built: bool,
}

/// The outcome of a full reconcile pass, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// One entry per reconciled service.
    pub services: Vec<ServiceOutcome>,
}

impl ReconcileReport {
    /// Number of services whose previous container was replaced.
    #[must_use]
    pub fn replaced_count(&self) -> usize {
        self.services
            .iter()
            .filter(|outcome| outcome.replaced.is_some())
            .count()
    }
}

/// Drives a [`ContainerEngine`] through the per-service steps.
pub struct Reconciler<'e, E: ?Sized> {
    engine: &'e E,
    stop_timeout: Duration,
    cancel: CancellationToken,
}

impl<'e, E: ContainerEngine + ?Sized> Reconciler<'e, E> {
    /// Create a reconciler. `stop_timeout` is the grace period a replaced
    /// container gets before it is killed.
    pub const fn new(engine: &'e E, stop_timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            engine,
            stop_timeout,
            cancel,
        }
    }

    /// Reconcile every service of `deployment`, copying build output and
    /// container logs to `output`.
    ///
    /// # Errors
    ///
    /// Returns `DockshipError::ServiceFailed` naming the first service and
    /// step that failed, or `DockshipError::Cancelled` when the cancellation
    /// token fired between steps.
    pub async fn reconcile(
        &self,
        deployment: &Deployment,
        output: Output<'_>,
    ) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();
        for service in &deployment.services {
            let outcome = self.reconcile_service(service, &mut *output).await?;
            report.services.push(outcome);
        }
        info!(
            services = report.services.len(),
            replaced = report.replaced_count(),
            "reconcile pass complete"
        );
        Ok(report)
    }

    /// Reconcile a single service.
    ///
    /// # Errors
    ///
    /// See [`Self::reconcile`].
    pub async fn reconcile_service(
        &self,
        service: &ServiceDeclaration,
        output: Output<'_>,
    ) -> Result<ServiceOutcome> {
        let name = service.name.as_str();
        info!(service = name, image = %service.image, "reconciling service");

        let image_built = if let Some(context) = service.build.as_deref() {
            let build = self
                .engine
                .build_image(&service.image, context, &mut *output);
            self.run(name, ReconcileStep::BuildImage, build).await?;
            true
        } else {
            false
        };

        let mut networks = Vec::with_capacity(service.networks.len());
        for network in &service.networks {
            let ensure = self.engine.ensure_network(network);
            networks.push(self.run(name, ReconcileStep::EnsureNetworks, ensure).await?);
        }

        let lookup = self.engine.find_container(name);
        let existing = self
            .run(name, ReconcileStep::LookupExistingContainer, lookup)
            .await?;

        if let Some(previous) = existing.as_ref() {
            info!(service = name, id = %previous.id, "replacing existing container");
            let stop = self.engine.stop_container(previous, self.stop_timeout);
            self.run(name, ReconcileStep::StopExisting, stop).await?;
            let remove = self.engine.remove_container(previous);
            self.run(name, ReconcileStep::RemoveExisting, remove).await?;
        }

        let create = self.engine.create_container(service);
        let container = self
            .run(name, ReconcileStep::CreateContainer, create)
            .await?;
        let start = self.engine.start_container(&container);
        self.run(name, ReconcileStep::StartContainer, start).await?;
        let logs = self.engine.stream_logs(&container, &mut *output);
        self.run(name, ReconcileStep::RetrieveLogs, logs).await?;

        info!(service = name, id = %container.id, "service reconciled");
        Ok(ServiceOutcome {
            service: String::from(name),
            container,
            replaced: existing,
            networks,
            image_built,
        })
    }

    /// Await one step, honouring cancellation at the step boundary and
    /// attributing any failure to `service` and `step`.
    ///
    /// Engine futures are lazy, so nothing reaches the engine when the pass
    /// was cancelled before the step.
    async fn run<T, F>(&self, service: &str, step: ReconcileStep, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.cancel.is_cancelled() {
            return Err(DockshipError::Cancelled);
        }
        tracing::debug!(service, %step, "reconcile step");
        call.await.map_err(|source| DockshipError::ServiceFailed {
            service: String::from(service),
            step,
            source: Box::new(source),
        })
    }
}
