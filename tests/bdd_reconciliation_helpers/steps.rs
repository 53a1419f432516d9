//! Given/when steps for reconciliation scenarios.

use std::time::Duration;

use dockship::config::{PortSpec, ServiceDeclaration};
use dockship::engine::EngineClient;
use dockship::reconcile::Reconciler;
use rstest_bdd_macros::{given, when};
use tokio_util::sync::CancellationToken;

use super::StepResult;
use super::state::{PassResult, ReconciliationState};

const STOP_GRACE: Duration = Duration::from_secs(60);

/// Apply `change` to the declared service called `name`.
fn update_service(
    reconciliation_state: &ReconciliationState,
    name: &str,
    change: impl FnOnce(&mut ServiceDeclaration),
) -> StepResult<()> {
    let mut deployment = reconciliation_state
        .deployment
        .get()
        .ok_or_else(|| String::from("deployment should be initialised"))?;
    let service = deployment
        .services
        .iter_mut()
        .find(|service| service.name == name)
        .ok_or_else(|| format!("service {name} has not been declared"))?;
    change(service);
    reconciliation_state.deployment.set(deployment);
    Ok(())
}

#[given("an empty engine")]
fn given_empty_engine(reconciliation_state: &ReconciliationState) {
    // The fixture already starts with an empty daemon.
    let _ = reconciliation_state;
}

#[given("the engine already runs container {name} with id {id}")]
fn given_existing_container(
    reconciliation_state: &ReconciliationState,
    name: String,
    id: String,
) -> StepResult<()> {
    let daemon = reconciliation_state
        .daemon
        .get()
        .ok_or_else(|| String::from("daemon should be initialised"))?;
    daemon.seed_container(&name, &id);
    Ok(())
}

#[given("the engine rejects image {image}")]
fn given_rejected_image(
    reconciliation_state: &ReconciliationState,
    image: String,
) -> StepResult<()> {
    let daemon = reconciliation_state
        .daemon
        .get()
        .ok_or_else(|| String::from("daemon should be initialised"))?;
    daemon.reject_image(&image);
    Ok(())
}

#[given("service {name} runs image {image}")]
fn given_service(
    reconciliation_state: &ReconciliationState,
    name: String,
    image: String,
) -> StepResult<()> {
    let mut deployment = reconciliation_state
        .deployment
        .get()
        .ok_or_else(|| String::from("deployment should be initialised"))?;
    deployment
        .services
        .push(ServiceDeclaration::new(name, image));
    reconciliation_state.deployment.set(deployment);
    Ok(())
}

#[given("service {name} publishes port {port}")]
fn given_service_port(
    reconciliation_state: &ReconciliationState,
    name: String,
    port: u16,
) -> StepResult<()> {
    update_service(reconciliation_state, &name, |service| {
        service.ports.push(PortSpec::tcp(port));
    })
}

#[given("service {name} joins network {network}")]
fn given_service_network(
    reconciliation_state: &ReconciliationState,
    name: String,
    network: String,
) -> StepResult<()> {
    update_service(reconciliation_state, &name, |service| {
        service.networks.push(network);
    })
}

#[when("the deployment is reconciled")]
fn when_reconciled(reconciliation_state: &ReconciliationState) -> StepResult<()> {
    let daemon = reconciliation_state
        .daemon
        .get()
        .ok_or_else(|| String::from("daemon should be initialised"))?;
    let deployment = reconciliation_state
        .deployment
        .get()
        .ok_or_else(|| String::from("deployment should be initialised"))?;

    let engine = EngineClient::new(daemon);
    let reconciler = Reconciler::new(&engine, STOP_GRACE, CancellationToken::new());
    let mut output: Vec<u8> = Vec::new();

    let runtime =
        tokio::runtime::Runtime::new().map_err(|e| format!("failed to create runtime: {e}"))?;
    let pass = runtime.block_on(reconciler.reconcile(&deployment, &mut output));

    let result = match pass {
        Ok(report) => PassResult::Completed {
            replaced: report.replaced_count(),
        },
        Err(e) => PassResult::Failed(e.to_string()),
    };
    reconciliation_state.result.set(result);

    let mut printed = reconciliation_state.output.get().unwrap_or_default();
    printed.push_str(&String::from_utf8_lossy(&output));
    reconciliation_state.output.set(printed);
    Ok(())
}
