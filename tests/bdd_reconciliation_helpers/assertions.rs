//! Assertion helpers for reconciliation behavioural tests.

use bollard::models::PortBinding;
use rstest_bdd_macros::then;

use super::StepResult;
use super::daemon::FakeDaemon;
use super::state::{PassResult, ReconciliationState};

fn daemon(reconciliation_state: &ReconciliationState) -> StepResult<FakeDaemon> {
    reconciliation_state
        .daemon
        .get()
        .ok_or_else(|| String::from("daemon should be initialised"))
}

fn pass_result(reconciliation_state: &ReconciliationState) -> StepResult<PassResult> {
    reconciliation_state
        .result
        .get()
        .ok_or_else(|| String::from("a reconcile pass should have run"))
}

#[then("the deployment succeeds")]
fn deployment_succeeds(reconciliation_state: &ReconciliationState) -> StepResult<()> {
    match pass_result(reconciliation_state)? {
        PassResult::Completed { .. } => Ok(()),
        PassResult::Failed(message) => Err(format!("expected success, got error: {message}")),
    }
}

#[then("the last pass replaced the existing container")]
fn last_pass_replaced_one(reconciliation_state: &ReconciliationState) -> StepResult<()> {
    match pass_result(reconciliation_state)? {
        PassResult::Completed { replaced: 1 } => Ok(()),
        PassResult::Completed { replaced } => {
            Err(format!("expected one replacement, got {replaced}"))
        }
        PassResult::Failed(message) => Err(format!("expected success, got error: {message}")),
    }
}

#[then("the deployment fails at step {step} of service {service}")]
fn deployment_fails_at(
    reconciliation_state: &ReconciliationState,
    step: String,
    service: String,
) -> StepResult<()> {
    let expected = format!("service '{service}' failed to {step}");
    match pass_result(reconciliation_state)? {
        PassResult::Failed(message) if message.starts_with(&expected) => Ok(()),
        PassResult::Failed(message) => Err(format!("expected '{expected}', got '{message}'")),
        PassResult::Completed { .. } => Err(format!("expected '{expected}', got success")),
    }
}

#[then("the engine runs exactly one container named {name}")]
fn exactly_one_running(reconciliation_state: &ReconciliationState, name: String) -> StepResult<()> {
    let containers = daemon(reconciliation_state)?.containers_named(&name);
    match containers.as_slice() {
        [container] if container.running => Ok(()),
        [container] => Err(format!("container {} is not running", container.id)),
        others => Err(format!(
            "expected one container named {name}, found {}",
            others.len()
        )),
    }
}

#[then("no container named {name} exists")]
fn no_container_named(reconciliation_state: &ReconciliationState, name: String) -> StepResult<()> {
    let count = daemon(reconciliation_state)?.containers_named(&name).len();
    if count == 0 {
        Ok(())
    } else {
        Err(format!("expected no container named {name}, found {count}"))
    }
}

#[then("network {name} was created once")]
fn network_created_once(reconciliation_state: &ReconciliationState, name: String) -> StepResult<()> {
    let expected = format!("create_network {name}");
    let count = daemon(reconciliation_state)?
        .calls()
        .iter()
        .filter(|call| **call == expected)
        .count();
    if count == 1 {
        Ok(())
    } else {
        Err(format!("network {name} was created {count} times"))
    }
}

#[then("container {name} publishes port {port} on all interfaces")]
fn publishes_port(
    reconciliation_state: &ReconciliationState,
    name: String,
    port: u16,
) -> StepResult<()> {
    let container = daemon(reconciliation_state)?
        .containers_named(&name)
        .into_iter()
        .next()
        .ok_or_else(|| format!("no container named {name}"))?;
    let bindings = container
        .body
        .host_config
        .and_then(|host| host.port_bindings)
        .and_then(|mut bindings| bindings.remove(&format!("{port}/tcp")))
        .flatten()
        .ok_or_else(|| format!("port {port} is not bound"))?;

    let expected = vec![PortBinding {
        host_ip: Some(String::from("0.0.0.0")),
        host_port: Some(port.to_string()),
    }];
    if bindings == expected {
        Ok(())
    } else {
        Err(format!("unexpected bindings for port {port}: {bindings:?}"))
    }
}

#[then("container {id} was stopped with a {seconds} second grace period before removal")]
fn stopped_before_removal(
    reconciliation_state: &ReconciliationState,
    id: String,
    seconds: u64,
) -> StepResult<()> {
    let calls = daemon(reconciliation_state)?.calls();
    let stop = format!("stop_container {id} t={seconds}");
    let remove = format!("remove_container {id}");
    let stopped_at = calls
        .iter()
        .position(|call| *call == stop)
        .ok_or_else(|| format!("'{stop}' was not called: {calls:?}"))?;
    let removed_at = calls
        .iter()
        .position(|call| *call == remove)
        .ok_or_else(|| format!("'{remove}' was not called: {calls:?}"))?;
    if stopped_at < removed_at {
        Ok(())
    } else {
        Err(format!("container {id} was removed before it was stopped"))
    }
}

#[then("the output contains {text}")]
fn output_contains(reconciliation_state: &ReconciliationState, text: String) -> StepResult<()> {
    let output = reconciliation_state.output.get().unwrap_or_default();
    if output.contains(&text) {
        Ok(())
    } else {
        Err(format!("output does not contain '{text}': {output}"))
    }
}
