//! Scenario state for reconciliation behavioural tests.

use dockship::config::Deployment;
use rstest::fixture;
use rstest_bdd::Slot;
use rstest_bdd_macros::ScenarioState;

use super::daemon::FakeDaemon;

/// Result of the most recent reconcile pass.
#[derive(Debug, Clone)]
pub(crate) enum PassResult {
    /// The pass completed; carries the number of replaced containers.
    Completed { replaced: usize },
    /// The pass failed with the given message.
    Failed(String),
}

#[derive(Default, ScenarioState)]
pub(crate) struct ReconciliationState {
    pub(crate) daemon: Slot<FakeDaemon>,
    pub(crate) deployment: Slot<Deployment>,
    pub(crate) result: Slot<PassResult>,
    pub(crate) output: Slot<String>,
}

#[fixture]
pub(crate) fn reconciliation_state() -> ReconciliationState {
    let state = ReconciliationState::default();
    state.daemon.set(FakeDaemon::default());
    state.deployment.set(Deployment::default());
    state.output.set(String::new());
    state
}
