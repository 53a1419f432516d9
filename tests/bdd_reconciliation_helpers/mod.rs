//! Behavioural helpers for reconciliation scenarios.
//!
//! Scenarios drive the real `EngineClient` and `Reconciler` against an
//! in-memory daemon.

mod assertions;
mod daemon;
mod state;
mod steps;

pub(crate) type StepResult<T> = Result<T, String>;

#[expect(
    unused_imports,
    reason = "rstest-bdd discovers step functions via attributes, not runtime usage"
)]
pub(crate) use assertions::*;
pub(crate) use state::{ReconciliationState, reconciliation_state};
#[expect(
    unused_imports,
    reason = "rstest-bdd discovers step functions via attributes, not runtime usage"
)]
pub(crate) use steps::*;
