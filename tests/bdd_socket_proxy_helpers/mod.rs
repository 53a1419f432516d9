//! Behavioural helpers for socket proxy scenarios.
//!
//! The remote engine socket is a Unix-socket echo server in a scratch
//! directory, dialled directly in place of an SSH channel.

mod assertions;
mod state;
mod steps;

pub(crate) type StepResult<T> = Result<T, String>;

#[expect(
    unused_imports,
    reason = "rstest-bdd discovers step functions via attributes, not runtime usage"
)]
pub(crate) use assertions::*;
pub(crate) use state::{ProxyState, proxy_state};
#[expect(
    unused_imports,
    reason = "rstest-bdd discovers step functions via attributes, not runtime usage"
)]
pub(crate) use steps::*;
