//! Assertion helpers for socket proxy behavioural tests.

use rstest_bdd_macros::then;

use super::StepResult;
use super::state::ProxyState;
use super::steps::world;

#[then("the client receives {expected}")]
fn client_receives(proxy_state: &ProxyState, expected: String) -> StepResult<()> {
    let responses = proxy_state.responses.get().unwrap_or_default();
    match responses.as_slice() {
        [reply] if *reply == expected => Ok(()),
        [reply] => Err(format!("expected '{expected}', got '{reply}'")),
        others => Err(format!("expected one reply, got {others:?}")),
    }
}

#[then("each client receives its own bytes {first} and {second}")]
fn each_client_receives_own(
    proxy_state: &ProxyState,
    first: String,
    second: String,
) -> StepResult<()> {
    let responses = proxy_state.responses.get().unwrap_or_default();
    if responses == [first.clone(), second.clone()] {
        Ok(())
    } else {
        Err(format!("expected [{first}, {second}], got {responses:?}"))
    }
}

#[then("start-up fails because the remote socket is unreachable")]
fn start_up_fails(proxy_state: &ProxyState) -> StepResult<()> {
    let error = proxy_state
        .start_error
        .get()
        .ok_or_else(|| String::from("the proxy started unexpectedly"))?;
    if error.starts_with("remote socket is unreachable") {
        Ok(())
    } else {
        Err(format!("unexpected start-up error: {error}"))
    }
}

#[then("the proxy is listening on the local socket")]
fn proxy_is_listening(proxy_state: &ProxyState) -> StepResult<()> {
    let world = world(proxy_state)?;
    let running = world
        .proxy
        .lock()
        .map_err(|_| "proxy lock poisoned")?
        .as_ref()
        .is_some_and(|proxy| proxy.local_socket() == world.local_socket());
    if running {
        Ok(())
    } else {
        Err(String::from("the proxy is not listening on the local socket"))
    }
}

#[then("the local socket file does not exist")]
fn local_socket_is_gone(proxy_state: &ProxyState) -> StepResult<()> {
    let local = world(proxy_state)?.local_socket();
    if local.exists() {
        Err(format!("{local} still exists"))
    } else {
        Ok(())
    }
}
