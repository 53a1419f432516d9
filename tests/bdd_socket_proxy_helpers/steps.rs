//! Given/when steps for socket proxy scenarios.

use std::sync::Arc;

use camino::Utf8Path;
use dockship::proxy::SocketProxy;
use rstest_bdd_macros::{given, when};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;

use super::StepResult;
use super::state::{DirectOpener, ProxyState, ProxyWorld};

pub(crate) fn world(proxy_state: &ProxyState) -> StepResult<Arc<ProxyWorld>> {
    proxy_state
        .world
        .get()
        .ok_or_else(|| String::from("world should be initialised"))
}

/// Connect through the proxy, send `payload`, half-close and read the reply.
async fn exchange(local: &Utf8Path, payload: String) -> Result<String, String> {
    let mut client = UnixStream::connect(local)
        .await
        .map_err(|e| format!("client failed to connect: {e}"))?;
    client
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| format!("client write failed: {e}"))?;
    client
        .shutdown()
        .await
        .map_err(|e| format!("client half-close failed: {e}"))?;
    let mut reply = Vec::new();
    client
        .read_to_end(&mut reply)
        .await
        .map_err(|e| format!("client read failed: {e}"))?;
    String::from_utf8(reply).map_err(|e| format!("reply is not UTF-8: {e}"))
}

#[given("the remote engine socket echoes every byte")]
fn given_echo_remote(proxy_state: &ProxyState) -> StepResult<()> {
    let world = world(proxy_state)?;
    let remote = world.remote_socket();
    world.runtime.block_on(async move {
        let listener =
            UnixListener::bind(&remote).map_err(|e| format!("echo listener failed: {e}"))?;
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let (mut reader, mut writer) = stream.into_split();
                    if tokio::io::copy(&mut reader, &mut writer).await.is_ok() {
                        let _closed = writer.shutdown().await;
                    }
                });
            }
        });
        Ok(())
    })
}

#[given("nothing listens on the remote engine socket")]
fn given_unreachable_remote(proxy_state: &ProxyState) {
    // The scratch directory starts empty.
    let _ = proxy_state;
}

#[given("a stale file occupies the local socket path")]
fn given_stale_local_socket(proxy_state: &ProxyState) -> StepResult<()> {
    let world = world(proxy_state)?;
    std::fs::write(world.local_socket(), b"left over from a crashed run")
        .map_err(|e| format!("failed to write stale file: {e}"))
}

#[when("the proxy starts")]
fn when_proxy_starts(proxy_state: &ProxyState) -> StepResult<()> {
    let world = world(proxy_state)?;
    let started = world.runtime.block_on(SocketProxy::start(
        world.endpoint(),
        Arc::new(DirectOpener),
        &CancellationToken::new(),
    ));
    match started {
        Ok(handle) => {
            let mut proxy = world.proxy.lock().map_err(|_| "proxy lock poisoned")?;
            *proxy = Some(handle);
        }
        Err(e) => proxy_state.start_error.set(e.to_string()),
    }
    Ok(())
}

#[when("a client sends {payload}")]
fn when_client_sends(proxy_state: &ProxyState, payload: String) -> StepResult<()> {
    let world = world(proxy_state)?;
    let reply = world
        .runtime
        .block_on(exchange(&world.local_socket(), payload))?;
    proxy_state.responses.set(vec![reply]);
    Ok(())
}

#[when("two clients send {first} and {second} at the same time")]
fn when_two_clients_send(
    proxy_state: &ProxyState,
    first: String,
    second: String,
) -> StepResult<()> {
    let world = world(proxy_state)?;
    let local = world.local_socket();
    let (first_reply, second_reply) = world.runtime.block_on(async {
        tokio::join!(exchange(&local, first), exchange(&local, second))
    });
    proxy_state.responses.set(vec![first_reply?, second_reply?]);
    Ok(())
}

#[when("the proxy is shut down")]
fn when_proxy_shut_down(proxy_state: &ProxyState) -> StepResult<()> {
    let world = world(proxy_state)?;
    let handle = world
        .proxy
        .lock()
        .map_err(|_| "proxy lock poisoned")?
        .take()
        .ok_or_else(|| String::from("the proxy is not running"))?;
    world.runtime.block_on(handle.shutdown());
    Ok(())
}
