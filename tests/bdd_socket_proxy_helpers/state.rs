//! Scenario state for socket proxy behavioural tests.

use std::sync::{Arc, Mutex};

use camino::Utf8PathBuf;
use dockship::error::TransportError;
use dockship::proxy::{ProxyEndpoint, ProxyHandle};
use dockship::transport::{Channel, ChannelOpener, OpenChannelFuture};
use rstest::fixture;
use rstest_bdd::Slot;
use rstest_bdd_macros::ScenarioState;
use tokio::net::UnixStream;

/// Opens "remote" channels by dialling the socket path on this machine.
pub(crate) struct DirectOpener;

impl ChannelOpener for DirectOpener {
    fn open_channel<'a>(&'a self, remote_path: &'a str) -> OpenChannelFuture<'a> {
        Box::pin(async move {
            let stream = UnixStream::connect(remote_path).await.map_err(|e| {
                TransportError::ChannelOpenFailed {
                    path: String::from(remote_path),
                    message: e.to_string(),
                }
            })?;
            Ok(Box::new(stream) as Channel)
        })
    }
}

/// Runtime, scratch directory and running proxy shared by one scenario.
pub(crate) struct ProxyWorld {
    pub(crate) runtime: tokio::runtime::Runtime,
    _dir: tempfile::TempDir,
    root: Utf8PathBuf,
    pub(crate) proxy: Mutex<Option<ProxyHandle>>,
}

impl ProxyWorld {
    pub(crate) fn local_socket(&self) -> Utf8PathBuf {
        self.root.join("local.sock")
    }

    pub(crate) fn remote_socket(&self) -> Utf8PathBuf {
        self.root.join("remote.sock")
    }

    pub(crate) fn endpoint(&self) -> ProxyEndpoint {
        ProxyEndpoint {
            local_socket: self.local_socket(),
            remote_socket: self.remote_socket().into_string(),
        }
    }
}

#[derive(Default, ScenarioState)]
pub(crate) struct ProxyState {
    pub(crate) world: Slot<Arc<ProxyWorld>>,
    pub(crate) start_error: Slot<String>,
    pub(crate) responses: Slot<Vec<String>>,
}

#[fixture]
#[expect(clippy::expect_used, reason = "fixture set-up - panics are acceptable")]
pub(crate) fn proxy_state() -> ProxyState {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let root =
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("tempdir path should be UTF-8");
    let runtime = tokio::runtime::Runtime::new().expect("runtime should start");

    let state = ProxyState::default();
    state.world.set(Arc::new(ProxyWorld {
        runtime,
        _dir: dir,
        root,
        proxy: Mutex::new(None),
    }));
    state
}
