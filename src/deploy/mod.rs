//! Command-level orchestration.
//!
//! `deploy` wires the components together for one reconcile pass:
//!
//! 1. load and validate the declaration
//! 2. authenticate the SSH session
//! 3. start the socket proxy in front of the remote engine socket
//! 4. connect the engine client to the local socket and ping it
//! 5. reconcile
//!
//! The proxy and the session are torn down whatever the outcome.


use std::sync::Arc;

use camino::Utf8Path;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{AppConfig, Deployment, InitArgs, Prompter, prompt_deployment};
use crate::engine::{EngineClient, EngineConnector, Output};
use crate::error::{ConfigError, ContainerError, Result};
use crate::proxy::{ProxyEndpoint, SocketProxy};
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::transport::{ChannelOpener, ConnectionCredentials, SshSession};

/// Run one deployment against the remote host named in `config`.
///
/// # Errors
///
/// Returns the first configuration, transport, proxy or reconcile failure.
pub async fn deploy(
    config: &AppConfig,
    cancel: &CancellationToken,
    output: Output<'_>,
) -> Result<ReconcileReport> {
    let deployment = Deployment::load(&config.deploy.file)?;
    info!(
        file = %config.deploy.file,
        services = deployment.services.len(),
        "loaded deployment"
    );

    let credentials = ConnectionCredentials::from_config(config, &mockable::DefaultEnv::new())?;
    let session = Arc::new(SshSession::authenticate(&credentials).await?);

    let result =
        reconcile_through_proxy(Arc::clone(&session), config, &deployment, cancel, output).await;
    session.close().await;
    result
}

/// Start the proxy over `opener`, reconcile through it, then stop it.
///
/// # Errors
///
/// Returns `ProxyError` when the proxy cannot start,
/// `ContainerError::EngineNotReady` when the engine does not answer, and any
/// reconcile failure.
pub async fn reconcile_through_proxy<O>(
    opener: Arc<O>,
    config: &AppConfig,
    deployment: &Deployment,
    cancel: &CancellationToken,
    output: Output<'_>,
) -> Result<ReconcileReport>
where
    O: ChannelOpener + 'static,
{
    let endpoint = ProxyEndpoint {
        local_socket: config.proxy.local_socket.clone(),
        remote_socket: config.proxy.remote_socket.clone(),
    };
    let proxy = SocketProxy::start(endpoint, opener, cancel).await?;

    let result = reconcile_on_socket(proxy.local_socket(), config, deployment, cancel, output).await;
    proxy.shutdown().await;
    result
}

async fn reconcile_on_socket(
    socket: &Utf8Path,
    config: &AppConfig,
    deployment: &Deployment,
    cancel: &CancellationToken,
    output: Output<'_>,
) -> Result<ReconcileReport> {
    let engine = EngineClient::new(EngineConnector::connect(socket)?);
    if !engine.ping().await {
        return Err(ContainerError::EngineNotReady.into());
    }

    Reconciler::new(&engine, config.stop_timeout(), cancel.child_token())
        .reconcile(deployment, output)
        .await
}

/// Load and validate the declaration named in `config` without connecting.
///
/// # Errors
///
/// Returns `ConfigError` when the declaration is missing or invalid.
pub fn validate(config: &AppConfig) -> Result<Deployment> {
    let deployment = Deployment::load(&config.deploy.file)?;
    info!(
        file = %config.deploy.file,
        services = deployment.services.len(),
        "declaration is valid"
    );
    Ok(deployment)
}

/// Interactively build a declaration and write it to `args.output`.
///
/// An existing file is refused before any question is asked, unless
/// `args.force` is set.
///
/// # Errors
///
/// Returns `ConfigError::AlreadyExists`, `ConfigError::PromptFailed`,
/// declaration validation errors, and `FilesystemError` on write failure.
pub fn init<P: Prompter>(args: &InitArgs, prompter: &P) -> Result<Deployment> {
    if !args.force && args.output.exists() {
        return Err(ConfigError::AlreadyExists {
            path: args.output.as_std_path().to_path_buf(),
        }
        .into());
    }

    let deployment = prompt_deployment(prompter)?;
    deployment.save(&args.output, args.force)?;
    info!(
        path = %args.output,
        services = deployment.services.len(),
        "wrote deployment declaration"
    );
    Ok(deployment)
}
