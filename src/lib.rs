//! Deploy containerised services to a remote Docker host over SSH.
//!
//! `dockship` reaches a remote container engine that exposes no network
//! endpoint of its own. It authenticates an SSH session to the host, exposes
//! the engine's control socket on a local Unix socket through a byte-for-byte
//! proxy, and then reconciles a declared set of services against the engine:
//! networks are created when missing, and every service's container is
//! replaced by a freshly created one.
//!
//! # Architecture
//!
//! Data flows leaves-first through the modules:
//!
//! ```text
//! config -> transport (SSH session) -> proxy (local socket)
//!        -> engine (typed client) -> reconcile (per-service steps)
//! ```
//!
//! [`deploy`] wires them together for one invocation and guarantees that the
//! proxy and the session are torn down afterwards.
//!
//! # Modules
//!
//! - [`config`]: CLI, layered application configuration and the deployment
//!   declaration document
//! - [`transport`]: SSH session and channels to remote Unix sockets
//! - [`proxy`]: local socket proxy for the remote engine socket
//! - [`engine`]: typed container engine client
//! - [`reconcile`]: convergence of the engine onto the declaration
//! - [`deploy`]: command-level orchestration
//! - [`error`]: semantic error types for the application
//! - [`logging`]: structured logging set-up

pub mod config;
pub mod deploy;
pub mod engine;
pub mod error;
pub mod logging;
pub mod proxy;
pub mod reconcile;
pub mod transport;
