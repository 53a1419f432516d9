//! Structured logging set-up.
//!
//! Logs go to stderr so that container logs copied to stdout stay clean.
//! `RUST_LOG` wins when set; otherwise `--debug` selects the `debug` level
//! and the default is `info`.

use tracing_subscriber::EnvFilter;

/// Default filter directive when `RUST_LOG` is not set.
#[must_use]
pub const fn default_directive(debug: bool) -> &'static str {
    if debug { "debug" } else { "info" }
}

/// Build the filter from `rust_log` (the value of `RUST_LOG`, if any).
///
/// An unparseable `RUST_LOG` falls back to the default directive.
#[must_use]
pub fn filter(rust_log: Option<&str>, debug: bool) -> EnvFilter {
    rust_log
        .filter(|value| !value.trim().is_empty())
        .and_then(|value| EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| EnvFilter::new(default_directive(debug)))
}

/// Install the global subscriber.
///
/// Installing twice is a no-op; the first subscriber stays in place.
pub fn init(debug: bool) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter(rust_log.as_deref(), debug))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
    if let Err(e) = installed {
        tracing::debug!(error = %e, "logging already initialised");
    }
}
