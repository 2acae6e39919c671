//! # Telemetry: Subscriber Setup
//!
//! The runtime logs through `tracing`. Applications that do not install their
//! own subscriber can call one of these helpers once at startup.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,weft_runtime=debug";

/// Initialize a simple stdout tracing subscriber for development.
///
/// `RUST_LOG` takes precedence over the built-in filter.
pub fn init_stdout_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Like `init_stdout_tracing`, but tolerates an already installed subscriber.
///
/// Handy in tests, where many cases race to install one.
pub fn try_init_test_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
