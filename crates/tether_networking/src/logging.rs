//! Tracing subscriber setup for binaries.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs a global `fmt` subscriber.
///
/// `RUST_LOG` wins when set, otherwise `default_level` (e.g. `"info"` or
/// `"tether_networking=debug"`) is used. Returns `false` if a global
/// subscriber was already installed.
pub fn init_logging(default_level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_names(true))
        .try_init()
        .is_ok()
}
