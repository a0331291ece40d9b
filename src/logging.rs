//! logging
//!
//! Subscriber setup for binaries and tests that embed crossforge.
//!
//! The library itself only emits `tracing` events; nothing is printed until
//! a subscriber is installed. [`init`] installs a fmt subscriber filtered
//! by `RUST_LOG`, defaulting to `crossforge=info`.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "crossforge=info";

/// Install a global fmt subscriber writing to stderr.
///
/// Safe to call more than once; later calls are no-ops and return `false`.
pub fn init() -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .is_ok()
}
