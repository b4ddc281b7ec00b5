//! `fulcrum-observability` — process-wide logging setup.
//!
//! The engine crates emit structured `tracing` events (stock movements,
//! reconcile corrections, side-effect failures); embedders call [`init`]
//! once at startup to get them as JSON on stderr.

use tracing_subscriber::EnvFilter;

/// Install the global JSON subscriber.
///
/// The level comes from `RUST_LOG`, defaulting to `info`. Safe to call more
/// than once; later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
