//! Structured logging configuration.
//!
//! The library itself only emits `tracing` events; embedding binaries call
//! [`init`] (or install their own subscriber) to surface them. The filter
//! comes from `RUST_LOG`, defaulting to `info` for this crate.

use tracing_subscriber::EnvFilter;

/// Default directive when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "netprobe=info";

/// Install the global fmt subscriber. Safe to call more than once; later
/// calls are no-ops because a global subscriber is already set.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
