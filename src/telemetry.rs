//! Tracing setup helpers.
//!
//! The library itself only emits `tracing` events; installing a subscriber is
//! the host application's call. [`init`] wires up the stack used by the demos
//! and tests: an env-filtered fmt layer plus span-trace capture for error
//! reports.

use tracing_error::ErrorLayer;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the default subscriber: `RUST_LOG` controls the filter, falling
/// back to `directive` when unset. Safe to call more than once; subsequent
/// calls are no-ops.
pub fn init(directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_span_events(FmtSpan::NONE))
        .with(ErrorLayer::default())
        .with(filter)
        .try_init();
}

/// [`init`] with a filter that keeps this crate at `info` and everything else
/// at `warn`.
pub fn init_default() {
    init("warn,blockweave=info");
}
