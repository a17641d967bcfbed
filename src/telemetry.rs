//! Telemetry initialization.
//!
//! Grounded on the teacher's `telemetry.rs` stderr path only — there is no
//! CLI process boundary in this crate to hold an OTLP shutdown guard, so the
//! OTLP export path and its `TelemetryGuard` are dropped (see "Dropped from
//! the teacher" in `DESIGN.md`). Callers that embed this crate in a process
//! with its own telemetry story are free to skip this module entirely and
//! install their own `tracing` subscriber instead.

use tracing_subscriber::EnvFilter;

/// Install a `tracing` subscriber that writes JSON spans and events to
/// stderr, honoring `RUST_LOG` (falling back to `"info"`).
///
/// # Panics
/// Panics if a global subscriber has already been installed.
pub fn init_stderr() {
    use tracing_subscriber::layer::SubscriberExt as _;
    use tracing_subscriber::util::SubscriberInitExt as _;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE),
        )
        .init();
}
