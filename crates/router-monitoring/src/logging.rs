//! Structured logging init, grounded on the teacher's telemetry `init`
//! minus the OTLP exporter machinery (out of scope: long-term metrics
//! storage backends are an external collaborator).

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::{SubscriberInitExt, TryInitError}};

/// Install a global `tracing` subscriber: an env-filter plus a formatting
/// layer emitting structured JSON lines. Call once at process start.
///
/// # Errors
///
/// Returns an error if a global subscriber has already been installed.
pub fn init(log_filter: &str) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_new(log_filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry().with(filter).with(fmt_layer).try_init()
}
