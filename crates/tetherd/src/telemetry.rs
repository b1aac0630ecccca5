//! Structured telemetry initialisation for the adapter daemon.
//!
//! Telemetry always writes to stderr: in stdio transport mode stdout is the
//! wire, and in every mode stdout may be redirected into the output-capture
//! pipe. The packet trace log is separate plumbing with its own sink.

use std::io::{self, IsTerminal};

use clap::ValueEnum;
use once_cell::sync::OnceCell;
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Supported telemetry output formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Structured JSON suitable for ingestion by logging stacks.
    Json,
    /// Human-readable single line output.
    #[default]
    Compact,
}

/// Handle returned when telemetry has been initialised.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Failed to parse the configured log filter expression.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Failed to install the tracing subscriber.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Configures the global tracing subscriber when invoked for the first
/// time.
///
/// Repeated calls are idempotent: the first invocation installs the global
/// subscriber, later ones return a fresh [`TelemetryHandle`] without
/// touching the global state again.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter expression does not parse or
/// the subscriber cannot be installed.
pub fn initialise(filter: &str, format: LogFormat) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(filter, format))
        .map(|_| TelemetryHandle)
}

fn install_subscriber(filter: &str, format: LogFormat) -> Result<(), TelemetryError> {
    let filter =
        EnvFilter::try_new(filter).map_err(|error| TelemetryError::Filter(error.to_string()))?;

    let builder = |filter: EnvFilter| {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_writer(io::stderr)
            // Avoid stray colour codes in non-TTY sinks while keeping colour
            // on interactive terminals.
            .with_ansi(io::stderr().is_terminal())
            // Add a timestamp so operators can correlate adapter activity.
            .with_timer(fmt::time::UtcTime::rfc_3339())
    };

    let subscriber: Box<dyn Subscriber + Send + Sync> = match format {
        LogFormat::Json => Box::new(builder(filter).json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder(filter).compact().finish()),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialise_is_idempotent() {
        let first = initialise("info", LogFormat::Compact);
        let second = initialise("debug", LogFormat::Json);
        assert!(first.is_ok());
        assert!(second.is_ok());
    }

    #[test]
    fn rejects_malformed_filter_expressions() {
        let error = install_subscriber("not==valid==filter", LogFormat::Compact);
        assert!(matches!(error, Err(TelemetryError::Filter(_))));
    }
}
