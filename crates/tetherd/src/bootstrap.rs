//! Daemon bootstrap: telemetry, transport selection, session wiring, and
//! teardown.
//!
//! Exactly one transport is active per process lifetime: `--port` binds a
//! loopback listener and serves the first client to connect; without it the
//! inherited standard streams are the wire. The transport is established
//! before standard output is redirected, so adapter packets never loop back
//! through the output capture.

use std::os::fd::AsRawFd;
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use tether_dap::events::OutputCategory;
use tether_dap::{
    Listener, PacketReader, RedirectError, Session, SessionError, StubBackend, TraceLog,
    TransportError, Wire, dispatch, redirect_fd, transport,
};

use crate::cli::Cli;
use crate::telemetry::{self, TelemetryError};

const BOOTSTRAP_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::bootstrap");

/// Errors that abort daemon startup or end the session abnormally.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Telemetry could not be initialised.
    #[error("telemetry: {0}")]
    Telemetry(#[from] TelemetryError),

    /// The packet trace file could not be created.
    #[error("failed to open trace file: {0}")]
    Trace(#[source] std::io::Error),

    /// The transport could not be established.
    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    /// Standard output could not be redirected.
    #[error("output redirection: {0}")]
    Redirect(#[from] RedirectError),

    /// The protocol session ended with a fatal error.
    #[error("session failed: {0}")]
    Session(#[from] SessionError),
}

/// Runs the daemon to completion: one session, then teardown.
///
/// # Errors
///
/// Returns [`BootstrapError`] when startup fails or the session ends with a
/// fatal protocol, framing, or transport error.
pub fn run(cli: Cli) -> Result<(), BootstrapError> {
    telemetry::initialise(&cli.log_filter, cli.log_format)?;

    if cli.wait_for_debugger {
        info!(
            target: BOOTSTRAP_TARGET,
            pid = std::process::id(),
            "paused waiting for a debugger to attach"
        );
        nix::unistd::pause();
    }

    let trace = cli
        .trace_file
        .as_deref()
        .map(TraceLog::create)
        .transpose()
        .map_err(BootstrapError::Trace)?
        .map(Arc::new);

    let (reader, writer) = match cli.port {
        Some(port) => {
            let listener = Listener::bind(port)?;
            if let Ok(addr) = listener.local_addr() {
                info!(
                    target: BOOTSTRAP_TARGET,
                    port = addr.port(),
                    "listening for a debug client"
                );
            }
            listener.accept_one()?
        }
        None => {
            info!(target: BOOTSTRAP_TARGET, "serving the inherited standard streams");
            transport::stdio()?
        }
    };

    let wire = Arc::new(Wire::new(writer, trace.clone()));
    let session = Arc::new(Session::new(wire, Box::new(StubBackend)));

    // Capture the target's standard output as `output` events. The wire
    // holds its own duplicate of the original descriptor, so redirecting
    // fd 1 here never swallows adapter packets.
    let redirect = redirect_fd(
        Arc::clone(&session),
        std::io::stdout().as_raw_fd(),
        OutputCategory::Stdout,
    )?;

    let mut packets = PacketReader::new(reader, trace);
    let outcome = dispatch::run(&session, &mut packets);

    redirect.join();
    info!(target: BOOTSTRAP_TARGET, "session ended");
    outcome.map_err(BootstrapError::from)
}
