//! Seam to the debugger backend collaborator.
//!
//! The protocol engine never drives a target itself: launching, breakpoint
//! resolution, and stepping belong to a backend behind this trait. The
//! engine only consumes the backend's success-or-message results.

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::warn;

const BACKEND_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::backend");

/// A validated breakpoint location from a `setBreakpoints` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceBreakpoint {
    /// 1-based source line; always positive.
    pub line: u32,
    /// 1-based source column; 0 means no column was supplied.
    pub column: u32,
}

/// Validated parameters of a `launch` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchParameters {
    /// Absolute path of the target program.
    pub program: Utf8PathBuf,
    /// Working directory requested by the client, already applied.
    pub cwd: Option<Utf8PathBuf>,
    /// Whether the client asked to stop at the program entry point.
    pub stop_on_entry: bool,
    /// Target command-line arguments.
    pub args: Vec<String>,
    /// Target environment entries.
    pub env: Vec<String>,
}

/// Failure reported by the backend, surfaced to the client as a failed
/// response with this message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct BackendError(String);

impl BackendError {
    /// Wraps a failure message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Debugger operations the protocol engine delegates to.
pub trait DebugBackend: Send {
    /// Launches the target and returns its system process id.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] whose message is reported to the client.
    fn launch(&mut self, parameters: &LaunchParameters) -> Result<u32, BackendError>;

    /// Replaces the complete breakpoint set for one source file.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] whose message is reported to the client.
    fn set_breakpoints(
        &mut self,
        path: &Utf8Path,
        breakpoints: &[SourceBreakpoint],
    ) -> Result<(), BackendError>;
}

/// Backend that records requests without driving a real debugger.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubBackend;

impl DebugBackend for StubBackend {
    fn launch(&mut self, parameters: &LaunchParameters) -> Result<u32, BackendError> {
        warn!(
            target: BACKEND_TARGET,
            program = %parameters.program,
            "launch requested but no debugger is wired; adopting the adapter's own pid"
        );
        Ok(std::process::id())
    }

    fn set_breakpoints(
        &mut self,
        path: &Utf8Path,
        breakpoints: &[SourceBreakpoint],
    ) -> Result<(), BackendError> {
        warn!(
            target: BACKEND_TARGET,
            path = %path,
            count = breakpoints.len(),
            "breakpoint sync requested but not yet implemented"
        );
        Ok(())
    }
}
