//! Adapter daemon around the `tether-dap` protocol engine.
//!
//! The daemon parses the command line, installs stderr telemetry, selects
//! the transport (loopback TCP or inherited stdio), wires one protocol
//! session with the stub debugger backend, and tears everything down when
//! the session ends.

mod bootstrap;
mod cli;
mod telemetry;

pub use bootstrap::{BootstrapError, run};
pub use cli::Cli;
pub use telemetry::{LogFormat, TelemetryError, TelemetryHandle, initialise};
