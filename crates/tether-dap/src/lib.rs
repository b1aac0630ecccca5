//! Debug Adapter Protocol engine: framed JSON transport, a zero-copy value
//! codec, and the dispatch loop binding requests to handlers.
//!
//! The engine serves one session per process lifetime over either a
//! loopback TCP connection or the inherited standard streams. Incoming
//! packets are decoded in place — parsed strings borrow from the packet
//! buffer — and outgoing messages are built into an append-only buffer that
//! reaches the wire as one atomic packet write.
//!
//! The debugger itself lives behind the [`backend::DebugBackend`] seam; the
//! engine consumes only its success-or-message results. Background workers
//! created by [`redirect`] capture a redirected stream and forward chunks
//! as `output` events onto the same wire, which is why every packet write
//! is serialised behind one lock.

pub mod backend;
pub mod dispatch;
pub mod errors;
pub mod events;
pub mod framing;
mod handlers;
pub mod json;
pub mod redirect;
pub mod session;
pub mod trace;
pub mod transport;

pub use backend::{BackendError, DebugBackend, LaunchParameters, SourceBreakpoint, StubBackend};
pub use errors::{FrameError, ProtocolError, SessionError, TransportError};
pub use events::{OutputCategory, StopReason};
pub use framing::{PacketReader, Wire};
pub use json::{Builder, Object, SyntaxError, Value, parse};
pub use redirect::{RedirectError, RedirectHandle, redirect_fd};
pub use session::{LaunchedProgram, Session};
pub use trace::{Direction, TraceLog};
pub use transport::{Listener, TransportReader, TransportWriter};

#[cfg(test)]
mod tests;
