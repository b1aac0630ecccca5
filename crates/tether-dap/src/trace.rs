//! Optional packet trace log.
//!
//! The trace mirrors every packet sent or received, for debugging the
//! adapter itself. It is synchronised independently of the send lock and is
//! strictly best-effort: trace failures never disturb the session.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

/// Direction of a traced packet, from the adapter's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Received from the client.
    Incoming,
    /// Sent to the client.
    Outgoing,
}

impl Direction {
    fn prefix(self) -> &'static str {
        match self {
            Self::Incoming => "-->",
            Self::Outgoing => "<--",
        }
    }
}

/// Mirror of the wire traffic, one record per packet.
#[derive(Debug)]
pub struct TraceLog {
    sink: Mutex<File>,
}

impl TraceLog {
    /// Creates (or truncates) the trace file at `path`.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when the file cannot be created.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let sink = File::create(path)?;
        Ok(Self {
            sink: Mutex::new(sink),
        })
    }

    /// Appends one packet record. Failures are swallowed.
    pub fn packet(&self, direction: Direction, payload: &[u8]) {
        if let Ok(mut sink) = self.sink.lock() {
            let _ = write!(
                sink,
                "\n{}\nContent-Length: {}\n\n",
                direction.prefix(),
                payload.len()
            );
            let _ = sink.write_all(payload);
            let _ = writeln!(sink);
        }
    }
}
