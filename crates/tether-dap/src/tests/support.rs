//! Shared scaffolding for engine tests.

use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};

use crate::backend::StubBackend;
use crate::framing::{PacketReader, Wire};
use crate::session::Session;

/// Write sink that captures bytes for later inspection.
#[derive(Debug, Clone, Default)]
pub(crate) struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn contents(&self) -> Vec<u8> {
        self.bytes.lock().expect("buffer lock").clone()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.bytes.lock().expect("buffer lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Writer that trickles one byte per call, yielding between writes, to
/// maximise the chance of interleaving when exclusion is broken.
#[derive(Debug, Clone)]
pub(crate) struct TrickleWriter {
    inner: SharedBuffer,
}

impl TrickleWriter {
    pub(crate) fn new(inner: SharedBuffer) -> Self {
        Self { inner }
    }
}

impl Write for TrickleWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let written = self.inner.write(&buf[..1])?;
        std::thread::yield_now();
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// A session whose wire writes into an in-memory buffer.
pub(crate) fn memory_session() -> (Arc<Session>, SharedBuffer) {
    let sink = SharedBuffer::new();
    let wire = Arc::new(Wire::new(sink.clone(), None));
    let session = Arc::new(Session::new(wire, Box::new(StubBackend)));
    (session, sink)
}

/// Splits a captured byte stream back into framed payloads.
pub(crate) fn read_packets(bytes: &[u8]) -> Vec<Vec<u8>> {
    let mut reader = PacketReader::new(Cursor::new(bytes.to_vec()), None);
    let mut packets = Vec::new();
    while let Ok(payload) = reader.read_packet() {
        packets.push(payload);
    }
    packets
}

/// Decodes every captured packet as standard JSON.
pub(crate) fn json_packets(sink: &SharedBuffer) -> Vec<serde_json::Value> {
    read_packets(&sink.contents())
        .iter()
        .map(|payload| serde_json::from_slice(payload).expect("wire payload is standard JSON"))
        .collect()
}

/// Frames a payload the way a protocol client would.
pub(crate) fn frame(payload: &str) -> Vec<u8> {
    format!("Content-Length: {}\r\n\r\n{payload}", payload.len()).into_bytes()
}
