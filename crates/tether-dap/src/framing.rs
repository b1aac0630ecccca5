//! Content-Length packet framing and the shared outbound wire.
//!
//! Wire format, byte-exact: `Content-Length: <ASCII decimal>\r\n\r\n<payload>`.
//! The reader owns the inbound half of the transport; the [`Wire`] owns the
//! outbound half and is shared between the protocol loop and the
//! output-redirection workers, so every packet write happens under one lock.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use crate::errors::{FrameError, TransportError};
use crate::json::Builder;
use crate::trace::{Direction, TraceLog};
use crate::transport::{read_full, write_full};

const CONTENT_LENGTH: &str = "Content-Length: ";
/// Longest accepted run of length digits; a 64-bit value never needs more.
const MAX_LENGTH_DIGITS: usize = 20;
/// Upper bound on one payload; protects against absurd headers.
const MAX_PAYLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Reads Content-Length-delimited packets from the inbound transport.
#[derive(Debug)]
pub struct PacketReader<R> {
    reader: R,
    trace: Option<Arc<TraceLog>>,
}

impl<R: Read> PacketReader<R> {
    /// Wraps the inbound half; received packets are mirrored to `trace`.
    pub fn new(reader: R, trace: Option<Arc<TraceLog>>) -> Self {
        Self { reader, trace }
    }

    /// Reads one packet, returning its payload bytes.
    ///
    /// # Errors
    ///
    /// Any header mismatch, zero-length announcement, or transport failure
    /// is a [`FrameError`]; the current receive attempt yields no packet.
    pub fn read_packet(&mut self) -> Result<Vec<u8>, FrameError> {
        if !self.reads_exactly(CONTENT_LENGTH.as_bytes())? {
            return Err(FrameError::MissingContentLength);
        }
        let length = self.read_length()?;
        if !self.reads_exactly(b"\r\n")? {
            return Err(FrameError::MissingDelimiter);
        }
        if length == 0 {
            return Err(FrameError::EmptyPayload);
        }
        if length > MAX_PAYLOAD_BYTES {
            return Err(FrameError::PayloadTooLarge {
                size: length,
                max: MAX_PAYLOAD_BYTES,
            });
        }

        let mut payload = vec![0_u8; length];
        read_full(&mut self.reader, &mut payload)?;
        if let Some(trace) = &self.trace {
            trace.packet(Direction::Incoming, &payload);
        }
        Ok(payload)
    }

    /// Consumes `expected.len()` bytes and reports whether they matched.
    fn reads_exactly(&mut self, expected: &[u8]) -> Result<bool, TransportError> {
        let mut buffer = [0_u8; CONTENT_LENGTH.len()];
        let buffer = &mut buffer[..expected.len()];
        read_full(&mut self.reader, buffer)?;
        Ok(buffer == expected)
    }

    /// Reads the decimal length up to its terminating `\r\n`.
    fn read_length(&mut self) -> Result<usize, FrameError> {
        let mut digits = [0_u8; MAX_LENGTH_DIGITS];
        let mut count = 0;
        loop {
            let mut byte = [0_u8; 1];
            read_full(&mut self.reader, &mut byte)?;
            match byte[0] {
                b'\r' => break,
                digit @ b'0'..=b'9' if count < MAX_LENGTH_DIGITS => {
                    digits[count] = digit;
                    count += 1;
                }
                _ => return Err(FrameError::InvalidLength),
            }
        }
        let mut byte = [0_u8; 1];
        read_full(&mut self.reader, &mut byte)?;
        if byte[0] != b'\n' || count == 0 {
            return Err(FrameError::InvalidLength);
        }
        std::str::from_utf8(&digits[..count])
            .ok()
            .and_then(|text| text.parse().ok())
            .ok_or(FrameError::InvalidLength)
    }
}

/// Shared outbound half of the transport.
///
/// Each packet is written while holding the writer lock, so two concurrently
/// emitted packets can never interleave their header and body bytes: the
/// byte stream a client observes is exactly the sequence of completed
/// [`Wire::write_packet`] calls in lock-acquisition order.
pub struct Wire {
    writer: Mutex<Box<dyn Write + Send>>,
    trace: Option<Arc<TraceLog>>,
    sequence: AtomicI64,
}

impl std::fmt::Debug for Wire {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Wire")
            .field("sequence", &self.sequence.load(Ordering::SeqCst))
            .field("traced", &self.trace.is_some())
            .finish()
    }
}

impl Wire {
    /// Wraps the outbound half; sent packets are mirrored to `trace`.
    pub fn new(writer: impl Write + Send + 'static, trace: Option<Arc<TraceLog>>) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
            trace,
            sequence: AtomicI64::new(1),
        }
    }

    /// Next outgoing message sequence number; monotonic, starting at 1.
    pub fn next_seq(&self) -> i64 {
        self.sequence.fetch_add(1, Ordering::SeqCst)
    }

    /// Writes one packet as an atomic unit with respect to other writers.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the header or payload cannot be fully
    /// written; the failure is fatal to the session.
    pub fn write_packet(&self, payload: &[u8]) -> Result<(), TransportError> {
        // A poisoned lock still guards a usable writer; every packet write
        // is self-contained.
        let mut writer = match self.writer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let header = format!("Content-Length: {}\r\n\r\n", payload.len());
        write_full(&mut **writer, header.as_bytes())?;
        write_full(&mut **writer, payload)?;
        writer.flush()?;
        // Mirrored under the send lock so trace records preserve wire order.
        if let Some(trace) = &self.trace {
            trace.packet(Direction::Outgoing, payload);
        }
        Ok(())
    }

    /// Sends a completed builder; the only path from a builder to the wire.
    ///
    /// # Errors
    ///
    /// Propagates [`TransportError`] from [`Wire::write_packet`].
    pub fn send(&self, builder: Builder) -> Result<(), TransportError> {
        self.write_packet(&builder.finish())
    }
}
