//! Error types shared by the transport, framing, and dispatch layers.
//!
//! The taxonomy separates failures by how far up the stack they can be
//! recovered: transport and framing failures end the session, protocol
//! violations that cannot be answered on the wire end the session, and
//! validation failures are reported back to the client as a failed response
//! without disturbing the session.

use std::io;

use thiserror::Error;

use crate::json::SyntaxError;

/// Byte-level failures on the duplex channel. Fatal to the session.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer closed its end of the stream.
    #[error("end of stream")]
    Eof,

    /// I/O error during read or write.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Packet framing failures: the header was malformed or the payload was
/// truncated, so no packet is available.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The stream did not start with the `Content-Length: ` literal.
    #[error("Content-Length header not found")]
    MissingContentLength,

    /// The length field was empty, non-decimal, or not `\r\n`-terminated.
    #[error("invalid Content-Length value")]
    InvalidLength,

    /// The blank line separating header and payload was missing.
    #[error("header delimiter not found")]
    MissingDelimiter,

    /// The header announced a zero-length payload.
    #[error("zero-length content")]
    EmptyPayload,

    /// The header announced a payload larger than the engine accepts.
    #[error("{size}-byte content exceeds the {max}-byte limit")]
    PayloadTooLarge {
        /// Announced payload size.
        size: usize,
        /// Upper bound enforced by the reader.
        max: usize,
    },

    /// The underlying transport failed before the packet completed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Request envelope violations that cannot be answered on the wire: without
/// a `command` and a request `seq` there is nothing to correlate an error
/// response with.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The decoded packet was not a JSON object.
    #[error("received JSON is not an object")]
    NotAnObject,

    /// The `type` field was missing or not the string `request`.
    #[error("'type' field is not 'request'")]
    WrongType,

    /// The `command` field was missing or not a string.
    #[error("'command' field of string type expected")]
    MissingCommand,
}

/// Fatal conditions that end one protocol session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Packet framing failed mid-session.
    #[error("framing error: {0}")]
    Frame(#[from] FrameError),

    /// A packet did not decode as JSON.
    #[error("malformed JSON: {0}")]
    Syntax(#[from] SyntaxError),

    /// A packet decoded but was not a well-formed request.
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    /// The outbound transport failed while writing.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}
