//! Typed emitters for the event and response shapes the engine produces.
//!
//! Every message is a JSON object with a monotonic `seq` and a `type` of
//! `response` or `event`. Emitters build the full message and hand it to the
//! wire in one piece, so concurrent emitters never interleave.

use strum::Display;

use crate::errors::TransportError;
use crate::framing::Wire;
use crate::json::{Builder, Object};
use crate::session::Session;

/// Why the target stopped, as reported in a `stopped` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum StopReason {
    /// A stepping action completed.
    Step,
    /// A breakpoint was hit.
    Breakpoint,
    /// The target raised an exception.
    Exception,
    /// The client asked for a pause.
    Pause,
    /// Stopped on entry before running user code.
    Entry,
}

/// Category attached to an `output` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum OutputCategory {
    /// Adapter console output.
    Console,
    /// Captured target standard output.
    Stdout,
    /// Captured target standard error.
    Stderr,
    /// Telemetry payloads.
    Telemetry,
}

fn event_builder(wire: &Wire, name: &str) -> Builder {
    let mut builder = Builder::new();
    builder.begin_object();
    builder.int_field("seq", wire.next_seq());
    builder.raw_string_field("type", "event");
    builder.raw_string_field("event", name);
    builder
}

fn send_body_event(
    session: &Session,
    name: &str,
    fill: impl FnOnce(&mut Builder),
) -> Result<(), TransportError> {
    let mut builder = event_builder(session.wire(), name);
    builder.field("body");
    builder.begin_object();
    fill(&mut builder);
    builder.end_object();
    builder.end_object();
    session.wire().send(builder)
}

/// Sends an event that carries no body.
///
/// # Errors
///
/// Returns [`TransportError`] when the wire write fails.
pub fn send_simple_event(session: &Session, name: &str) -> Result<(), TransportError> {
    let mut builder = event_builder(session.wire(), name);
    builder.end_object();
    session.wire().send(builder)
}

/// Sends a `stopped` event; all threads are reported stopped.
///
/// # Errors
///
/// Returns [`TransportError`] when the wire write fails.
pub fn send_stopped(
    session: &Session,
    thread_id: i64,
    reason: StopReason,
    description: Option<&str>,
) -> Result<(), TransportError> {
    send_body_event(session, "stopped", |builder| {
        builder.raw_string_field("reason", &reason.to_string());
        if let Some(description) = description {
            builder.string_field("description", description);
        }
        builder.int_field("threadId", thread_id);
        builder.bool_field("allThreadsStopped", true);
    })
}

/// Sends a `stopped` event for a breakpoint hit, naming the breakpoint and
/// location in the description.
///
/// # Errors
///
/// Returns [`TransportError`] when the wire write fails.
pub fn send_stopped_at_breakpoint(
    session: &Session,
    thread_id: i64,
    breakpoint_id: u64,
    location_id: u64,
) -> Result<(), TransportError> {
    let description = format!("breakpoint {breakpoint_id}.{location_id}");
    send_stopped(
        session,
        thread_id,
        StopReason::Breakpoint,
        Some(&description),
    )
}

/// Sends an `exited` event with the target's exit code.
///
/// # Errors
///
/// Returns [`TransportError`] when the wire write fails.
pub fn send_exited(session: &Session, exit_code: u64) -> Result<(), TransportError> {
    send_body_event(session, "exited", |builder| {
        builder.unsigned_field("exitCode", exit_code);
    })
}

/// Sends the `terminated` event at most once per session, no matter how many
/// code paths race to trigger it.
///
/// # Errors
///
/// Returns [`TransportError`] when the wire write fails.
pub fn send_terminated(session: &Session) -> Result<(), TransportError> {
    if session.mark_terminated() {
        send_simple_event(session, "terminated")
    } else {
        Ok(())
    }
}

/// Sends the `process` event describing the launched target. Nothing is
/// sent when no launch has succeeded yet.
///
/// # Errors
///
/// Returns [`TransportError`] when the wire write fails.
pub fn send_process_launched(session: &Session) -> Result<(), TransportError> {
    let Some(launched) = session.launched() else {
        return Ok(());
    };
    send_body_event(session, "process", |builder| {
        builder.string_field("name", launched.path.as_str());
        builder.unsigned_field("systemProcessId", u64::from(launched.pid));
        builder.bool_field("isLocalProcess", true);
        builder.raw_string_field("startMethod", "launch");
    })
}

/// Sends a `breakpoint` event announcing a changed breakpoint state.
///
/// # Errors
///
/// Returns [`TransportError`] when the wire write fails.
pub fn send_breakpoint_changed(
    session: &Session,
    id: u64,
    verified: bool,
) -> Result<(), TransportError> {
    send_body_event(session, "breakpoint", |builder| {
        builder.field("breakpoint");
        builder.begin_object();
        builder.unsigned_field("id", id);
        builder.bool_field("verified", verified);
        builder.end_object();
        builder.raw_string_field("reason", "changed");
    })
}

/// Sends an `output` event carrying one captured chunk. Empty chunks are
/// dropped. Bytes that are not valid UTF-8 are replaced, keeping the wire
/// standard JSON.
///
/// # Errors
///
/// Returns [`TransportError`] when the wire write fails.
pub fn send_output(
    session: &Session,
    category: OutputCategory,
    chunk: &[u8],
) -> Result<(), TransportError> {
    if chunk.is_empty() {
        return Ok(());
    }
    let text = String::from_utf8_lossy(chunk);
    send_body_event(session, "output", |builder| {
        builder.string_field("output", &text);
        builder.raw_string_field("category", &category.to_string());
    })
}

/// Starts a response envelope correlated with `request`; `error` turns it
/// into a failed response carrying that message. The returned builder has
/// the envelope object still open so callers can attach a body.
pub(crate) fn response_builder(wire: &Wire, request: &Object<'_>, error: Option<&str>) -> Builder {
    let command = request.str_field("command").unwrap_or_default();
    let request_seq = request.int_field("seq", 0);

    let mut builder = Builder::new();
    builder.begin_object();
    builder.int_field("seq", wire.next_seq());
    builder.raw_string_field("type", "response");
    builder.raw_string_field("command", command);
    builder.int_field("request_seq", request_seq);
    builder.bool_field("success", error.is_none());
    if let Some(message) = error {
        builder.string_field("message", message);
    }
    builder
}

/// Sends a bodyless response for `request`; `error` reports a validation
/// failure to the client without ending the session.
///
/// # Errors
///
/// Returns [`TransportError`] when the wire write fails.
pub fn respond(
    session: &Session,
    request: &Object<'_>,
    error: Option<&str>,
) -> Result<(), TransportError> {
    let mut builder = response_builder(session.wire(), request, error);
    builder.end_object();
    session.wire().send(builder)
}
