//! Request envelope validation and the per-session state machine.
//!
//! The loop runs AwaitPacket → Parse → Validate → Dispatch → Respond until
//! the terminated event has been sent, the client closes the connection, or
//! a fatal error occurs. An unknown command with an intact envelope is
//! answered with a failed response and the session continues; an envelope
//! that cannot be correlated (bad JSON, wrong `type`, missing `command`)
//! ends the session.

use std::io::Read;

use tracing::{debug, info, warn};

use crate::errors::{FrameError, ProtocolError, SessionError, TransportError};
use crate::events;
use crate::framing::PacketReader;
use crate::handlers;
use crate::json::{self, Object, Value};
use crate::session::Session;

const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

type Handler = fn(&Session, &Object<'_>) -> Result<(), TransportError>;

/// Fixed command table; a linear scan is fine, the table is small and
/// static.
const COMMANDS: &[(&str, Handler)] = &[
    ("initialize", handlers::initialize),
    ("launch", handlers::launch),
    ("setBreakpoints", handlers::set_breakpoints),
];

/// Parses and dispatches one received packet.
///
/// # Errors
///
/// Returns [`SessionError`] for malformed JSON, envelope violations that
/// cannot be answered, and wire failures; all are fatal to the session.
pub fn dispatch_packet(session: &Session, payload: &mut [u8]) -> Result<(), SessionError> {
    let value = json::parse(payload)?;
    let Value::Object(request) = value else {
        return Err(ProtocolError::NotAnObject.into());
    };
    if request.str_field("type") != Some("request") {
        return Err(ProtocolError::WrongType.into());
    }
    let Some(command) = request.str_field("command") else {
        return Err(ProtocolError::MissingCommand.into());
    };

    for (name, handler) in COMMANDS {
        if *name == command {
            debug!(target: DISPATCH_TARGET, command, "dispatching request");
            return handler(session, &request).map_err(SessionError::from);
        }
    }

    // Unknown but well-formed: answer on the wire and keep serving.
    warn!(target: DISPATCH_TARGET, command, "unsupported command");
    let message = format!("unsupported command '{command}'");
    events::respond(session, &request, Some(&message)).map_err(SessionError::from)
}

/// Runs the protocol loop until the terminated event, end of stream, or a
/// fatal error.
///
/// # Errors
///
/// Returns [`SessionError`] for any fatal condition; a clean end of stream
/// between packets is a normal return.
pub fn run<R: Read>(session: &Session, packets: &mut PacketReader<R>) -> Result<(), SessionError> {
    while !session.is_terminated() {
        let mut payload = match packets.read_packet() {
            Ok(payload) => payload,
            Err(FrameError::Transport(TransportError::Eof)) => {
                info!(target: DISPATCH_TARGET, "client closed the connection");
                return Ok(());
            }
            Err(error) => return Err(error.into()),
        };
        dispatch_packet(session, &mut payload)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use rstest::rstest;

    use crate::tests::support::{frame, json_packets, memory_session};

    use super::*;

    fn dispatch(payload: &str) -> (Result<(), SessionError>, Vec<serde_json::Value>) {
        let (session, sink) = memory_session();
        let mut buffer = payload.as_bytes().to_vec();
        let outcome = dispatch_packet(&session, &mut buffer);
        (outcome, json_packets(&sink))
    }

    #[test]
    fn initialize_request_yields_a_successful_response() {
        let (outcome, packets) =
            dispatch(r#"{"seq": 1, "type": "request", "command": "initialize", "arguments": {"adapterID": "x"}}"#);
        outcome.expect("dispatch initialize");
        assert_eq!(packets[0]["type"], "response");
        assert_eq!(packets[0]["command"], "initialize");
        assert_eq!(packets[0]["request_seq"], 1);
        assert_eq!(packets[0]["success"], true);
        let body = packets[0]["body"].as_object().expect("capability body");
        assert!(body.values().all(serde_json::Value::is_boolean));
    }

    #[test]
    fn unknown_commands_get_an_error_response_and_the_session_continues() {
        let (outcome, packets) =
            dispatch(r#"{"seq": 4, "type": "request", "command": "stackTrace"}"#);
        outcome.expect("unknown command is not fatal");
        assert_eq!(packets[0]["success"], false);
        assert_eq!(packets[0]["message"], "unsupported command 'stackTrace'");
    }

    #[rstest]
    #[case::not_an_object(r#"[1, 2, 3]"#)]
    #[case::wrong_type(r#"{"seq": 1, "type": "event", "command": "initialize"}"#)]
    #[case::missing_type(r#"{"seq": 1, "command": "initialize"}"#)]
    #[case::missing_command(r#"{"seq": 1, "type": "request"}"#)]
    #[case::command_not_a_string(r#"{"seq": 1, "type": "request", "command": 7}"#)]
    fn rejects_envelopes_that_cannot_be_answered(#[case] payload: &str) {
        let (outcome, packets) = dispatch(payload);
        assert!(matches!(outcome, Err(SessionError::Protocol(_))));
        assert!(packets.is_empty(), "no response for {payload}");
    }

    #[test]
    fn malformed_json_is_fatal() {
        let (outcome, packets) = dispatch("{\"seq\": 1,");
        assert!(matches!(outcome, Err(SessionError::Syntax(_))));
        assert!(packets.is_empty());
    }

    #[test]
    fn run_serves_packets_until_end_of_stream() {
        let (session, sink) = memory_session();
        let mut stream = Vec::new();
        stream.extend_from_slice(&frame(
            r#"{"seq": 1, "type": "request", "command": "initialize"}"#,
        ));
        stream.extend_from_slice(&frame(
            r#"{"seq": 2, "type": "request", "command": "restart"}"#,
        ));
        let mut packets = PacketReader::new(Cursor::new(stream), None);

        run(&session, &mut packets).expect("run to end of stream");

        let replies = json_packets(&sink);
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["command"], "initialize");
        assert_eq!(replies[1]["success"], false);
    }

    #[test]
    fn run_stops_after_the_terminated_event() {
        let (session, sink) = memory_session();
        events::send_terminated(&session).expect("send terminated");

        let mut stream = Vec::new();
        stream.extend_from_slice(&frame(
            r#"{"seq": 1, "type": "request", "command": "initialize"}"#,
        ));
        let mut packets = PacketReader::new(Cursor::new(stream), None);

        run(&session, &mut packets).expect("run");

        // Only the terminated event went out; the queued request was never
        // dispatched.
        let replies = json_packets(&sink);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0]["event"], "terminated");
    }

    #[test]
    fn run_reports_framing_garbage_as_fatal() {
        let (session, _sink) = memory_session();
        let mut packets =
            PacketReader::new(Cursor::new(b"garbage where a header belongs\r\n".to_vec()), None);
        let outcome = run(&session, &mut packets);
        assert!(matches!(outcome, Err(SessionError::Frame(_))));
    }
}
