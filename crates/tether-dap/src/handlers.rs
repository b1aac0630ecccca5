//! Handlers for the supported requests.
//!
//! Handlers are pure with respect to the protocol engine: their side effects
//! live behind the [`DebugBackend`](crate::backend::DebugBackend) seam.
//! Validation failures are answered with a failed response and never end
//! the session; only wire failures propagate.

use camino::{Utf8Path, Utf8PathBuf};
use tracing::warn;

use crate::backend::{LaunchParameters, SourceBreakpoint};
use crate::errors::TransportError;
use crate::events;
use crate::json::{Object, Value};
use crate::session::{LaunchedProgram, Session};

const HANDLER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::handlers");

/// Fixed capability table returned from `initialize`. This minimal engine
/// declares every optional feature unsupported.
const CAPABILITIES: &[&str] = &[
    "supportsConfigurationDoneRequest",
    "supportsFunctionBreakpoints",
    "supportsConditionalBreakpoints",
    "supportsHitConditionalBreakpoints",
    "supportsEvaluateForHovers",
    "supportsRunInTerminalRequest",
    "supportsStepBack",
    "supportsSetVariable",
    "supportsRestartFrame",
    "supportsGotoTargetsRequest",
    "supportsStepInTargetsRequest",
    "supportsCompletionsRequest",
    "supportsModulesRequest",
    "supportsRestartRequest",
    "supportsExceptionOptions",
    "supportsValueFormattingOptions",
    "supportsExceptionInfoRequest",
    "supportTerminateDebuggee",
    "supportsDelayedStackTraceLoading",
    "supportsLoadedSourcesRequest",
    "supportsProgressReporting",
];

pub(crate) fn initialize(session: &Session, request: &Object<'_>) -> Result<(), TransportError> {
    let mut builder = events::response_builder(session.wire(), request, None);
    builder.field("body");
    builder.begin_object();
    for capability in CAPABILITIES {
        builder.bool_field(capability, false);
    }
    builder.end_object();
    builder.end_object();
    session.wire().send(builder)
}

pub(crate) fn launch(session: &Session, request: &Object<'_>) -> Result<(), TransportError> {
    let arguments = request.object_field("arguments");
    match launch_program(session, arguments) {
        Ok(()) => {
            events::respond(session, request, None)?;
            events::send_process_launched(session)?;
        }
        Err(message) => {
            warn!(target: HANDLER_TARGET, error = %message, "launch request rejected");
            events::respond(session, request, Some(&message))?;
        }
    }
    // The client expects initialized regardless of the launch outcome.
    events::send_simple_event(session, "initialized")
}

fn launch_program(session: &Session, arguments: Option<&Object<'_>>) -> Result<(), String> {
    if let Some(cwd) = arguments.and_then(|object| object.str_field("cwd")) {
        std::env::set_current_dir(cwd).map_err(|error| error.to_string())?;
    }
    let stop_on_entry = arguments.is_some_and(|object| object.bool_field("stopOnEntry", false));

    let Some(program) = arguments.and_then(|object| object.str_field("program")) else {
        return Err("no program specified".to_owned());
    };
    let args = string_array(arguments, "args")?;
    let env = string_array(arguments, "env")?;

    let path = absolute_program_path(program)?;
    let parameters = LaunchParameters {
        program: path.clone(),
        cwd: arguments
            .and_then(|object| object.str_field("cwd"))
            .map(Utf8PathBuf::from),
        stop_on_entry,
        args,
        env,
    };
    let pid = session
        .with_backend(|backend| backend.launch(&parameters))
        .map_err(|error| error.to_string())?;
    session.record_launch(LaunchedProgram { path, pid });
    Ok(())
}

fn absolute_program_path(program: &str) -> Result<Utf8PathBuf, String> {
    let canonical =
        std::fs::canonicalize(program).map_err(|error| format!("{program}: {error}"))?;
    Utf8PathBuf::from_path_buf(canonical)
        .map_err(|path| format!("{}: path is not valid UTF-8", path.display()))
}

/// Collects an optional array-of-strings argument. A missing or
/// wrongly-typed field yields an empty list; an array with a non-string
/// element is a validation error naming the field.
fn string_array(arguments: Option<&Object<'_>>, name: &str) -> Result<Vec<String>, String> {
    let Some(values) = arguments.and_then(|object| object.array_field(name)) else {
        return Ok(Vec::new());
    };
    values
        .iter()
        .map(|value| match value {
            Value::Str(text) => Ok((*text).to_owned()),
            _ => Err(format!("{name}: array of strings expected")),
        })
        .collect()
}

pub(crate) fn set_breakpoints(
    session: &Session,
    request: &Object<'_>,
) -> Result<(), TransportError> {
    let arguments = request.object_field("arguments");
    let path = arguments
        .and_then(|object| object.object_field("source"))
        .and_then(|source| source.str_field("path"));
    let supplied = arguments
        .and_then(|object| object.array_field("breakpoints"))
        .unwrap_or_default();

    let mut accepted = Vec::new();
    if let Some(path) = path {
        accepted = validate_breakpoints(supplied);
        let sync = session
            .with_backend(|backend| backend.set_breakpoints(Utf8Path::new(path), &accepted));
        if let Err(error) = sync {
            warn!(target: HANDLER_TARGET, path, error = %error, "breakpoint sync rejected");
            return events::respond(session, request, Some(&error.to_string()));
        }
    }

    let mut builder = events::response_builder(session.wire(), request, None);
    if path.is_some() {
        builder.field("body");
        builder.begin_object();
        builder.field("breakpoints");
        builder.begin_array();
        for breakpoint in &accepted {
            builder.element();
            builder.begin_object();
            builder.unsigned_field("line", u64::from(breakpoint.line));
            if breakpoint.column != 0 {
                builder.unsigned_field("column", u64::from(breakpoint.column));
            }
            builder.end_object();
        }
        builder.end_array();
        builder.end_object();
    }
    builder.end_object();
    session.wire().send(builder)
}

/// Keeps breakpoints with a positive line and a non-negative column, in
/// input order. Invalid entries are dropped, not reported.
fn validate_breakpoints(values: &[Value<'_>]) -> Vec<SourceBreakpoint> {
    let mut accepted = Vec::new();
    for value in values {
        let Value::Object(entry) = value else {
            continue;
        };
        let line = entry.int_field("line", 0);
        let column = entry.int_field("column", 0);
        if line <= 0 || column < 0 {
            continue;
        }
        let (Ok(line), Ok(column)) = (u32::try_from(line), u32::try_from(column)) else {
            continue;
        };
        accepted.push(SourceBreakpoint { line, column });
    }
    accepted
}
