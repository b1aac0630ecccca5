//! Process-wide session state bundled into one context object.
//!
//! One `Session` covers one end-to-end lifetime of the protocol engine,
//! from transport establishment to the terminated event or a fatal error.
//! It is shared between the protocol loop and the output-redirection
//! workers, so the mutable pieces carry their own synchronisation.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use camino::Utf8PathBuf;

use crate::backend::DebugBackend;
use crate::framing::Wire;

/// The launched target, as reported back by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchedProgram {
    /// Absolute path of the target program.
    pub path: Utf8PathBuf,
    /// System process id of the target.
    pub pid: u32,
}

/// One protocol session: the shared wire, the terminated flag, the launched
/// target, and the backend handle.
pub struct Session {
    wire: Arc<Wire>,
    terminated: AtomicBool,
    launched: Mutex<Option<LaunchedProgram>>,
    backend: Mutex<Box<dyn DebugBackend>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Session")
            .field("terminated", &self.is_terminated())
            .field("launched", &self.launched())
            .finish()
    }
}

impl Session {
    /// Builds a session over an established wire.
    pub fn new(wire: Arc<Wire>, backend: Box<dyn DebugBackend>) -> Self {
        Self {
            wire,
            terminated: AtomicBool::new(false),
            launched: Mutex::new(None),
            backend: Mutex::new(backend),
        }
    }

    /// The shared outbound wire.
    pub fn wire(&self) -> &Wire {
        &self.wire
    }

    /// True once the terminated event has been sent.
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    /// Claims the right to send the terminated event; exactly one caller
    /// observes `true` even when several code paths race to send it.
    pub(crate) fn mark_terminated(&self) -> bool {
        !self.terminated.swap(true, Ordering::SeqCst)
    }

    /// The launched target, when a launch has succeeded.
    pub fn launched(&self) -> Option<LaunchedProgram> {
        recover(self.launched.lock()).clone()
    }

    pub(crate) fn record_launch(&self, launched: LaunchedProgram) {
        *recover(self.launched.lock()) = Some(launched);
    }

    /// Runs `operation` with exclusive access to the backend.
    pub fn with_backend<T>(&self, operation: impl FnOnce(&mut dyn DebugBackend) -> T) -> T {
        let mut backend = recover(self.backend.lock());
        operation(&mut **backend)
    }
}

/// A poisoned lock still guards consistent data here: every critical
/// section is a single assignment or read.
fn recover<'mutex, T>(
    result: Result<MutexGuard<'mutex, T>, PoisonError<MutexGuard<'mutex, T>>>,
) -> MutexGuard<'mutex, T> {
    match result {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
