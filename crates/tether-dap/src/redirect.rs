//! Output capture: forwards a redirected descriptor as `output` events.
//!
//! A pipe replaces the target descriptor, and one worker per redirected
//! stream blocks on the pipe's read end, emitting an `output` event for
//! every non-empty chunk. There is no backpressure: a slow consumer cannot
//! pause the worker. Shutdown restores the saved original descriptor, which
//! closes the pipe's last write end and wakes the worker with end-of-file.

use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use nix::unistd;
use thiserror::Error;
use tracing::{debug, warn};

use crate::events::{self, OutputCategory};
use crate::session::Session;

const REDIRECT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::redirect");
const CHUNK_SIZE: usize = 4096;

/// Errors raised while installing an output redirection.
#[derive(Debug, Error)]
pub enum RedirectError {
    /// The capture pipe could not be created.
    #[error("failed to create a capture pipe: {0}")]
    CreatePipe(#[source] nix::Error),

    /// The original descriptor could not be saved.
    #[error("failed to duplicate fd {fd}: {source}")]
    SaveOriginal {
        /// Descriptor being redirected.
        fd: RawFd,
        /// Underlying OS error.
        #[source]
        source: nix::Error,
    },

    /// The descriptor could not be pointed at the pipe.
    #[error("failed to override fd {fd}: {source}")]
    Override {
        /// Descriptor being redirected.
        fd: RawFd,
        /// Underlying OS error.
        #[source]
        source: nix::Error,
    },
}

/// Controls one redirection worker.
///
/// Dropping the handle requests shutdown; call [`RedirectHandle::join`] to
/// also wait for the worker to drain and exit.
#[derive(Debug)]
pub struct RedirectHandle {
    stop: Arc<AtomicBool>,
    target: RawFd,
    saved: Option<RawFd>,
    worker: Option<JoinHandle<()>>,
}

/// Replaces `target` with a capture pipe and spawns the forwarding worker.
///
/// The surplus pipe write end is closed immediately, so once the original
/// descriptor is restored the worker's read end reports end-of-file.
///
/// # Errors
///
/// Returns [`RedirectError`] when the pipe or descriptor plumbing fails;
/// the target descriptor is left untouched in that case.
pub fn redirect_fd(
    session: Arc<Session>,
    target: RawFd,
    category: OutputCategory,
) -> Result<RedirectHandle, RedirectError> {
    let (read_end, write_end) = unistd::pipe().map_err(RedirectError::CreatePipe)?;
    let saved = unistd::dup(target).map_err(|source| RedirectError::SaveOriginal {
        fd: target,
        source,
    })?;
    if let Err(source) = unistd::dup2(write_end.as_raw_fd(), target) {
        let _ = unistd::close(saved);
        return Err(RedirectError::Override { fd: target, source });
    }
    drop(write_end);

    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);
    let worker =
        thread::spawn(move || forward_output(&session, &read_end, category, &stop_flag));
    Ok(RedirectHandle {
        stop,
        target,
        saved: Some(saved),
        worker: Some(worker),
    })
}

fn forward_output(
    session: &Session,
    read_end: &OwnedFd,
    category: OutputCategory,
    stop: &AtomicBool,
) {
    let mut buffer = [0_u8; CHUNK_SIZE];
    while !stop.load(Ordering::SeqCst) {
        match unistd::read(read_end.as_raw_fd(), &mut buffer) {
            Ok(0) => break,
            Ok(count) => {
                if let Err(error) = events::send_output(session, category, &buffer[..count]) {
                    warn!(
                        target: REDIRECT_TARGET,
                        error = %error,
                        "dropping captured output; the wire is gone"
                    );
                    break;
                }
            }
            Err(nix::errno::Errno::EINTR) => continue,
            Err(error) => {
                warn!(target: REDIRECT_TARGET, error = %error, "captured stream read failed");
                break;
            }
        }
    }
    debug!(target: REDIRECT_TARGET, category = %category, "output worker stopped");
}

impl RedirectHandle {
    /// Restores the original descriptor and signals the worker to stop.
    pub fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(saved) = self.saved.take() {
            if let Err(error) = unistd::dup2(saved, self.target) {
                warn!(
                    target: REDIRECT_TARGET,
                    fd = self.target,
                    error = %error,
                    "failed to restore the redirected descriptor"
                );
            }
            let _ = unistd::close(saved);
        }
    }

    /// Shuts down and waits for the worker to drain the pipe and exit.
    pub fn join(mut self) {
        self.shutdown();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for RedirectHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Seek, SeekFrom, Write};
    use std::time::{Duration, Instant};

    use crate::tests::support::{json_packets, memory_session};

    use super::*;

    fn wait_for_packet(sink: &crate::tests::support::SharedBuffer) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if !json_packets(sink).is_empty() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn forwards_redirected_writes_as_output_events() {
        let (session, sink) = memory_session();
        let mut scratch = tempfile::tempfile().expect("scratch file");
        let handle = redirect_fd(
            Arc::clone(&session),
            scratch.as_raw_fd(),
            OutputCategory::Stdout,
        )
        .expect("redirect");

        scratch.write_all(b"captured text").expect("write into pipe");
        assert!(wait_for_packet(&sink), "no output event arrived");
        handle.join();

        let packets = json_packets(&sink);
        assert_eq!(packets[0]["event"], "output");
        assert_eq!(packets[0]["body"]["category"], "stdout");
        assert_eq!(packets[0]["body"]["output"], "captured text");
    }

    #[test]
    fn join_restores_the_descriptor_and_stops_the_worker() {
        let (session, sink) = memory_session();
        let mut scratch = tempfile::tempfile().expect("scratch file");
        let handle = redirect_fd(
            Arc::clone(&session),
            scratch.as_raw_fd(),
            OutputCategory::Stderr,
        )
        .expect("redirect");

        scratch.write_all(b"while captured").expect("write into pipe");
        assert!(wait_for_packet(&sink), "no output event arrived");
        handle.join();

        // Writes after join land in the real file again.
        scratch.write_all(b"after restore").expect("write to file");
        scratch.seek(SeekFrom::Start(0)).expect("rewind");
        let mut contents = String::new();
        scratch.read_to_string(&mut contents).expect("read back");
        assert_eq!(contents, "after restore");

        let packets = json_packets(&sink);
        assert_eq!(packets.len(), 1, "worker emitted after shutdown");
    }
}
