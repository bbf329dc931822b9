//! Process handle owning one spawned backend process
//!
//! Presents the backend's stdin/stdout as the same message-oriented
//! contract the socket handle exposes: ordered messages in and out, exit
//! surfaced as a close event, spawn failure reported synchronously, and an
//! idempotent dispose operation. Messages are newline-delimited on the
//! wire; payloads are not inspected.

use futures_util::StreamExt;
use std::process::{ExitStatus, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tracing::{debug, warn};

use crate::constants::process::MAX_LINE_LENGTH;
use crate::routes::RouteEntry;
use crate::session_error::{Leg, SessionError};

/// Something observed on the read side of the backend process
#[derive(Debug)]
pub enum ProcessEvent {
    /// One message (stdout line, newline stripped), in arrival order
    Message(String),
    /// The process exited; status is `None` when it was already reaped
    Exited(Option<ExitStatus>),
}

/// One spawned backend process, exclusively owned by its session
#[derive(Debug)]
pub struct ProcessHandle {
    writer: ProcessWriter,
    reader: ProcessReader,
}

impl ProcessHandle {
    /// Spawn the backend described by a route entry
    ///
    /// # Errors
    ///
    /// Reports spawn failure (executable not found, permission denied)
    /// synchronously as `SpawnFailed`; the caller must then refuse to
    /// create a session.
    pub fn spawn(entry: &RouteEntry) -> Result<Self, SessionError> {
        let spawn_failed = |source: std::io::Error| SessionError::SpawnFailed {
            command: entry.command().to_string(),
            source,
        };

        let mut child = Command::new(entry.command())
            .args(entry.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_failed)?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| spawn_failed(std::io::Error::other("failed to capture stdin")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_failed(std::io::Error::other("failed to capture stdout")))?;

        debug!(
            "Spawned backend '{}' (pid {:?})",
            entry.command(),
            child.id()
        );

        let command = entry.command().to_string();
        Ok(Self {
            writer: ProcessWriter {
                stdin: Some(stdin),
                command: command.clone(),
            },
            reader: ProcessReader {
                child: Some(child),
                stdout: FramedRead::new(
                    stdout,
                    LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
                ),
                stdout_done: false,
                command,
            },
        })
    }

    /// The backend executable this handle runs
    #[must_use]
    pub fn command(&self) -> &str {
        &self.reader.command
    }

    /// OS process id, while the process is owned and not yet disposed
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.reader.child.as_ref().and_then(Child::id)
    }

    /// Split into independent writer and reader halves
    #[must_use]
    pub fn split(self) -> (ProcessWriter, ProcessReader) {
        (self.writer, self.reader)
    }

    /// Terminate the process and release its streams
    ///
    /// Safe to call multiple times and safe after the process already
    /// exited.
    pub async fn dispose(&mut self) {
        self.writer.shutdown().await;
        self.reader.dispose().await;
    }
}

/// Write half: the backend's stdin
#[derive(Debug)]
pub struct ProcessWriter {
    stdin: Option<ChildStdin>,
    command: String,
}

impl ProcessWriter {
    /// Forward one message to the backend: payload bytes plus a trailing
    /// newline
    ///
    /// Fails with a `ConnectionClosed`-class error once the stream has
    /// been released; a broken pipe from an exited backend surfaces as a
    /// normal-close I/O error.
    pub async fn send(&mut self, text: &str) -> Result<(), SessionError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or(SessionError::ConnectionClosed { leg: Leg::Process })?;
        stdin.write_all(text.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Flush and close the backend's stdin, letting a well-behaved
    /// backend see EOF and exit on its own
    pub async fn shutdown(&mut self) {
        if let Some(mut stdin) = self.stdin.take() {
            if let Err(e) = stdin.shutdown().await {
                debug!("Failed to close stdin of '{}': {}", self.command, e);
            }
        }
    }
}

/// Read half: the backend's stdout plus the process itself
#[derive(Debug)]
pub struct ProcessReader {
    child: Option<Child>,
    stdout: FramedRead<ChildStdout, LinesCodec>,
    stdout_done: bool,
    command: String,
}

impl ProcessReader {
    /// Wait for the next event from the backend: a message line or exit
    ///
    /// After stdout reaches EOF this keeps waiting for the exit status so
    /// the reaped status can be reported. Once disposed, resolves
    /// immediately to `Exited(None)`.
    pub async fn next_event(&mut self) -> Result<ProcessEvent, SessionError> {
        loop {
            let Some(child) = self.child.as_mut() else {
                return Ok(ProcessEvent::Exited(None));
            };

            // Biased so buffered stdout lines drain before the exit of a
            // short-lived backend is reported.
            tokio::select! {
                biased;

                line = self.stdout.next(), if !self.stdout_done => match line {
                    Some(Ok(text)) => return Ok(ProcessEvent::Message(text)),
                    Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                        return Err(SessionError::Transport {
                            leg: Leg::Process,
                            detail: format!(
                                "backend line exceeds maximum length of {} bytes",
                                MAX_LINE_LENGTH
                            ),
                        });
                    }
                    Some(Err(LinesCodecError::Io(e))) => return Err(SessionError::IoError(e)),
                    // stdout closed; keep waiting for the exit status
                    None => self.stdout_done = true,
                },
                status = child.wait() => {
                    return Ok(ProcessEvent::Exited(Some(status?)));
                }
            }
        }
    }

    /// Terminate the process if still running and reap it
    ///
    /// Single-shot: the child is taken out of the handle on first call,
    /// so later calls are no-ops. Safe when the process already exited.
    pub async fn dispose(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        match child.try_wait() {
            Ok(Some(status)) => {
                debug!("Backend '{}' already exited: {}", self.command, status);
            }
            _ => {
                if let Err(e) = child.start_kill() {
                    debug!("Failed to signal backend '{}': {}", self.command, e);
                }
                match child.wait().await {
                    Ok(status) => debug!("Backend '{}' terminated: {}", self.command, status),
                    Err(e) => warn!("Failed to reap backend '{}': {}", self.command, e),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(spec: &[&str]) -> RouteEntry {
        let spec: Vec<String> = spec.iter().map(|s| s.to_string()).collect();
        RouteEntry::from_spec("test", &spec).unwrap()
    }

    #[tokio::test]
    async fn test_spawn_missing_executable_fails() {
        let err = ProcessHandle::spawn(&entry(&["definitely-not-a-real-executable-7f3a"]))
            .unwrap_err();
        assert!(err.is_spawn_failure());
        assert!(err.to_string().contains("definitely-not-a-real-executable"));
    }

    #[tokio::test]
    async fn test_echo_roundtrip() {
        let handle = ProcessHandle::spawn(&entry(&["cat"])).unwrap();
        let (mut writer, mut reader) = handle.split();

        writer.send("hello backend").await.unwrap();
        match reader.next_event().await.unwrap() {
            ProcessEvent::Message(text) => assert_eq!(text, "hello backend"),
            other => panic!("expected echoed message, got {:?}", other),
        }

        writer.shutdown().await;
        reader.dispose().await;
    }

    #[tokio::test]
    async fn test_message_order_preserved() {
        let handle = ProcessHandle::spawn(&entry(&["cat"])).unwrap();
        let (mut writer, mut reader) = handle.split();

        for i in 0..10 {
            writer.send(&format!("message {}", i)).await.unwrap();
        }
        for i in 0..10 {
            match reader.next_event().await.unwrap() {
                ProcessEvent::Message(text) => assert_eq!(text, format!("message {}", i)),
                other => panic!("expected message {}, got {:?}", i, other),
            }
        }

        writer.shutdown().await;
        reader.dispose().await;
    }

    #[tokio::test]
    async fn test_exit_surfaces_as_close_event() {
        let handle = ProcessHandle::spawn(&entry(&["sh", "-c", "exit 7"])).unwrap();
        let (_writer, mut reader) = handle.split();

        match reader.next_event().await.unwrap() {
            ProcessEvent::Exited(Some(status)) => assert_eq!(status.code(), Some(7)),
            other => panic!("expected exit event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stdin_eof_lets_backend_exit() {
        let handle = ProcessHandle::spawn(&entry(&["cat"])).unwrap();
        let (mut writer, mut reader) = handle.split();

        writer.shutdown().await;
        match reader.next_event().await.unwrap() {
            ProcessEvent::Exited(Some(status)) => assert!(status.success()),
            other => panic!("expected clean exit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent() {
        let mut handle = ProcessHandle::spawn(&entry(&["cat"])).unwrap();
        assert!(handle.pid().is_some());

        handle.dispose().await;
        handle.dispose().await;
        assert!(handle.pid().is_none());
    }

    #[tokio::test]
    async fn test_dispose_after_exit_is_safe() {
        let handle = ProcessHandle::spawn(&entry(&["sh", "-c", "exit 0"])).unwrap();
        let (_writer, mut reader) = handle.split();

        match reader.next_event().await.unwrap() {
            ProcessEvent::Exited(_) => {}
            other => panic!("expected exit event, got {:?}", other),
        }
        reader.dispose().await;
        reader.dispose().await;
    }

    #[tokio::test]
    async fn test_send_after_shutdown_fails_cleanly() {
        let handle = ProcessHandle::spawn(&entry(&["cat"])).unwrap();
        let (mut writer, mut reader) = handle.split();

        writer.shutdown().await;
        let err = writer.send("too late").await.unwrap_err();
        assert!(err.is_normal_close());

        reader.dispose().await;
    }

    #[tokio::test]
    async fn test_next_event_after_dispose_reports_exited() {
        let handle = ProcessHandle::spawn(&entry(&["cat"])).unwrap();
        let (_writer, mut reader) = handle.split();

        reader.dispose().await;
        match reader.next_event().await.unwrap() {
            ProcessEvent::Exited(None) => {}
            other => panic!("expected exited-none after dispose, got {:?}", other),
        }
    }
}
