//! Agent process transport.
//!
//! Owns one droid agent child process and its stdio: flushing line writes to
//! stdin, deadline-bounded line reads from stdout, and a graceful-then-forced
//! stop.  Exactly one [`ProcessTransport`] owns a given child; two transports
//! share no state.
//!
//! Every child is spawned with `kill_on_drop(true)`, so a transport dropped
//! on an error path (a failed initialise, a panic mid-scenario) still tears
//! its process down.  [`ProcessTransport::stop`] is the orderly counterpart:
//! close stdin, request graceful termination, wait out a grace window, then
//! force-kill.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio_util::codec::FramedRead;
use tracing::{debug, warn};

use crate::rpc::codec::LineCodec;
use crate::{AppError, Result};

// ── Launch configuration ──────────────────────────────────────────────────────

/// Explicit launch configuration for one agent process.
///
/// The environment overlay is applied on top of the probe's own environment;
/// the harness never mutates process-global environment state.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Agent executable.
    pub program: PathBuf,
    /// Arguments selecting streaming JSON-RPC stdio mode, model, etc.
    pub args: Vec<String>,
    /// Environment overlay, e.g. the credential variable.
    pub env: Vec<(String, String)>,
    /// Working directory for the child.
    pub cwd: PathBuf,
}

// ── Transport ─────────────────────────────────────────────────────────────────

/// Active stdio transport to one agent process.
#[derive(Debug)]
pub struct ProcessTransport {
    child: Child,
    /// `None` once [`ProcessTransport::stop`] has closed the pipe.
    stdin: Option<ChildStdin>,
    stdout: FramedRead<ChildStdout, LineCodec>,
    stopped: bool,
}

impl ProcessTransport {
    /// Launch the agent process described by `spec`.
    ///
    /// Stdin and stdout are piped for the NDJSON conversation; stderr is
    /// discarded so an unread pipe can never stall the child.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Launch`] if the executable cannot be started or
    /// its stdio handles cannot be captured.
    pub async fn launch(spec: &LaunchSpec) -> Result<Self> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }
        cmd.current_dir(&spec.cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|err| {
            AppError::Launch(format!(
                "failed to start {}: {err}",
                spec.program.display()
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AppError::Launch("failed to capture agent stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::Launch("failed to capture agent stdout".into()))?;

        debug!(pid = child.id(), program = %spec.program.display(), "agent process launched");

        Ok(Self {
            child,
            stdin: Some(stdin),
            stdout: FramedRead::new(stdout, LineCodec::new()),
            stopped: false,
        })
    }

    /// OS process identifier, while the child is still running.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Whether the child has already exited.
    pub fn has_exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }

    /// Write `text` followed by a newline to the agent's stdin and flush.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::TransportClosed`] if stdin was already closed by
    /// [`ProcessTransport::stop`] or the write fails because the process
    /// exited.
    pub async fn write_line(&mut self, text: &str) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| AppError::TransportClosed("stdin already closed".into()))?;

        let mut bytes = Vec::with_capacity(text.len() + 1);
        bytes.extend_from_slice(text.as_bytes());
        bytes.push(b'\n');

        stdin
            .write_all(&bytes)
            .await
            .map_err(|e| AppError::TransportClosed(format!("write failed: {e}")))?;
        stdin
            .flush()
            .await
            .map_err(|e| AppError::TransportClosed(format!("flush failed: {e}")))
    }

    /// Return the next complete line within `timeout`.
    ///
    /// `Ok(None)` means the deadline elapsed, the stream hit EOF with nothing
    /// buffered, or an over-long line was skipped — none of which is an
    /// error.  Never blocks past `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] on an underlying stream failure.
    pub async fn read_line(&mut self, timeout: Duration) -> Result<Option<String>> {
        match tokio::time::timeout(timeout, self.stdout.next()).await {
            // Deadline elapsed with no complete line.
            Err(_elapsed) => Ok(None),
            // EOF — stdout closed.
            Ok(None) => Ok(None),
            Ok(Some(Ok(line))) => Ok(Some(line)),
            Ok(Some(Err(AppError::Codec(msg)))) => {
                warn!(error = msg.as_str(), "transport: skipping over-long line");
                Ok(None)
            }
            Ok(Some(Err(e))) => Err(e),
        }
    }

    /// Stop the agent process: close stdin, terminate gracefully, wait up to
    /// `grace`, force-kill if still alive.
    ///
    /// Idempotent and infallible — safe to call on every exit path, after the
    /// process has already exited, and repeatedly on the same transport.
    pub async fn stop(&mut self, grace: Duration) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        // Dropping stdin closes the pipe; a well-behaved agent exits on EOF.
        drop(self.stdin.take());

        if let Ok(Some(status)) = self.child.try_wait() {
            debug!(%status, "transport: agent already exited before stop");
            return;
        }

        self.terminate_gracefully();

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                debug!(%status, "transport: agent exited within grace window");
            }
            Ok(Err(err)) => {
                warn!(%err, "transport: error waiting for agent exit");
            }
            Err(_elapsed) => {
                warn!(?grace, "transport: grace window elapsed, force-killing agent");
                if let Err(err) = self.child.start_kill() {
                    warn!(%err, "transport: force-kill failed");
                }
                if let Err(err) = self.child.wait().await {
                    warn!(%err, "transport: error reaping agent after kill");
                }
            }
        }
    }

    /// Request graceful termination: SIGTERM on unix, hard kill elsewhere.
    #[cfg(unix)]
    fn terminate_gracefully(&mut self) {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.child.id().and_then(|id| i32::try_from(id).ok()) else {
            return;
        };
        if let Err(err) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
            debug!(%err, pid, "transport: SIGTERM delivery failed");
        }
    }

    /// Request graceful termination: SIGTERM on unix, hard kill elsewhere.
    #[cfg(not(unix))]
    fn terminate_gracefully(&mut self) {
        if let Err(err) = self.child.start_kill() {
            debug!(%err, "transport: kill request failed");
        }
    }
}
