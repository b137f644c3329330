//! Process invocation.
//!
//! [`ProcessRunner`] is the seam between the stage chain and the operating
//! system. [`SystemRunner`] spawns real processes; tests substitute runners
//! that fabricate outputs or failures.

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Shared flag used to cancel an in-flight alignment.
///
/// Cancelling kills the running stage's process. The aligner then returns
/// [`crate::AlignError::Cancelled`] and its scratch directory is removed.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything needed to run one external tool.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    pub program: &'a Path,
    pub args: &'a [String],
    pub cwd: &'a Path,
    pub timeout: Duration,
    pub capture_output: bool,
    pub cancel: &'a CancelToken,
}

/// Outcome of a process that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` when terminated by a signal.
    pub exit_code: Option<i32>,
    pub success: bool,
    /// Captured stderr (empty when capture is disabled).
    pub stderr: String,
}

impl ProcessOutput {
    /// A successful run with no output.
    pub fn ok() -> Self {
        Self {
            exit_code: Some(0),
            success: true,
            stderr: String::new(),
        }
    }

    /// A failed run with the given code and stderr.
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            success: false,
            stderr: stderr.into(),
        }
    }

    fn from_status(status: ExitStatus, stderr: String) -> Self {
        Self {
            exit_code: status.code(),
            success: status.success(),
            stderr,
        }
    }
}

/// Why a process did not run to completion.
#[derive(Debug, Error)]
pub enum RunFailure {
    #[error("failed to spawn process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed waiting for process: {0}")]
    Wait(#[source] std::io::Error),

    #[error("process timed out after {} seconds", .0.as_secs())]
    TimedOut(Duration),

    #[error("process cancelled")]
    Cancelled,
}

/// Runs external tools.
pub trait ProcessRunner: Send + Sync {
    fn run(&self, invocation: &Invocation<'_>) -> Result<ProcessOutput, RunFailure>;
}

impl<R: ProcessRunner + ?Sized> ProcessRunner for &R {
    fn run(&self, invocation: &Invocation<'_>) -> Result<ProcessOutput, RunFailure> {
        (**self).run(invocation)
    }
}

/// Spawns real processes with `std::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, invocation: &Invocation<'_>) -> Result<ProcessOutput, RunFailure> {
        let mut cmd = Command::new(invocation.program);
        cmd.args(invocation.args)
            .current_dir(invocation.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::null());

        if invocation.capture_output {
            cmd.stderr(Stdio::piped());
        } else {
            cmd.stderr(Stdio::null());
        }

        let child = cmd.spawn().map_err(RunFailure::Spawn)?;
        let (status, stderr) = wait_with_timeout(
            child,
            invocation.timeout,
            invocation.capture_output,
            invocation.cancel,
        )?;
        Ok(ProcessOutput::from_status(status, stderr))
    }
}

/// Waits for `child`, killing it on timeout or cancellation.
///
/// Captured stderr is drained on a helper thread while the child runs, so a
/// tool that fills the pipe buffer cannot stall until the timeout.
pub fn wait_with_timeout(
    mut child: Child,
    timeout: Duration,
    capture_output: bool,
    cancel: &CancelToken,
) -> Result<(ExitStatus, String), RunFailure> {
    let start = Instant::now();

    let reader = if capture_output {
        child.stderr.take().map(|mut err| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = err.read_to_end(&mut buf);
                buf
            })
        })
    } else {
        None
    };

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if cancel.is_cancelled() {
                    stop(&mut child, reader);
                    return Err(RunFailure::Cancelled);
                }
                if start.elapsed() > timeout {
                    stop(&mut child, reader);
                    return Err(RunFailure::TimedOut(timeout));
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                stop(&mut child, reader);
                return Err(RunFailure::Wait(e));
            }
        }
    };

    let stderr = reader
        .and_then(|handle| handle.join().ok())
        .map(|buf| String::from_utf8_lossy(&buf).into_owned())
        .unwrap_or_default();

    Ok((status, stderr))
}

/// Kills the child. The stderr reader is detached rather than joined: a
/// grandchild that inherited the pipe can keep it open after the kill.
fn stop(child: &mut Child, reader: Option<JoinHandle<Vec<u8>>>) {
    let _ = child.kill();
    let _ = child.wait();
    drop(reader);
}
