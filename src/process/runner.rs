//! Spawning, streaming and terminating external tools

use super::command::ToolCommand;
use crate::error::{Result, ToolError};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Read buffer size for output streams
const READ_CHUNK: usize = 8192;

/// How a tool run ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// The process exited on its own
    Exited {
        /// Exit code, `None` when killed by a signal
        code: Option<i32>,
    },
    /// The run was cancelled and the process group terminated
    Cancelled,
}

impl RunOutcome {
    /// Exit code 0
    pub fn success(&self) -> bool {
        matches!(self, RunOutcome::Exited { code: Some(0) })
    }

    /// Exit code, if the process exited on its own
    pub fn code(&self) -> Option<i32> {
        match self {
            RunOutcome::Exited { code } => *code,
            RunOutcome::Cancelled => None,
        }
    }
}

/// Captured output of a short-lived tool run
#[derive(Clone, Debug)]
pub struct CapturedOutput {
    /// How the run ended
    pub outcome: RunOutcome,
    /// Standard output, lossily decoded
    pub stdout: String,
    /// Standard error, lossily decoded
    pub stderr: String,
}

/// Receives the identity of the process a job currently owns.
pub trait ProcessObserver: Send + Sync {
    /// A process was spawned on behalf of the job
    fn attached(&self, pid: Option<u32>, tool: &str);
    /// The process has exited or been terminated
    fn detached(&self);
}

/// Launches external tools with cancellation-aware supervision.
///
/// Every child runs in its own process group so that cancellation reaches
/// helpers the tool spawns itself (yt-dlp invoking ffmpeg for merging).
#[derive(Clone, Debug)]
pub struct ProcessRunner {
    grace: Duration,
    capture_timeout: Duration,
}

impl ProcessRunner {
    /// Create a runner.
    ///
    /// * `grace` - time between SIGTERM and SIGKILL when terminating
    /// * `capture_timeout` - upper bound for [`capture`](Self::capture) runs
    pub fn new(grace: Duration, capture_timeout: Duration) -> Self {
        Self {
            grace,
            capture_timeout,
        }
    }

    /// Run `command`, handing each stdout/stderr line to `on_line`.
    ///
    /// Lines are split on `\n` and `\r` so carriage-return progress updates
    /// arrive individually. The token is checked before spawning and before
    /// every line.
    pub async fn stream<F>(
        &self,
        command: &ToolCommand,
        cancel: &CancellationToken,
        observer: Option<&dyn ProcessObserver>,
        mut on_line: F,
    ) -> Result<RunOutcome>
    where
        F: FnMut(&str),
    {
        if cancel.is_cancelled() {
            return Ok(RunOutcome::Cancelled);
        }
        let tool = command.tool_name();
        let mut child = spawn(command, Stdio::null(), Stdio::piped(), Stdio::piped())?;
        if let Some(observer) = observer {
            observer.attached(child.id(), &tool);
        }

        let (tx, mut rx) = mpsc::channel::<String>(256);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, tx.clone()));
        }
        drop(tx);

        let outcome = loop {
            if cancel.is_cancelled() {
                self.terminate(&mut child, &tool).await;
                break RunOutcome::Cancelled;
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.terminate(&mut child, &tool).await;
                    break RunOutcome::Cancelled;
                }
                line = rx.recv() => match line {
                    Some(line) => on_line(&line),
                    None => break self.wait(&mut child, &tool, cancel).await?,
                }
            }
        };

        if let Some(observer) = observer {
            observer.detached();
        }
        Ok(outcome)
    }

    /// Run `command` to completion, discarding output.
    pub async fn run(
        &self,
        command: &ToolCommand,
        cancel: &CancellationToken,
        observer: Option<&dyn ProcessObserver>,
    ) -> Result<RunOutcome> {
        if cancel.is_cancelled() {
            return Ok(RunOutcome::Cancelled);
        }
        let tool = command.tool_name();
        let mut child = spawn(command, Stdio::null(), Stdio::null(), Stdio::null())?;
        if let Some(observer) = observer {
            observer.attached(child.id(), &tool);
        }
        let outcome = self.wait(&mut child, &tool, cancel).await;
        if let Some(observer) = observer {
            observer.detached();
        }
        outcome
    }

    /// Run a short-lived command and collect its output.
    ///
    /// Bounded by the runner's capture timeout; the child is killed when the
    /// budget runs out or the token fires.
    pub async fn capture(
        &self,
        command: &ToolCommand,
        cancel: &CancellationToken,
    ) -> Result<CapturedOutput> {
        if cancel.is_cancelled() {
            return Ok(CapturedOutput {
                outcome: RunOutcome::Cancelled,
                stdout: String::new(),
                stderr: String::new(),
            });
        }
        let tool = command.tool_name();
        let child = spawn(command, Stdio::null(), Stdio::piped(), Stdio::piped())?;

        tokio::select! {
            _ = cancel.cancelled() => Ok(CapturedOutput {
                outcome: RunOutcome::Cancelled,
                stdout: String::new(),
                stderr: String::new(),
            }),
            result = tokio::time::timeout(self.capture_timeout, child.wait_with_output()) => {
                let output = result
                    .map_err(|_| ToolError::TimedOut {
                        tool: tool.clone(),
                        seconds: self.capture_timeout.as_secs(),
                    })?
                    .map_err(|e| ToolError::SpawnFailed {
                        tool: tool.clone(),
                        reason: e.to_string(),
                    })?;
                Ok(CapturedOutput {
                    outcome: RunOutcome::Exited { code: output.status.code() },
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                })
            }
        }
    }

    /// Pipe the stdout of `first` into the stdin of `second`.
    ///
    /// The outcome is the exit status of `second`; a failing producer is
    /// reported as a failure of the pair.
    pub async fn pipe(
        &self,
        first: &ToolCommand,
        second: &ToolCommand,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome> {
        if cancel.is_cancelled() {
            return Ok(RunOutcome::Cancelled);
        }
        let first_tool = first.tool_name();
        let second_tool = second.tool_name();

        let mut producer = spawn(first, Stdio::null(), Stdio::piped(), Stdio::null())?;
        let handoff: Stdio = match producer.stdout.take() {
            Some(stdout) => stdout.try_into().map_err(|e: std::io::Error| {
                ToolError::SpawnFailed {
                    tool: first_tool.clone(),
                    reason: e.to_string(),
                }
            })?,
            None => {
                return Err(ToolError::SpawnFailed {
                    tool: first_tool,
                    reason: "stdout not captured".to_string(),
                }
                .into());
            }
        };
        let mut consumer = spawn(second, handoff, Stdio::null(), Stdio::null())?;

        tokio::select! {
            _ = cancel.cancelled() => {
                self.terminate(&mut producer, &first_tool).await;
                self.terminate(&mut consumer, &second_tool).await;
                Ok(RunOutcome::Cancelled)
            }
            result = async {
                let first_status = producer.wait().await;
                let second_status = consumer.wait().await;
                (first_status, second_status)
            } => {
                let (first_status, second_status) = result;
                let first_code = first_status.ok().and_then(|s| s.code());
                let second_code = second_status
                    .map_err(|e| ToolError::SpawnFailed {
                        tool: second_tool.clone(),
                        reason: e.to_string(),
                    })?
                    .code();
                if first_code != Some(0) {
                    warn!(tool = %first_tool, exit_code = ?first_code, "pipe producer failed");
                    return Ok(RunOutcome::Exited { code: first_code });
                }
                Ok(RunOutcome::Exited { code: second_code })
            }
        }
    }

    async fn wait(
        &self,
        child: &mut Child,
        tool: &str,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome> {
        tokio::select! {
            _ = cancel.cancelled() => {
                self.terminate(child, tool).await;
                Ok(RunOutcome::Cancelled)
            }
            status = child.wait() => {
                let status = status.map_err(|e| ToolError::SpawnFailed {
                    tool: tool.to_string(),
                    reason: e.to_string(),
                })?;
                let code = status.code();
                if code != Some(0) {
                    debug!(tool, exit_code = ?code, "process exited unsuccessfully");
                }
                Ok(RunOutcome::Exited { code })
            }
        }
    }

    /// SIGTERM the process group, then SIGKILL after the grace period.
    async fn terminate(&self, child: &mut Child, tool: &str) {
        let pid = child.id();
        debug!(tool, ?pid, "terminating process group");
        signal_group(child, Signal::Terminate);

        if tokio::time::timeout(self.grace, child.wait()).await.is_err() {
            warn!(
                tool,
                ?pid,
                grace_secs = self.grace.as_secs(),
                "process ignored SIGTERM, killing"
            );
            signal_group(child, Signal::Kill);
            if let Err(e) = child.kill().await {
                debug!(tool, error = %e, "kill after grace period failed");
            }
        }
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(120))
    }
}

fn spawn(command: &ToolCommand, stdin: Stdio, stdout: Stdio, stderr: Stdio) -> Result<Child> {
    let mut cmd = command.to_tokio();
    cmd.stdin(stdin).stdout(stdout).stderr(stderr).kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    debug!(command = %command, "spawning");
    cmd.spawn().map_err(|e| {
        ToolError::SpawnFailed {
            tool: command.tool_name(),
            reason: e.to_string(),
        }
        .into()
    })
}

enum Signal {
    Terminate,
    Kill,
}

#[cfg(unix)]
fn signal_group(child: &mut Child, signal: Signal) {
    let Some(pid) = child.id() else {
        return;
    };
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    let sig = match signal {
        Signal::Terminate => libc::SIGTERM,
        Signal::Kill => libc::SIGKILL,
    };
    // SAFETY: killpg only sends a signal; the group id is the child's own pid
    // because it was spawned with process_group(0).
    unsafe {
        libc::killpg(pgid, sig);
    }
}

#[cfg(not(unix))]
fn signal_group(child: &mut Child, _signal: Signal) {
    let _ = child.start_kill();
}

/// Forward a byte stream as lines split on `\n` or `\r`.
async fn forward_lines<R>(mut reader: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut pending: Vec<u8> = Vec::new();
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        let read = match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        for &byte in &chunk[..read] {
            if byte == b'\n' || byte == b'\r' {
                if !pending.is_empty() {
                    let line = String::from_utf8_lossy(&pending).into_owned();
                    pending.clear();
                    if tx.send(line).await.is_err() {
                        return;
                    }
                }
            } else {
                pending.push(byte);
            }
        }
    }
    if !pending.is_empty() {
        let _ = tx.send(String::from_utf8_lossy(&pending).into_owned()).await;
    }
}
