// src/exec/backend.rs

//! Pluggable process backend.
//!
//! The supervisor talks to a [`ProcessController`] instead of
//! `tokio::process` directly. This keeps the platform specifics (process
//! groups and `killpg` on Unix, `taskkill /T` on Windows) in one place and
//! lets tests swap in a fake that never spawns anything.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::errors::{GowatchError, Result};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A spawned process as seen by the supervisor.
pub trait ManagedProcess: Send + 'static {
    /// OS process id, if known.
    fn id(&self) -> Option<u32>;

    /// Wait for the process to exit and return its exit code (`None` when it
    /// was ended by a signal).
    ///
    /// Must be cancel-safe: the supervisor drops and re-creates this future
    /// whenever a request arrives while the process is running.
    fn wait(&mut self) -> BoxFuture<'_, io::Result<Option<i32>>>;
}

/// Capability to start a command and to forcibly end it together with every
/// process it started.
pub trait ProcessController: Send + Sync + 'static {
    type Process: ManagedProcess;

    fn spawn(&self, command: &str) -> Result<Self::Process>;

    /// Kill `process` and its descendants. Returning `Ok` does not mean the
    /// process is gone yet; the supervisor confirms that with `wait`.
    fn terminate_tree<'a>(&'a self, process: &'a mut Self::Process) -> BoxFuture<'a, Result<()>>;
}

/// Which of the child's streams a captured line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// One line of captured output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub pid: Option<u32>,
    pub stream: OutputStream,
    pub line: String,
}

/// Where a child's stdout/stderr go.
#[derive(Debug, Clone, Default)]
pub enum OutputMode {
    /// The child writes straight to our stdout/stderr.
    #[default]
    Inherit,
    /// Lines are relayed into a channel as they arrive.
    Capture(mpsc::UnboundedSender<OutputLine>),
}

/// How long `wait` keeps draining relay tasks after the child exited.
const RELAY_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Runs commands through the platform shell (`sh -c` / `cmd /C`).
#[derive(Debug, Clone, Default)]
pub struct ShellProcessController {
    output: OutputMode,
}

impl ShellProcessController {
    pub fn new(output: OutputMode) -> Self {
        Self { output }
    }

    pub fn inherit() -> Self {
        Self::new(OutputMode::Inherit)
    }
}

/// A command started by [`ShellProcessController`].
#[derive(Debug)]
pub struct ShellProcess {
    child: Child,
    pid: Option<u32>,
    relays: Vec<JoinHandle<()>>,
}

impl ManagedProcess for ShellProcess {
    fn id(&self) -> Option<u32> {
        self.pid
    }

    fn wait(&mut self) -> BoxFuture<'_, io::Result<Option<i32>>> {
        Box::pin(async move {
            let status = self.child.wait().await?;

            // Finish relaying whatever the process wrote before it exited, so
            // its output never interleaves with the next process's output.
            while let Some(relay) = self.relays.last_mut() {
                if tokio::time::timeout(RELAY_DRAIN_TIMEOUT, relay).await.is_err() {
                    debug!(pid = ?self.pid, "output relay still open after exit; detaching");
                }
                self.relays.pop();
            }

            Ok(status.code())
        })
    }
}

impl ProcessController for ShellProcessController {
    type Process = ShellProcess;

    fn spawn(&self, command: &str) -> Result<ShellProcess> {
        let mut cmd = shell_command(command);
        cmd.stdin(Stdio::null()).kill_on_drop(true);

        // Own process group, so the whole tree can be signalled at once.
        #[cfg(unix)]
        cmd.process_group(0);

        match self.output {
            OutputMode::Inherit => {
                cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
            }
            OutputMode::Capture(_) => {
                cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
            }
        }

        let mut child = cmd.spawn().map_err(|source| GowatchError::SpawnError {
            command: command.to_string(),
            source,
        })?;
        let pid = child.id();

        let mut relays = Vec::new();
        if let OutputMode::Capture(tx) = &self.output {
            if let Some(stdout) = child.stdout.take() {
                relays.push(spawn_relay(stdout, OutputStream::Stdout, pid, tx.clone()));
            }
            if let Some(stderr) = child.stderr.take() {
                relays.push(spawn_relay(stderr, OutputStream::Stderr, pid, tx.clone()));
            }
        }

        Ok(ShellProcess { child, pid, relays })
    }

    fn terminate_tree<'a>(&'a self, process: &'a mut ShellProcess) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let Some(pid) = process.pid else {
                // Never got a pid; fall back to the direct child only.
                return process.child.start_kill().map_err(|e| GowatchError::TerminationError {
                    pid: 0,
                    message: e.to_string(),
                });
            };
            kill_tree(pid, &mut process.child).await
        })
    }
}

fn shell_command(command: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    }
}

fn spawn_relay<R>(
    reader: R,
    stream: OutputStream,
    pid: Option<u32>,
    tx: mpsc::UnboundedSender<OutputLine>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(OutputLine { pid, stream, line }).is_err() {
                break;
            }
        }
    })
}

#[cfg(unix)]
async fn kill_tree(pid: u32, _child: &mut Child) -> Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let pgid = i32::try_from(pid).map_err(|_| GowatchError::TerminationError {
        pid,
        message: "pid does not fit in pid_t".to_string(),
    })?;

    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        Ok(()) => Ok(()),
        // Every member of the group is already gone.
        Err(Errno::ESRCH) => {
            debug!(pid, "process group already gone");
            Ok(())
        }
        Err(errno) => Err(GowatchError::TerminationError {
            pid,
            message: errno.desc().to_string(),
        }),
    }
}

#[cfg(windows)]
async fn kill_tree(pid: u32, child: &mut Child) -> Result<()> {
    let status = Command::new("taskkill")
        .args(["/T", "/F", "/PID", &pid.to_string()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match status {
        Ok(status) if status.success() => Ok(()),
        other => {
            tracing::warn!(pid, result = ?other, "taskkill failed; killing direct child only");
            child.start_kill().map_err(|e| GowatchError::TerminationError {
                pid,
                message: e.to_string(),
            })
        }
    }
}

#[cfg(not(any(unix, windows)))]
async fn kill_tree(pid: u32, child: &mut Child) -> Result<()> {
    tracing::warn!(pid, "no process-tree kill on this platform; killing direct child only");
    child.start_kill().map_err(|e| GowatchError::TerminationError {
        pid,
        message: e.to_string(),
    })
}
