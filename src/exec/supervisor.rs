// src/exec/supervisor.rs

//! Single-process supervisor.
//!
//! One actor task owns the "current process" slot. Every operation on it
//! (start, stop, natural exit) is serialized through that task, so an
//! exit racing with a stop request is resolved in exactly one place.
//! Callers talk to the actor through a cloneable [`SupervisorHandle`].

use std::fmt;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::errors::{GowatchError, Result};
use crate::exec::backend::{ManagedProcess, ProcessController};

const REQUEST_BUFFER: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Nothing has run yet, or the last spawn failed.
    Idle,
    Starting,
    Running,
    Stopping,
    /// The last process is confirmed gone (or was abandoned).
    Exited,
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SupervisorState::Idle => "idle",
            SupervisorState::Starting => "starting",
            SupervisorState::Running => "running",
            SupervisorState::Stopping => "stopping",
            SupervisorState::Exited => "exited",
        };
        f.write_str(s)
    }
}

/// How a process left the `Running` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Exited on its own. `None` when ended by a signal we did not send.
    Exited(Option<i32>),
    /// Killed by `stop()` and confirmed gone.
    Killed,
    /// Killed by `stop()` but exit was not confirmed within the kill timeout.
    Abandoned,
}

/// Published every time a process reaches `Exited`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessExit {
    pub command: String,
    pub pid: Option<u32>,
    pub outcome: ExitOutcome,
}

/// Lifetime counters.
#[derive(Debug, Default)]
pub struct SupervisorStats {
    started: AtomicU64,
    killed: AtomicU64,
    exited: AtomicU64,
    live: AtomicUsize,
    max_concurrent: AtomicUsize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub started: u64,
    pub killed: u64,
    pub exited: u64,
    pub live: usize,
    pub max_concurrent: usize,
}

impl SupervisorStats {
    fn record_start(&self) {
        self.started.fetch_add(1, Ordering::SeqCst);
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(live, Ordering::SeqCst);
    }

    fn record_exit(&self, outcome: ExitOutcome) {
        match outcome {
            ExitOutcome::Exited(_) => self.exited.fetch_add(1, Ordering::SeqCst),
            ExitOutcome::Killed | ExitOutcome::Abandoned => {
                self.killed.fetch_add(1, Ordering::SeqCst)
            }
        };
        self.live.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            started: self.started.load(Ordering::SeqCst),
            killed: self.killed.load(Ordering::SeqCst),
            exited: self.exited.load(Ordering::SeqCst),
            live: self.live.load(Ordering::SeqCst),
            max_concurrent: self.max_concurrent.load(Ordering::SeqCst),
        }
    }
}

#[derive(Debug)]
enum Request {
    Start {
        command: String,
        reply: oneshot::Sender<Result<()>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    State {
        reply: oneshot::Sender<SupervisorState>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable client side of the supervisor actor.
#[derive(Debug, Clone)]
pub struct SupervisorHandle {
    tx: mpsc::Sender<Request>,
    stats: Arc<SupervisorStats>,
}

impl SupervisorHandle {
    /// Spawn `command`. Fails with [`GowatchError::SpawnError`] if the OS
    /// refuses; the supervisor is then `Idle` again.
    pub async fn start(&self, command: impl Into<String>) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Start {
            command: command.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| GowatchError::SupervisorGone)?
    }

    /// Kill the running process tree and return once it is confirmed gone.
    /// A no-op when nothing is running.
    pub async fn stop(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Stop { reply }).await?;
        rx.await.map_err(|_| GowatchError::SupervisorGone)
    }

    pub async fn state(&self) -> Result<SupervisorState> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::State { reply }).await?;
        rx.await.map_err(|_| GowatchError::SupervisorGone)
    }

    /// Stop any running process and end the actor. Returns after the actor
    /// has finished; calling it again is harmless.
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Request::Shutdown { reply }).await.is_err() {
            return Ok(());
        }
        // A dropped reply means another shutdown already ended the actor.
        let _ = rx.await;
        Ok(())
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    async fn send(&self, request: Request) -> Result<()> {
        self.tx
            .send(request)
            .await
            .map_err(|_| GowatchError::SupervisorGone)
    }
}

pub struct ProcessSupervisor;

impl ProcessSupervisor {
    /// Start the actor task. The receiver yields a [`ProcessExit`] every time
    /// a process ends, whether on its own or through `stop()`.
    pub fn spawn<C: ProcessController>(
        controller: C,
        kill_timeout: Duration,
    ) -> (SupervisorHandle, mpsc::UnboundedReceiver<ProcessExit>) {
        let (tx, requests) = mpsc::channel(REQUEST_BUFFER);
        let (exits_tx, exits_rx) = mpsc::unbounded_channel();
        let stats = Arc::new(SupervisorStats::default());

        let actor = Actor {
            controller,
            kill_timeout,
            state: SupervisorState::Idle,
            current: None,
            requests,
            exits_tx,
            stats: Arc::clone(&stats),
        };
        tokio::spawn(actor.run());

        (SupervisorHandle { tx, stats }, exits_rx)
    }
}

struct Current<P> {
    process: P,
    command: String,
    pid: Option<u32>,
}

enum Wake {
    Request(Option<Request>),
    Exited(io::Result<Option<i32>>),
}

struct Actor<C: ProcessController> {
    controller: C,
    kill_timeout: Duration,
    state: SupervisorState,
    current: Option<Current<C::Process>>,
    requests: mpsc::Receiver<Request>,
    exits_tx: mpsc::UnboundedSender<ProcessExit>,
    stats: Arc<SupervisorStats>,
}

impl<C: ProcessController> Actor<C> {
    async fn run(mut self) {
        debug!(kill_timeout_ms = self.kill_timeout.as_millis() as u64, "supervisor started");

        loop {
            let wake = tokio::select! {
                biased;
                request = self.requests.recv() => Wake::Request(request),
                result = wait_current(&mut self.current) => Wake::Exited(result),
            };

            let request = match wake {
                Wake::Exited(result) => {
                    self.on_natural_exit(result).await;
                    continue;
                }
                Wake::Request(Some(request)) => request,
                Wake::Request(None) => {
                    // Every handle is gone.
                    self.stop_current().await;
                    return;
                }
            };

            match request {
                Request::Start { command, reply } => {
                    let result = self.start(command).await;
                    let _ = reply.send(result);
                }
                Request::Stop { reply } => {
                    self.stop_current().await;
                    let _ = reply.send(());
                }
                Request::State { reply } => {
                    let _ = reply.send(self.state);
                }
                Request::Shutdown { reply } => {
                    self.stop_current().await;
                    debug!("supervisor finished");
                    let _ = reply.send(());
                    return;
                }
            }
        }
    }

    async fn start(&mut self, command: String) -> Result<()> {
        if self.current.is_some() {
            warn!(state = %self.state, "start requested while a process is live; stopping it first");
            self.stop_current().await;
        }

        self.state = SupervisorState::Starting;
        match self.controller.spawn(&command) {
            Ok(process) => {
                let pid = process.id();
                self.stats.record_start();
                self.current = Some(Current {
                    process,
                    command,
                    pid,
                });
                self.state = SupervisorState::Running;
                info!(?pid, "process started");
                Ok(())
            }
            Err(err) => {
                self.state = SupervisorState::Idle;
                Err(err)
            }
        }
    }

    async fn stop_current(&mut self) {
        let Some(mut current) = self.current.take() else {
            return;
        };
        self.state = SupervisorState::Stopping;
        debug!(pid = ?current.pid, command = %current.command, "stopping process tree");

        if let Err(err) = self.controller.terminate_tree(&mut current.process).await {
            warn!(pid = ?current.pid, error = %err, "failed to kill process tree");
            println!("[gowatch] {err}");
        }

        let outcome = match tokio::time::timeout(self.kill_timeout, current.process.wait()).await {
            Ok(Ok(_)) => ExitOutcome::Killed,
            Ok(Err(err)) => {
                warn!(pid = ?current.pid, error = %err, "could not confirm process exit");
                ExitOutcome::Abandoned
            }
            Err(_) => {
                warn!(
                    pid = ?current.pid,
                    timeout_ms = self.kill_timeout.as_millis() as u64,
                    "process did not exit after kill; abandoning it"
                );
                ExitOutcome::Abandoned
            }
        };

        self.finish(current, outcome);
    }

    async fn on_natural_exit(&mut self, result: io::Result<Option<i32>>) {
        let Some(mut current) = self.current.take() else {
            return;
        };

        // Background children of the command may outlive it.
        if let Err(err) = self.controller.terminate_tree(&mut current.process).await {
            debug!(pid = ?current.pid, error = %err, "cleanup after natural exit failed");
        }

        let code = match result {
            Ok(code) => code,
            Err(err) => {
                warn!(pid = ?current.pid, error = %err, "waiting for process failed");
                None
            }
        };
        self.finish(current, ExitOutcome::Exited(code));
    }

    fn finish(&mut self, current: Current<C::Process>, outcome: ExitOutcome) {
        self.stats.record_exit(outcome);
        self.state = SupervisorState::Exited;
        info!(pid = ?current.pid, ?outcome, "process exited");

        let _ = self.exits_tx.send(ProcessExit {
            command: current.command,
            pid: current.pid,
            outcome,
        });
    }
}

async fn wait_current<P: ManagedProcess>(current: &mut Option<Current<P>>) -> io::Result<Option<i32>> {
    match current {
        Some(current) => current.process.wait().await,
        None => std::future::pending().await,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::exec::backend::{OutputLine, OutputMode, ShellProcessController};

    fn supervisor() -> (SupervisorHandle, mpsc::UnboundedReceiver<ProcessExit>) {
        ProcessSupervisor::spawn(ShellProcessController::inherit(), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn stop_while_idle_is_a_no_op() {
        let (sup, _exits) = supervisor();
        assert_eq!(sup.state().await.unwrap(), SupervisorState::Idle);

        sup.stop().await.unwrap();
        sup.stop().await.unwrap();

        assert_eq!(sup.state().await.unwrap(), SupervisorState::Idle);
        assert_eq!(sup.stats().started, 0);
        sup.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn stop_kills_and_reports() {
        let (sup, mut exits) = supervisor();

        sup.start("sleep 30").await.unwrap();
        assert_eq!(sup.state().await.unwrap(), SupervisorState::Running);

        sup.stop().await.unwrap();
        assert_eq!(sup.state().await.unwrap(), SupervisorState::Exited);

        let exit = exits.recv().await.unwrap();
        assert_eq!(exit.command, "sleep 30");
        assert_eq!(exit.outcome, ExitOutcome::Killed);

        let stats = sup.stats();
        assert_eq!(stats.killed, 1);
        assert_eq!(stats.live, 0);
        sup.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn natural_exit_is_observed_without_restart() {
        let (sup, mut exits) = supervisor();

        sup.start("exit 3").await.unwrap();
        let exit = exits.recv().await.unwrap();
        assert_eq!(exit.outcome, ExitOutcome::Exited(Some(3)));

        assert_eq!(sup.state().await.unwrap(), SupervisorState::Exited);
        assert_eq!(sup.stats().started, 1);
        sup.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn back_to_back_starts_never_overlap() {
        let (sup, _exits) = supervisor();

        for _ in 0..3 {
            sup.stop().await.unwrap();
            sup.start("sleep 30").await.unwrap();
        }
        // Starting without a stop still replaces the process.
        sup.start("sleep 30").await.unwrap();

        let stats = sup.stats();
        assert_eq!(stats.started, 4);
        assert_eq!(stats.killed, 3);
        assert_eq!(stats.max_concurrent, 1);
        sup.shutdown().await.unwrap();
        assert_eq!(sup.stats().live, 0);
    }

    #[tokio::test]
    async fn captured_output_is_relayed_before_exit_notice() {
        let (tx, mut lines) = mpsc::unbounded_channel::<OutputLine>();
        let (sup, mut exits) = ProcessSupervisor::spawn(
            ShellProcessController::new(OutputMode::Capture(tx)),
            Duration::from_secs(5),
        );

        sup.start("echo one; echo two >&2").await.unwrap();
        exits.recv().await.unwrap();

        let mut seen = Vec::new();
        while let Ok(line) = lines.try_recv() {
            seen.push(line.line);
        }
        seen.sort();
        assert_eq!(seen, vec!["one".to_string(), "two".to_string()]);
        sup.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn handle_reports_gone_after_shutdown() {
        let (sup, _exits) = supervisor();
        sup.shutdown().await.unwrap();
        sup.shutdown().await.unwrap();

        assert!(matches!(
            sup.start("true").await,
            Err(GowatchError::SupervisorGone)
        ));
    }
}
