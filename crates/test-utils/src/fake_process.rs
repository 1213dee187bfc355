use std::collections::HashSet;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;

use gowatch::errors::{GowatchError, Result};
use gowatch::exec::backend::{BoxFuture, ManagedProcess, ProcessController};

/// `None` while running, `Some(code)` once dead.
type ExitState = Option<Option<i32>>;

#[derive(Debug, Default)]
struct Shared {
    spawned: Vec<String>,
    live: usize,
    max_live: usize,
    kills: usize,
    next_pid: u32,
    failing: HashSet<String>,
    kill_delay: Duration,
    ignore_kills: bool,
    latest: Option<Arc<watch::Sender<ExitState>>>,
}

/// A `ProcessController` that never touches the OS.
///
/// It tracks how many fake processes are alive at once, so tests can check
/// that a new process is never started before the previous one is dead.
/// Clones share state.
#[derive(Debug, Clone, Default)]
pub struct FakeProcessController {
    shared: Arc<Mutex<Shared>>,
}

impl FakeProcessController {
    pub fn new() -> Self {
        let ctl = Self::default();
        ctl.shared.lock().unwrap().next_pid = 1000;
        ctl
    }

    /// Killed processes take `delay` to actually die.
    pub fn with_kill_delay(self, delay: Duration) -> Self {
        self.shared.lock().unwrap().kill_delay = delay;
        self
    }

    /// Killed processes never die (exercises the kill timeout).
    pub fn ignoring_kills(self) -> Self {
        self.shared.lock().unwrap().ignore_kills = true;
        self
    }

    /// Make `spawn(command)` fail.
    pub fn fail_command(&self, command: &str) {
        self.shared.lock().unwrap().failing.insert(command.to_string());
    }

    pub fn spawned(&self) -> Vec<String> {
        self.shared.lock().unwrap().spawned.clone()
    }

    pub fn live(&self) -> usize {
        self.shared.lock().unwrap().live
    }

    pub fn max_live(&self) -> usize {
        self.shared.lock().unwrap().max_live
    }

    pub fn kills(&self) -> usize {
        self.shared.lock().unwrap().kills
    }

    /// Let the most recently spawned process exit on its own with `code`.
    /// Returns false if it was already dead.
    pub fn finish_latest(&self, code: i32) -> bool {
        let latest = self.shared.lock().unwrap().latest.clone();
        match latest {
            Some(tx) => mark_dead(&self.shared, &tx, Some(code)),
            None => false,
        }
    }
}

/// Transition a fake process to dead exactly once.
fn mark_dead(shared: &Mutex<Shared>, tx: &watch::Sender<ExitState>, code: Option<i32>) -> bool {
    let changed = tx.send_if_modified(|state| {
        if state.is_some() {
            return false;
        }
        *state = Some(code);
        true
    });
    if changed {
        shared.lock().unwrap().live -= 1;
    }
    changed
}

#[derive(Debug)]
pub struct FakeProcess {
    pid: u32,
    exit_tx: Arc<watch::Sender<ExitState>>,
    exit_rx: watch::Receiver<ExitState>,
}

impl ManagedProcess for FakeProcess {
    fn id(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn wait(&mut self) -> BoxFuture<'_, io::Result<Option<i32>>> {
        Box::pin(async move {
            let state = *self
                .exit_rx
                .wait_for(|state| state.is_some())
                .await
                .map_err(|_| io::Error::other("fake process lost its exit channel"))?;
            Ok(state.flatten())
        })
    }
}

impl ProcessController for FakeProcessController {
    type Process = FakeProcess;

    fn spawn(&self, command: &str) -> Result<FakeProcess> {
        let mut shared = self.shared.lock().unwrap();
        if shared.failing.contains(command) {
            return Err(GowatchError::SpawnError {
                command: command.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "fake spawn failure"),
            });
        }

        shared.spawned.push(command.to_string());
        shared.live += 1;
        shared.max_live = shared.max_live.max(shared.live);
        shared.next_pid += 1;

        let (tx, rx) = watch::channel(None);
        let tx = Arc::new(tx);
        shared.latest = Some(Arc::clone(&tx));

        Ok(FakeProcess {
            pid: shared.next_pid,
            exit_tx: tx,
            exit_rx: rx,
        })
    }

    fn terminate_tree<'a>(&'a self, process: &'a mut FakeProcess) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let (delay, ignore) = {
                let mut shared = self.shared.lock().unwrap();
                if process.exit_rx.borrow().is_none() {
                    shared.kills += 1;
                }
                (shared.kill_delay, shared.ignore_kills)
            };
            if ignore {
                return Ok(());
            }

            if delay.is_zero() {
                mark_dead(&self.shared, &process.exit_tx, None);
            } else {
                let shared = Arc::clone(&self.shared);
                let tx = Arc::clone(&process.exit_tx);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    mark_dead(&shared, &tx, None);
                });
            }
            Ok(())
        })
    }
}
