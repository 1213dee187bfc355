// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::exec::supervisor::{ExitOutcome, ProcessExit, SupervisorHandle};
use crate::watch::debounce::{Debouncer, SettleEnd};
use crate::watch::path_utils::relative_str;
use crate::watch::registry::DirectoryRegistry;
use crate::watch::watcher::WatchBackend;
use crate::watch::ChangeEvent;

use super::core::ControllerCore;
use super::shutdown::ShutdownSignal;
use super::{ControllerCommand, ControllerInput, CoreStep};

/// Watches the tree and restarts the command on relevant changes.
///
/// This is the IO shell around `ControllerCore`, which decides what each
/// input means. This struct does the async IO: directory registration,
/// multiplexing the event sources, and driving the supervisor.
pub struct WatcherController<B: WatchBackend> {
    core: ControllerCore,
    registry: DirectoryRegistry<B>,
    supervisor: SupervisorHandle,
    exits: mpsc::UnboundedReceiver<ProcessExit>,
    events: mpsc::UnboundedReceiver<ChangeEvent>,
    shutdown: ShutdownSignal,
    debouncer: Debouncer,
}

impl<B: WatchBackend> fmt::Debug for WatcherController<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatcherController")
            .field("core", &self.core)
            .field("root", &self.registry.root())
            .field("debouncer", &self.debouncer)
            .finish_non_exhaustive()
    }
}

enum Wake {
    Shutdown,
    Exit(ProcessExit),
    Event(Option<ChangeEvent>),
}

impl<B: WatchBackend> WatcherController<B> {
    pub fn new(
        core: ControllerCore,
        registry: DirectoryRegistry<B>,
        supervisor: SupervisorHandle,
        exits: mpsc::UnboundedReceiver<ProcessExit>,
        events: mpsc::UnboundedReceiver<ChangeEvent>,
        shutdown: ShutdownSignal,
        debouncer: Debouncer,
    ) -> Self {
        Self {
            core,
            registry,
            supervisor,
            exits,
            events,
            shutdown,
            debouncer,
        }
    }

    /// Register the tree, run the default command, then react to changes
    /// until shutdown.
    ///
    /// Returns only after the running process (if any) is confirmed gone and
    /// the supervisor has finished. A registration failure at startup is
    /// returned as an error.
    pub async fn run(mut self) -> Result<()> {
        if let Err(err) = self.registry.register_all() {
            let _ = self.supervisor.shutdown().await;
            return Err(err);
        }

        println!("[gowatch] Watching {}", self.registry.root().display());
        info!("gowatch controller started");

        let step = self.core.step(ControllerInput::Startup);
        let mut keep_running = self.execute(step).await;

        while keep_running {
            let wake = tokio::select! {
                biased;
                _ = self.shutdown.requested() => Wake::Shutdown,
                Some(exit) = self.exits.recv() => Wake::Exit(exit),
                event = self.events.recv() => Wake::Event(event),
            };

            let input = match wake {
                Wake::Shutdown => ControllerInput::ShutdownRequested,
                Wake::Exit(exit) => {
                    log_exit(&exit);
                    ControllerInput::ProcessExited
                }
                Wake::Event(Some(event)) => match self.classify(event) {
                    Some(input) => input,
                    None => continue,
                },
                Wake::Event(None) => {
                    info!("file watch event source closed; shutting down");
                    ControllerInput::ShutdownRequested
                }
            };

            let step = self.core.step(input);
            let acted = !step.commands.is_empty();
            keep_running = self.execute(step).await;

            if keep_running && acted {
                self.absorb_burst().await;
            }
        }

        if let Err(err) = self.supervisor.stop().await {
            debug!(error = %err, "final stop skipped");
        }
        self.supervisor.shutdown().await?;
        info!("gowatch controller stopped");
        Ok(())
    }

    /// Turn a raw event into a core input. Paths outside the root are
    /// dropped.
    fn classify(&self, event: ChangeEvent) -> Option<ControllerInput> {
        let Some(path) = relative_str(self.registry.root(), &event.path) else {
            debug!(path = ?event.path, "event outside of watched root; ignoring");
            return None;
        };
        // A removed directory no longer stats as one, but we still know it.
        let is_directory = event.is_directory || self.registry.is_registered(&event.path);
        Some(ControllerInput::PathChanged { path, is_directory })
    }

    /// Execute the commands of one step; returns whether to keep running.
    async fn execute(&mut self, step: CoreStep) -> bool {
        for command in step.commands {
            match command {
                ControllerCommand::Rescan => self.rescan(),
                ControllerCommand::Restart { command, trigger } => {
                    self.restart(command, trigger).await
                }
                ControllerCommand::Stop => {
                    if let Err(err) = self.supervisor.stop().await {
                        warn!(error = %err, "stop failed");
                    }
                }
            }
        }
        step.keep_running
    }

    async fn restart(&mut self, command: String, trigger: Option<String>) {
        if let Some(file) = &trigger {
            println!("[gowatch] File {file} modified. Reloading");
            info!(file = %file, command = %command, "reloading");
        }

        if let Err(err) = self.supervisor.stop().await {
            warn!(error = %err, "stop before restart failed");
        }

        // The stop above may have taken a while; a shutdown requested in the
        // meantime wins over the restart.
        if self.shutdown.is_requested() {
            info!("shutdown requested; not starting {command:?}");
            return;
        }

        println!("[gowatch] Running: {command}");
        if let Err(err) = self.supervisor.start(command.as_str()).await {
            warn!(error = %err, "could not start command");
            println!("[gowatch] {err}");
        }
    }

    fn rescan(&mut self) {
        let report = self.registry.rescan();
        for dir in &report.added {
            info!(dir = ?dir, "watching new directory");
        }
        for dir in &report.removed {
            debug!(dir = ?dir, "directory removed from watch");
        }
        for err in &report.errors {
            warn!(error = %err, "directory rescan error");
        }
    }

    async fn absorb_burst(&mut self) {
        let settled = self
            .debouncer
            .settle(&mut self.events, &mut self.shutdown)
            .await;

        match settled.end {
            // New directories among the swallowed events still need a watch.
            SettleEnd::Quiet if settled.directory_changed => self.rescan(),
            SettleEnd::Quiet => {}
            // The next loop iteration picks these up.
            SettleEnd::Shutdown | SettleEnd::Closed => {}
        }
    }
}

fn log_exit(exit: &ProcessExit) {
    match exit.outcome {
        ExitOutcome::Exited(Some(0)) => {
            info!(pid = ?exit.pid, command = %exit.command, "command finished");
        }
        ExitOutcome::Exited(code) => {
            println!("[gowatch] Command {:?} exited with {code:?}", exit.command);
            info!(pid = ?exit.pid, ?code, "command exited");
        }
        ExitOutcome::Killed => debug!(pid = ?exit.pid, "previous process killed"),
        ExitOutcome::Abandoned => {
            warn!(pid = ?exit.pid, command = %exit.command, "previous process may still be running")
        }
    }
}
