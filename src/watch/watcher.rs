// src/watch/watcher.rs

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::trace;

use crate::fs::FileSystem;
use crate::watch::ChangeEvent;

/// Registration side of the OS notification mechanism.
///
/// Directories are registered one at a time (non-recursively) so that the
/// include/exclude rules decide exactly which ones are watched.
pub trait WatchBackend: Send {
    fn watch_dir(&mut self, path: &Path) -> Result<()>;
    fn unwatch_dir(&mut self, path: &Path) -> Result<()>;
}

/// [`WatchBackend`] on top of `notify`'s platform watcher.
///
/// Dropping this value stops file watching and closes the event channel.
pub struct NotifyBackend {
    inner: RecommendedWatcher,
}

impl std::fmt::Debug for NotifyBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyBackend").finish()
    }
}

impl NotifyBackend {
    /// Create the OS watcher and the channel its events are forwarded to.
    ///
    /// The notify callback runs on notify's own thread; it classifies each
    /// path as file or directory there (a blocking `stat` is fine off the
    /// runtime) and pushes one [`ChangeEvent`] per path.
    pub fn new(
        fs: Arc<dyn FileSystem>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ChangeEvent>)> {
        let (event_tx, event_rx) = mpsc::unbounded_channel::<ChangeEvent>();

        let inner = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !is_relevant(&event.kind) {
                        trace!(?event, "ignoring access-only notify event");
                        return;
                    }
                    let timestamp = Instant::now();
                    for path in event.paths {
                        let is_directory = fs.is_dir(&path);
                        let change = ChangeEvent {
                            path,
                            is_directory,
                            timestamp,
                        };
                        if let Err(err) = event_tx.send(change) {
                            // The controller is gone; nothing left to notify.
                            eprintln!("gowatch: failed to forward notify event: {err}");
                            return;
                        }
                    }
                }
                Err(err) => {
                    eprintln!("gowatch: file watch error: {err}");
                }
            },
            Config::default(),
        )?;

        Ok((Self { inner }, event_rx))
    }
}

impl WatchBackend for NotifyBackend {
    fn watch_dir(&mut self, path: &Path) -> Result<()> {
        self.inner.watch(path, RecursiveMode::NonRecursive)?;
        Ok(())
    }

    fn unwatch_dir(&mut self, path: &Path) -> Result<()> {
        self.inner.unwatch(path)?;
        Ok(())
    }
}

/// Opening or reading a file does not change it.
fn is_relevant(kind: &EventKind) -> bool {
    !matches!(kind, EventKind::Access(_))
}
