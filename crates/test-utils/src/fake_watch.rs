use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use gowatch::watch::WatchBackend;

#[derive(Debug, Default)]
struct Recorded {
    watched: Vec<PathBuf>,
    unwatched: Vec<PathBuf>,
    refused: HashSet<PathBuf>,
}

/// A `WatchBackend` that only records registrations.
///
/// Clones share state, so a test can keep one clone for assertions while the
/// registry owns the other.
#[derive(Debug, Clone, Default)]
pub struct FakeWatchBackend {
    inner: Arc<Mutex<Recorded>>,
}

impl FakeWatchBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `watch_dir` fail for `path`.
    pub fn refuse(&self, path: impl Into<PathBuf>) {
        self.inner.lock().unwrap().refused.insert(path.into());
    }

    pub fn watched(&self) -> Vec<PathBuf> {
        self.inner.lock().unwrap().watched.clone()
    }

    pub fn unwatched(&self) -> Vec<PathBuf> {
        self.inner.lock().unwrap().unwatched.clone()
    }
}

impl WatchBackend for FakeWatchBackend {
    fn watch_dir(&mut self, path: &Path) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.refused.contains(path) {
            anyhow::bail!("watch limit reached");
        }
        inner.watched.push(path.to_path_buf());
        Ok(())
    }

    fn unwatch_dir(&mut self, path: &Path) -> anyhow::Result<()> {
        self.inner.lock().unwrap().unwatched.push(path.to_path_buf());
        Ok(())
    }
}
