// src/watch/registry.rs

//! Recursive directory registration against a [`WatchBackend`].

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::errors::{GowatchError, Result};
use crate::fs::FileSystem;
use crate::watch::filter::PathFilter;
use crate::watch::path_utils::relative_str;
use crate::watch::watcher::WatchBackend;

/// Outcome of a best-effort [`DirectoryRegistry::rescan`].
#[derive(Debug, Default)]
pub struct RescanReport {
    pub added: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    pub errors: Vec<GowatchError>,
}

impl RescanReport {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.errors.is_empty()
    }
}

/// Owns the set of directories currently registered with the backend.
///
/// The root is always registered. Below it, every directory accepted by
/// [`PathFilter::should_watch_dir`] is registered. The walk always descends,
/// so children of an excluded directory are still considered on their own.
#[derive(Debug)]
pub struct DirectoryRegistry<B: WatchBackend> {
    backend: B,
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    filter: PathFilter,
    registered: BTreeSet<PathBuf>,
}

impl<B: WatchBackend> DirectoryRegistry<B> {
    pub fn new(backend: B, fs: Arc<dyn FileSystem>, root: PathBuf, filter: PathFilter) -> Self {
        Self {
            backend,
            fs,
            root,
            filter,
            registered: BTreeSet::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn is_registered(&self, dir: &Path) -> bool {
        self.registered.contains(dir)
    }

    pub fn registered(&self) -> impl Iterator<Item = &Path> {
        self.registered.iter().map(PathBuf::as_path)
    }

    /// Startup registration. Any failure (root missing, unreadable directory,
    /// backend refusing a path) is returned and should abort startup.
    pub fn register_all(&mut self) -> Result<usize> {
        if !self.fs.is_dir(&self.root) {
            return Err(GowatchError::registration(
                &self.root,
                "root is not a directory",
            ));
        }

        let (dirs, walk_errors) = self.collect_dirs();
        if let Some(err) = walk_errors.into_iter().next() {
            return Err(err);
        }

        for dir in dirs {
            self.register(&dir)?;
        }

        info!(
            root = ?self.root,
            directories = self.registered.len(),
            "registered directories for watching"
        );
        Ok(self.registered.len())
    }

    /// Re-walk from the root after a structural change: register newly
    /// qualifying directories and forget registered ones that vanished.
    /// Failures are collected, never fatal.
    pub fn rescan(&mut self) -> RescanReport {
        let mut report = RescanReport::default();

        let gone: Vec<PathBuf> = self
            .registered
            .iter()
            .filter(|dir| !self.fs.is_dir(dir))
            .cloned()
            .collect();
        for dir in gone {
            // The OS usually drops the watch itself when the directory goes.
            if let Err(err) = self.backend.unwatch_dir(&dir) {
                debug!(?dir, error = %err, "unwatch of removed directory failed");
            }
            self.registered.remove(&dir);
            report.removed.push(dir);
        }

        let (dirs, walk_errors) = self.collect_dirs();
        report.errors.extend(walk_errors);

        for dir in dirs {
            if self.registered.contains(&dir) {
                continue;
            }
            match self.register(&dir) {
                Ok(()) => report.added.push(dir),
                Err(err) => report.errors.push(err),
            }
        }

        if !report.is_empty() {
            debug!(
                added = report.added.len(),
                removed = report.removed.len(),
                errors = report.errors.len(),
                "directory rescan finished"
            );
        }
        report
    }

    fn register(&mut self, dir: &Path) -> Result<()> {
        self.backend
            .watch_dir(dir)
            .map_err(|e| GowatchError::registration(dir, e))?;
        self.registered.insert(dir.to_path_buf());
        debug!(?dir, "watching directory");
        Ok(())
    }

    /// Depth-first walk returning every directory that should be registered
    /// (root first), plus any errors hit along the way.
    fn collect_dirs(&self) -> (Vec<PathBuf>, Vec<GowatchError>) {
        let mut dirs = vec![self.root.clone()];
        let mut errors = Vec::new();
        let mut visited: HashSet<PathBuf> = HashSet::new();
        let mut stack = vec![self.root.clone()];

        while let Some(dir) = stack.pop() {
            // Symlinked directories can form cycles.
            let key = self.fs.canonicalize(&dir).unwrap_or_else(|_| dir.clone());
            if !visited.insert(key) {
                continue;
            }

            let children = match self.fs.read_dir(&dir) {
                Ok(children) => children,
                Err(err) => {
                    errors.push(GowatchError::registration(&dir, format!("{err:#}")));
                    continue;
                }
            };

            for child in children.into_iter().rev() {
                if !self.fs.is_dir(&child) {
                    continue;
                }
                let Some(rel) = relative_str(&self.root, &child) else {
                    warn!(?child, root = ?self.root, "directory outside of root; skipping");
                    continue;
                };
                if self.filter.should_watch_dir(&rel) {
                    dirs.push(child.clone());
                }
                stack.push(child);
            }
        }

        (dirs, errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[derive(Debug, Default)]
    struct RecordingBackend {
        watched: Vec<PathBuf>,
        unwatched: Vec<PathBuf>,
        refuse: Option<PathBuf>,
    }

    impl WatchBackend for RecordingBackend {
        fn watch_dir(&mut self, path: &Path) -> anyhow::Result<()> {
            if self.refuse.as_deref() == Some(path) {
                anyhow::bail!("no space left for inotify watches");
            }
            self.watched.push(path.to_path_buf());
            Ok(())
        }

        fn unwatch_dir(&mut self, path: &Path) -> anyhow::Result<()> {
            self.unwatched.push(path.to_path_buf());
            Ok(())
        }
    }

    fn tree() -> MockFileSystem {
        let fs = MockFileSystem::new();
        fs.add_file("/p/main.go");
        fs.add_file("/p/src/api/handler.go");
        fs.add_file("/p/vendor/lib/dep.go");
        fs.add_dir("/p/.git/objects");
        fs
    }

    fn registry(fs: &MockFileSystem, filter: PathFilter) -> DirectoryRegistry<RecordingBackend> {
        DirectoryRegistry::new(
            RecordingBackend::default(),
            Arc::new(fs.clone()),
            PathBuf::from("/p"),
            filter,
        )
    }

    #[test]
    fn excluded_directories_are_skipped_but_their_children_are_not() {
        let fs = tree();
        let filter = PathFilter::new(
            vec![],
            vec![],
            vec![],
            vec!["vendor".to_string(), ".git".to_string()],
        );
        let mut reg = registry(&fs, filter.clone());

        assert_eq!(reg.register_all().unwrap(), 5);
        let watched: Vec<&Path> = reg.registered().collect();
        assert_eq!(
            watched,
            vec![
                Path::new("/p"),
                Path::new("/p/.git/objects"),
                Path::new("/p/src"),
                Path::new("/p/src/api"),
                Path::new("/p/vendor/lib"),
            ]
        );
        assert!(!reg.is_registered(Path::new("/p/vendor")));

        // Whatever the filter accepts below the root ends up registered.
        assert!(filter.should_watch_dir("vendor/lib"));
        assert!(reg.is_registered(Path::new("/p/vendor/lib")));
    }

    #[test]
    fn include_mode_descends_into_unlisted_directories() {
        let fs = tree();
        let filter = PathFilter::new(vec![], vec![], vec!["src/api".to_string()], vec![]);
        let mut reg = registry(&fs, filter);

        reg.register_all().unwrap();
        assert!(reg.is_registered(Path::new("/p")));
        assert!(reg.is_registered(Path::new("/p/src/api")));
        assert!(!reg.is_registered(Path::new("/p/src")));
    }

    #[test]
    fn missing_root_is_fatal() {
        let fs = MockFileSystem::new();
        let mut reg = registry(&fs, PathFilter::default());
        assert!(matches!(
            reg.register_all(),
            Err(GowatchError::RegistrationError { .. })
        ));
    }

    #[test]
    fn backend_refusal_is_fatal_at_startup() {
        let fs = tree();
        let mut reg = registry(&fs, PathFilter::default());
        reg.backend.refuse = Some(PathBuf::from("/p/src"));
        match reg.register_all() {
            Err(GowatchError::RegistrationError { path, .. }) => {
                assert_eq!(path, PathBuf::from("/p/src"))
            }
            other => panic!("expected RegistrationError, got {:?}", other),
        }
    }

    #[test]
    fn rescan_picks_up_new_and_forgets_removed_directories() {
        let fs = tree();
        let mut reg = registry(&fs, PathFilter::default());
        reg.register_all().unwrap();

        fs.add_dir("/p/src/web");
        fs.remove("/p/vendor");
        let report = reg.rescan();

        assert_eq!(report.added, vec![PathBuf::from("/p/src/web")]);
        assert_eq!(
            report.removed,
            vec![PathBuf::from("/p/vendor"), PathBuf::from("/p/vendor/lib")]
        );
        assert!(report.errors.is_empty());
        assert!(reg.is_registered(Path::new("/p/src/web")));
        assert!(!reg.is_registered(Path::new("/p/vendor")));
    }

    #[test]
    fn rescan_errors_are_reported_not_fatal() {
        let fs = tree();
        let mut reg = registry(&fs, PathFilter::default());
        reg.register_all().unwrap();

        fs.add_dir("/p/locked/inner");
        fs.make_unreadable("/p/locked");
        let report = reg.rescan();

        assert_eq!(report.added, vec![PathBuf::from("/p/locked")]);
        assert_eq!(report.errors.len(), 1);
    }
}
