// src/fs/mock.rs

use super::FileSystem;
use anyhow::{Result, anyhow};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MockEntry {
    File,
    Dir,
}

/// In-memory tree of paths. Parents are created implicitly.
///
/// Clones share the same tree, so a test can keep one handle and mutate the
/// tree while the code under test holds another.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    entries: Arc<Mutex<BTreeMap<PathBuf, MockEntry>>>,
    unreadable: Arc<Mutex<Vec<PathBuf>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut entries = self.lock();
        insert_with_parents(&mut entries, path.as_ref(), MockEntry::Dir);
    }

    pub fn add_file(&self, path: impl AsRef<Path>) {
        let mut entries = self.lock();
        insert_with_parents(&mut entries, path.as_ref(), MockEntry::File);
    }

    /// Remove `path` and everything below it.
    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.lock().retain(|p, _| !p.starts_with(path));
    }

    /// Make `read_dir` fail for `path`, simulating a permission error.
    pub fn make_unreadable(&self, path: impl AsRef<Path>) {
        self.unreadable
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(path.as_ref().to_path_buf());
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<PathBuf, MockEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn insert_with_parents(entries: &mut BTreeMap<PathBuf, MockEntry>, path: &Path, kind: MockEntry) {
    for ancestor in path.ancestors().skip(1) {
        if ancestor.as_os_str().is_empty() {
            break;
        }
        entries.entry(ancestor.to_path_buf()).or_insert(MockEntry::Dir);
    }
    entries.insert(path.to_path_buf(), kind);
}

impl FileSystem for MockFileSystem {
    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.lock().get(path), Some(MockEntry::Dir))
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        // Tests use absolute paths already.
        if self.lock().contains_key(path) {
            Ok(path.to_path_buf())
        } else {
            Err(anyhow!("No such file or directory: {:?}", path))
        }
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let unreadable = self.unreadable.lock().unwrap_or_else(|e| e.into_inner());
        if unreadable.iter().any(|p| p == path) {
            return Err(anyhow!("Permission denied: {:?}", path));
        }
        drop(unreadable);

        let entries = self.lock();
        match entries.get(path) {
            Some(MockEntry::Dir) => Ok(entries
                .keys()
                .filter(|p| p.parent() == Some(path))
                .cloned()
                .collect()),
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parents_are_created_implicitly() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/src/api/main.go");

        assert!(fs.is_dir(Path::new("/p/src/api")));
        assert!(fs.is_dir(Path::new("/p")));
        assert!(!fs.is_dir(Path::new("/p/src/api/main.go")));
        assert_eq!(
            fs.read_dir(Path::new("/p/src")).unwrap(),
            vec![PathBuf::from("/p/src/api")]
        );
    }

    #[test]
    fn remove_drops_the_subtree() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/a/b/c.txt");
        fs.remove("/p/a");
        assert!(fs.canonicalize(Path::new("/p/a/b")).is_err());
        assert!(fs.is_dir(Path::new("/p")));
    }
}
