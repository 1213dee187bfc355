// src/watch/filter.rs

//! Include/exclude rules deciding which directories get registered with the
//! OS watcher and which file changes cause a reload.

use crate::config::WatchSection;

/// Compiled `[watch]` rules.
///
/// Directories and files are evaluated independently. Within each category a
/// non-empty include list wins and the exclude list is not consulted at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathFilter {
    include_files: Vec<String>,
    exclude_files: Vec<String>,
    include_dirs: Vec<String>,
    exclude_dirs: Vec<String>,
}

impl PathFilter {
    pub fn new(
        include_files: Vec<String>,
        exclude_files: Vec<String>,
        include_dirs: Vec<String>,
        exclude_dirs: Vec<String>,
    ) -> Self {
        Self {
            include_files: clean_suffixes(include_files),
            exclude_files: clean_suffixes(exclude_files),
            include_dirs: include_dirs.iter().filter_map(|d| normalize_dir(d)).collect(),
            exclude_dirs: exclude_dirs.iter().filter_map(|d| normalize_dir(d)).collect(),
        }
    }

    pub fn from_config(watch: &WatchSection) -> Self {
        Self::new(
            watch.include_files.clone(),
            watch.exclude_files.clone(),
            watch.include_dirs.clone(),
            watch.exclude_dirs.clone(),
        )
    }

    /// Whether `dir` (relative to the watched root, `/`-separated) should be
    /// registered for notifications.
    pub fn should_watch_dir(&self, dir: &str) -> bool {
        let Some(dir) = normalize_dir(dir) else {
            return false;
        };

        if !self.include_dirs.is_empty() {
            return self.include_dirs.iter().any(|d| *d == dir);
        }

        !self.exclude_dirs.iter().any(|d| *d == dir)
    }

    /// Whether a change to the file `name` should trigger a reload.
    pub fn should_watch_file(&self, name: &str) -> bool {
        if !self.include_files.is_empty() {
            return self.include_files.iter().any(|s| name.ends_with(s.as_str()));
        }

        !self.exclude_files.iter().any(|s| name.ends_with(s.as_str()))
    }
}

fn clean_suffixes(suffixes: Vec<String>) -> Vec<String> {
    suffixes.into_iter().filter(|s| !s.is_empty()).collect()
}

/// Normalise a directory entry to the form used for comparisons:
/// forward slashes, no leading `./`, no trailing `/`, and `.` for the root.
fn normalize_dir(dir: &str) -> Option<String> {
    let mut s = dir.trim().replace('\\', "/");
    if s.is_empty() {
        return None;
    }

    while let Some(rest) = s.strip_prefix("./") {
        s = rest.to_string();
    }
    while s.len() > 1 && s.ends_with('/') {
        s.pop();
    }

    if s.is_empty() {
        s.push('.');
    }
    Some(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn include_dirs_take_precedence_over_excludes() {
        let filter = PathFilter::new(vec![], vec![], strings(&["src"]), strings(&["src"]));
        assert!(filter.should_watch_dir("src"));
        assert!(!filter.should_watch_dir("docs"));
        assert!(!filter.should_watch_dir("src/nested"));
    }

    #[test]
    fn exclude_dirs_match_exactly() {
        let filter = PathFilter::new(vec![], vec![], vec![], strings(&["vendor", "./.git/"]));
        assert!(!filter.should_watch_dir("vendor"));
        assert!(!filter.should_watch_dir(".git"));
        assert!(filter.should_watch_dir("vendor/lib"));
        assert!(filter.should_watch_dir("src"));
    }

    #[test]
    fn file_suffix_rules() {
        let include = PathFilter::new(strings(&[".go"]), strings(&["main.go"]), vec![], vec![]);
        assert!(include.should_watch_file("main.go"));
        assert!(include.should_watch_file("pkg/util.go"));
        assert!(!include.should_watch_file("notes.txt"));

        let exclude = PathFilter::new(vec![], strings(&["_test.go", ".swp"]), vec![], vec![]);
        assert!(exclude.should_watch_file("main.go"));
        assert!(!exclude.should_watch_file("main_test.go"));
        assert!(!exclude.should_watch_file(".main.go.swp"));
    }

    #[test]
    fn empty_rules_watch_everything() {
        let filter = PathFilter::default();
        assert!(filter.should_watch_dir("."));
        assert!(filter.should_watch_dir("a/b/c"));
        assert!(filter.should_watch_file("anything.bin"));
    }

    #[test]
    fn directory_entries_are_normalized() {
        assert_eq!(normalize_dir("./src/"), Some("src".to_string()));
        assert_eq!(normalize_dir("a\\b"), Some("a/b".to_string()));
        assert_eq!(normalize_dir("./"), Some(".".to_string()));
        assert_eq!(normalize_dir("  "), None);
    }
}
