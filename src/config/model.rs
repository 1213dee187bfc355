// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::exec::resolver::CommandRule;
use crate::types::HumanDuration;

/// Debounce window used when `delay` is not set.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(50);

/// How long `stop()` waits for a killed process to be reaped when
/// `kill_timeout` is not set.
pub const DEFAULT_KILL_TIMEOUT: Duration = Duration::from_secs(5);

/// Top-level configuration exactly as read from a TOML file.
///
/// ```toml
/// root = "."
/// cmd = "go run ."
/// delay = "50ms"
///
/// [watch]
/// include_files = [".go"]
/// exclude_dirs = [".git", "vendor"]
///
/// [command.".css"]
/// cmd = "npm run css"
/// ```
///
/// Everything except `cmd` is optional. Use [`ConfigFile`] (obtained through
/// `TryFrom`) everywhere else; it is the validated form.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Directory to watch. Relative paths are resolved against the directory
    /// that contains the config file.
    #[serde(default = "default_root")]
    pub root: String,

    /// Command run at startup and whenever no `[command]` override matches.
    #[serde(default)]
    pub cmd: String,

    /// Debounce window after acting on an event.
    #[serde(default)]
    pub delay: Option<HumanDuration>,

    /// Upper bound on waiting for a killed process to disappear.
    #[serde(default)]
    pub kill_timeout: Option<HumanDuration>,

    /// `[watch]` include/exclude rules.
    #[serde(default)]
    pub watch: WatchSection,

    /// `[command."<suffix>"]` overrides, in declaration order.
    ///
    /// Each value is either a table with a `cmd` key or a bare string.
    #[serde(default)]
    pub command: toml::Table,
}

fn default_root() -> String {
    ".".to_string()
}

impl Default for RawConfigFile {
    fn default() -> Self {
        Self {
            root: default_root(),
            cmd: String::new(),
            delay: None,
            kill_timeout: None,
            watch: WatchSection::default(),
            command: toml::Table::new(),
        }
    }
}

/// `[watch]` section.
///
/// Include lists, when non-empty, take precedence over the matching exclude
/// list. Files match by suffix, directories by exact root-relative path.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct WatchSection {
    #[serde(default)]
    pub include_files: Vec<String>,

    #[serde(default)]
    pub exclude_files: Vec<String>,

    #[serde(default)]
    pub include_dirs: Vec<String>,

    #[serde(default)]
    pub exclude_dirs: Vec<String>,
}

/// Table form of a `[command."<suffix>"]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandOverride {
    pub cmd: String,
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub root: PathBuf,
    pub cmd: String,
    pub delay: Duration,
    pub kill_timeout: Duration,
    pub watch: WatchSection,
    pub commands: Vec<CommandRule>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        root: PathBuf,
        cmd: String,
        delay: Duration,
        kill_timeout: Duration,
        watch: WatchSection,
        commands: Vec<CommandRule>,
    ) -> Self {
        Self {
            root,
            cmd,
            delay,
            kill_timeout,
            watch,
            commands,
        }
    }
}
