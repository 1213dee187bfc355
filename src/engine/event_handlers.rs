// src/engine/event_handlers.rs

//! Event handling logic for the controller core.

use tracing::trace;

use crate::exec::resolver::CommandResolver;
use crate::watch::filter::PathFilter;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerCommand {
    /// Re-walk the tree from the root and register new directories.
    Rescan,
    /// Stop whatever is running (joined), then start `command`.
    Restart {
        command: String,
        /// Root-relative path of the file that caused it; `None` at startup.
        trigger: Option<String>,
    },
    /// Stop whatever is running (joined).
    Stop,
}

/// Decision returned by the core after handling a single `ControllerInput`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreStep {
    pub commands: Vec<ControllerCommand>,
    /// Whether the outer loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    pub(crate) fn idle() -> Self {
        Self {
            commands: Vec::new(),
            keep_running: true,
        }
    }

    pub(crate) fn one(command: ControllerCommand) -> Self {
        Self {
            commands: vec![command],
            keep_running: true,
        }
    }
}

pub fn handle_startup(resolver: &CommandResolver) -> CoreStep {
    CoreStep::one(ControllerCommand::Restart {
        command: resolver.default_command().to_string(),
        trigger: None,
    })
}

/// Handle one changed path.
///
/// - Directories change the shape of the tree: rescan, never restart.
/// - Files restart only when the filter accepts them.
pub fn handle_path_changed(
    filter: &PathFilter,
    resolver: &CommandResolver,
    path: String,
    is_directory: bool,
) -> CoreStep {
    if is_directory {
        return CoreStep::one(ControllerCommand::Rescan);
    }

    if !filter.should_watch_file(&path) {
        trace!(file = %path, "change ignored by file rules");
        return CoreStep::idle();
    }

    let command = resolver.resolve(&path).to_string();
    CoreStep::one(ControllerCommand::Restart {
        command,
        trigger: Some(path),
    })
}
