// src/engine/core.rs

//! Pure controller state machine.
//!
//! This module contains a synchronous, deterministic "core" that consumes
//! [`ControllerInput`]s and produces the list of commands the IO shell
//! should execute (rescan, restart, stop).
//!
//! The async shell (`engine::runtime::WatcherController`) is responsible for:
//! - reading filesystem events, process exits and the shutdown signal
//! - talking to the directory registry and the process supervisor
//! - debouncing after it acted
//!
//! The core has no channels, no Tokio types, and does no IO.

use crate::config::ConfigFile;
use crate::engine::ControllerInput;
use crate::engine::event_handlers::{
    ControllerCommand, CoreStep, handle_path_changed, handle_startup,
};
use crate::exec::resolver::CommandResolver;
use crate::watch::filter::PathFilter;

#[derive(Debug, Clone)]
pub struct ControllerCore {
    filter: PathFilter,
    resolver: CommandResolver,
    shutting_down: bool,
}

impl ControllerCore {
    pub fn new(filter: PathFilter, resolver: CommandResolver) -> Self {
        Self {
            filter,
            resolver,
            shutting_down: false,
        }
    }

    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self::new(
            PathFilter::from_config(&cfg.watch),
            CommandResolver::new(cfg.cmd.clone(), cfg.commands.clone()),
        )
    }

    pub fn filter(&self) -> &PathFilter {
        &self.filter
    }

    pub fn resolver(&self) -> &CommandResolver {
        &self.resolver
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    /// Handle a single input, updating core state and returning the
    /// resulting commands for the IO shell.
    ///
    /// Once shutdown has been requested every further input yields nothing,
    /// so no restart can be issued after it.
    pub fn step(&mut self, input: ControllerInput) -> CoreStep {
        if self.shutting_down {
            return CoreStep {
                commands: Vec::new(),
                keep_running: false,
            };
        }

        match input {
            ControllerInput::Startup => handle_startup(&self.resolver),
            ControllerInput::PathChanged { path, is_directory } => {
                handle_path_changed(&self.filter, &self.resolver, path, is_directory)
            }
            ControllerInput::ProcessExited => CoreStep::idle(),
            ControllerInput::ShutdownRequested => {
                self.shutting_down = true;
                CoreStep {
                    commands: vec![ControllerCommand::Stop],
                    keep_running: false,
                }
            }
        }
    }
}
