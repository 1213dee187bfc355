// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`resolver`] picks the command for a changed file.
//! - [`backend`] provides the `ProcessController` trait and the shell-based
//!   `ShellProcessController` used in production; tests replace it with a
//!   fake that never spawns anything.
//! - [`supervisor`] owns the single running process and serializes every
//!   start/stop through one actor task.

pub mod backend;
pub mod resolver;
pub mod supervisor;

pub use backend::{
    ManagedProcess, OutputLine, OutputMode, OutputStream, ProcessController, ShellProcess,
    ShellProcessController,
};
pub use resolver::{CommandResolver, CommandRule};
pub use supervisor::{
    ExitOutcome, ProcessExit, ProcessSupervisor, StatsSnapshot, SupervisorHandle,
    SupervisorState,
};
