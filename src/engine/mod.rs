// src/engine/mod.rs

//! Orchestration engine for gowatch.
//!
//! This module ties together:
//! - the directory registry (initial registration and rescans)
//! - the process supervisor (stop old, start new)
//! - the main event loop that reacts to:
//!   - filesystem changes
//!   - natural process exits
//!   - shutdown signals
//!
//! The pure decision core lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`]. Signal wiring is in [`shutdown`].

/// Inputs flowing into the controller core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerInput {
    /// The loop is starting; run the default command once.
    Startup,
    /// A path under the root changed. `path` is root-relative and
    /// `/`-separated.
    PathChanged { path: String, is_directory: bool },
    /// The running process ended on its own.
    ProcessExited,
    /// Shutdown was requested (signal, or the event source closed).
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod runtime;
pub mod shutdown;

pub use self::core::ControllerCore;
pub use event_handlers::{ControllerCommand, CoreStep};
pub use runtime::WatcherController;
pub use shutdown::{ShutdownSignal, ShutdownTrigger, shutdown_channel, spawn_signal_listener};
