// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Deciding which directories and files matter ([`filter`]).
//! - Registering directories with the OS watcher, recursively and again
//!   whenever the tree changes shape ([`registry`], [`watcher`]).
//! - Swallowing the burst of events that follows a save ([`debounce`]).
//!
//! It does **not** know about processes; it only turns filesystem changes
//! into [`ChangeEvent`]s.

use std::path::PathBuf;
use std::time::Instant;

pub mod debounce;
pub mod filter;
pub mod path_utils;
pub mod registry;
pub mod watcher;

pub use debounce::{Debouncer, SettleEnd, Settled};
pub use filter::PathFilter;
pub use registry::{DirectoryRegistry, RescanReport};
pub use watcher::{NotifyBackend, WatchBackend};

/// One changed path reported by the notification backend.
///
/// Delivery is at-least-once and may be duplicated; the debouncer takes care
/// of bursts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub is_directory: bool,
    pub timestamp: Instant,
}

impl ChangeEvent {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            is_directory: false,
            timestamp: Instant::now(),
        }
    }

    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            is_directory: true,
            timestamp: Instant::now(),
        }
    }
}
