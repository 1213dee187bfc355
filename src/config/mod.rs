// src/config/mod.rs

//! Configuration loading and validation for gowatch.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate it into an immutable [`ConfigFile`] (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, resolve_root};
pub use model::{CommandOverride, ConfigFile, RawConfigFile, WatchSection};
