// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Only configuration failures and startup registration failures are fatal;
//! the remaining variants are produced in steady state and logged by the
//! controller.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GowatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("cannot watch directory {path:?}: {message}")]
    RegistrationError { path: PathBuf, message: String },

    #[error("failed to start command `{command}`: {source}")]
    SpawnError {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to terminate process {pid}: {message}")]
    TerminationError { pid: u32, message: String },

    #[error("process supervisor is no longer running")]
    SupervisorGone,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GowatchError {
    pub(crate) fn registration(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        GowatchError::RegistrationError {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, GowatchError>;
