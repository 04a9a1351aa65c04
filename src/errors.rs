// src/errors.rs

//! Crate-wide error types.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DepwatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid entry pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure of the static resolver for a single file.
///
/// The graph treats the file as having no references for the pass that hit
/// the error; the next change to the file gets a fresh attempt.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Cannot read {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Cannot parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

impl ResolveError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ResolveError::Read { path, .. } | ResolveError::Parse { path, .. } => path,
        }
    }
}

/// Failure to establish or tear down a filesystem subscription.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Cannot watch path {path}: {reason}")]
    PathWatchFailed { path: PathBuf, reason: String },

    #[error("Failed to initialize watcher: {reason}")]
    InitFailed { reason: String },

    #[error("Watch backend already closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, DepwatchError>;
