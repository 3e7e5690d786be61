// src/errors.rs

//! Crate-wide error types.
//!
//! Each subsystem keeps its own narrow error enum next to the code that
//! produces it (`RecipeError`, `PoolError`, `WorkerError`, ...). `AgentError`
//! is what `Agent::start` surfaces: the fatal startup failures.

use std::path::PathBuf;

use thiserror::Error;

pub use crate::exec::{PoolError, WorkerError};
pub use crate::lifecycle::LifecycleError;
pub use crate::recipe::RecipeError;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("failed to remove stale lock marker {path:?}: {source}")]
    StaleLock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("failed to read recipe directory {path:?}: {source}")]
    RecipeDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid recipe pattern: {0}")]
    Pattern(#[from] globset::Error),

    #[error("failed to watch recipe directory: {0}")]
    Watcher(#[from] notify::Error),

    #[error("agent already started")]
    AlreadyStarted,
}

pub type Result<T> = std::result::Result<T, AgentError>;
