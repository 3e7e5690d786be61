// src/exec/mod.rs

//! Recipe execution layer.
//!
//! - [`pool`] defines the acquire/run contract the dispatcher talks to, and
//!   the bounded production pool behind it.
//! - [`command`] runs a single step as a shell process via
//!   `tokio::process::Command`.

pub mod command;
pub mod pool;

pub use command::expand_variables;
pub use pool::{PoolError, ShellWorkerPool, Worker, WorkerError, WorkerPool, WorkerRun};
