// src/lifecycle/mod.rs

//! Process lifecycle: PID persistence and the operator-facing stop flow.
//!
//! The running agent writes its PID on start. `stop` runs in a *different*
//! process (usually `recipe-agent stop`), reads that PID back, looks at the
//! busy marker, asks the operator what to do and then signals the agent.

pub mod pid;
pub mod stop;

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigFile;
use crate::engine::LockMarker;

pub use pid::PidFile;
pub use stop::{stop, Confirm, ProcessControl, StopSignal, SystemProcessControl, TerminalPrompt};

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("failed to write pid file {path:?}: {source}")]
    PidWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read pid file {path:?}: {source}")]
    PidRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("pid file {path:?} does not contain a valid pid: {contents:?}")]
    PidFormat { path: PathBuf, contents: String },

    #[error("process {pid} still running after {timeout:?}")]
    WaitTimeout { pid: u32, timeout: Duration },

    #[error("failed to send {signal} to process {pid}: {reason}")]
    Signal {
        pid: u32,
        signal: &'static str,
        reason: String,
    },

    #[error("process control is not supported on this platform")]
    Unsupported,
}

/// Command surface of an agent, as seen by whatever registers the
/// `start`/`stop` commands (the CLI in this crate).
pub trait AgentControl {
    /// Handle returned by a successful start.
    type Running;

    /// PID recorded by this agent's start, if it has started.
    fn pid(&self) -> Option<u32>;

    fn config(&self) -> &ConfigFile;

    fn start(&self) -> crate::Result<Self::Running>;

    /// Run the interactive stop flow against the agent recorded in this
    /// agent's PID file.
    fn stop_with(&self, prompt: &mut dyn Confirm, process: &mut dyn ProcessControl) -> StopSignal {
        let agent = &self.config().agent;
        stop(
            prompt,
            process,
            &PidFile::new(&agent.pid_file),
            &LockMarker::new(&agent.lock_file),
        )
    }
}
