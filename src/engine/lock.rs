// src/engine/lock.rs

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, error};

use crate::engine::events::{AgentEvent, EventBus};

/// Zero-length file whose presence means "the agent is busy".
///
/// Advisory only: nothing stops two processes from creating or removing it
/// at the same time. Both directions are idempotent.
#[derive(Debug, Clone)]
pub struct LockMarker {
    path: PathBuf,
}

impl LockMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_locked(&self) -> bool {
        self.path.exists()
    }

    pub fn lock(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        Ok(())
    }

    pub fn unlock(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Process-wide busy/idle state driven by `Lock`/`Unlock` events.
///
/// Runs overlap freely, so the marker file is created on the first `Lock`
/// and removed only when the last in-flight run publishes `Unlock`.
#[derive(Debug)]
pub struct LockState {
    marker: LockMarker,
    active: Mutex<usize>,
}

impl LockState {
    pub fn new(marker: LockMarker) -> Self {
        Self {
            marker,
            active: Mutex::new(0),
        }
    }

    pub fn marker(&self) -> &LockMarker {
        &self.marker
    }

    pub fn active_runs(&self) -> usize {
        *self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Subscribe this state to `Lock`/`Unlock` on `bus`.
    pub fn bind(self: &Arc<Self>, bus: &EventBus) {
        let state = Arc::clone(self);
        bus.subscribe(AgentEvent::Lock, move |_| state.on_lock());

        let state = Arc::clone(self);
        bus.subscribe(AgentEvent::Unlock, move |_| state.on_unlock());
    }

    pub fn on_lock(&self) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        *active += 1;
        if let Err(err) = self.marker.lock() {
            error!(path = ?self.marker.path(), error = %err, "failed to create lock marker");
        }
        debug!(active = *active, "agent locked");
    }

    pub fn on_unlock(&self) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        *active = active.saturating_sub(1);
        if *active == 0 {
            if let Err(err) = self.marker.unlock() {
                error!(path = ?self.marker.path(), error = %err, "failed to remove lock marker");
            }
        }
        debug!(active = *active, "agent unlocked");
    }
}
