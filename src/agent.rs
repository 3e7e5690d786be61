// src/agent.rs

//! The agent: one explicitly constructed value owning the queue, the event
//! bus, the busy/idle lock and the worker pool.
//!
//! `Agent::start` performs the startup sequence and hands back a
//! [`RunningAgent`], which is what the caller keeps around until shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::config::ConfigFile;
use crate::engine::{AgentEvent, Dispatcher, EventBus, LockMarker, LockState, RecipeQueue, Scheduler};
use crate::errors::{AgentError, Result};
use crate::exec::{ShellWorkerPool, WorkerPool};
use crate::lifecycle::{AgentControl, PidFile};
use crate::recipe::load_all;
use crate::watch::{spawn_watcher, RecipePatterns, WatcherHandle};

pub struct Agent {
    config: ConfigFile,
    queue: Arc<RecipeQueue>,
    events: Arc<EventBus>,
    lock: Arc<LockState>,
    pool: Arc<dyn WorkerPool>,
    pid_file: PidFile,
    patterns: RecipePatterns,
    cancel: CancellationToken,
    abort: CancellationToken,
    tracker: TaskTracker,
    pid: OnceLock<u32>,
    started: AtomicBool,
}

impl Agent {
    /// Agent running recipe steps through a [`ShellWorkerPool`] sized and
    /// seeded from `config`.
    pub fn new(config: ConfigFile) -> Result<Self> {
        let pool = ShellWorkerPool::new(config.agent.max_allowed_workers, config.variables.clone());
        Self::with_pool(config, Arc::new(pool))
    }

    /// Agent with a caller-supplied worker pool.
    pub fn with_pool(config: ConfigFile, pool: Arc<dyn WorkerPool>) -> Result<Self> {
        let patterns = RecipePatterns::new(&config.agent.recipe_patterns)?;

        let events = Arc::new(EventBus::new());
        let lock = Arc::new(LockState::new(LockMarker::new(&config.agent.lock_file)));
        lock.bind(&events);

        Ok(Self {
            pid_file: PidFile::new(&config.agent.pid_file),
            config,
            queue: Arc::new(RecipeQueue::new()),
            events,
            lock,
            pool,
            patterns,
            cancel: CancellationToken::new(),
            abort: CancellationToken::new(),
            tracker: TaskTracker::new(),
            pid: OnceLock::new(),
            started: AtomicBool::new(false),
        })
    }

    pub fn queue(&self) -> &Arc<RecipeQueue> {
        &self.queue
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn lock_state(&self) -> &Arc<LockState> {
        &self.lock
    }

    pub fn pid_file(&self) -> &PidFile {
        &self.pid_file
    }

    /// Token cancelled by [`RunningAgent::shutdown`]; every dispatch task
    /// and the watch loop observe it.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    fn start_inner(&self) -> Result<RunningAgent> {
        let agent = &self.config.agent;
        let marker = self.lock.marker();

        marker.unlock().map_err(|source| AgentError::StaleLock {
            path: marker.path().to_path_buf(),
            source,
        })?;

        let pid = self.pid_file.write_pid()?;
        // Only one start can get here, so the cell is always empty.
        let _ = self.pid.set(pid);

        let recipes = load_all(&agent.recipes_path, Utc::now()).map_err(|source| {
            AgentError::RecipeDir {
                path: agent.recipes_path.clone(),
                source,
            }
        })?;
        let loaded = recipes.len();
        let queued = self.queue.extend(recipes);
        info!(dir = ?agent.recipes_path, loaded, queued, "recipes loaded");

        let watcher = spawn_watcher(
            &agent.recipes_path,
            self.patterns.clone(),
            Arc::clone(&self.queue),
            self.cancel.clone(),
        )?;

        let dispatcher = Dispatcher::new(
            Arc::clone(&self.queue),
            Arc::clone(&self.pool),
            Arc::clone(&self.events),
            self.cancel.clone(),
        )
        .with_abort(self.abort.clone());
        let ticker = Scheduler::new(
            Arc::clone(&self.queue),
            dispatcher,
            self.tracker.clone(),
            self.cancel.clone(),
            agent.tick_interval(),
        )
        .spawn();

        self.events.publish(AgentEvent::Ready);
        info!(pid, "agent ready");

        Ok(RunningAgent {
            pid,
            cancel: self.cancel.clone(),
            abort: self.abort.clone(),
            tracker: self.tracker.clone(),
            ticker,
            lock: Arc::clone(&self.lock),
            _watcher: watcher,
        })
    }
}

impl AgentControl for Agent {
    type Running = RunningAgent;

    fn pid(&self) -> Option<u32> {
        self.pid.get().copied()
    }

    fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Run the startup sequence. Must be called from within a Tokio runtime.
    ///
    /// Clears a stale busy marker, records the PID, loads the recipe
    /// directory into the queue, starts the watcher and the scheduler, then
    /// publishes `Ready`. An agent starts at most once.
    fn start(&self) -> Result<RunningAgent> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(AgentError::AlreadyStarted);
        }

        let res = self.start_inner();
        if res.is_err() {
            self.started.store(false, Ordering::SeqCst);
        }
        res
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("recipes_path", &self.config.agent.recipes_path)
            .field("queued", &self.queue.len())
            .field("pid", &self.pid.get())
            .finish_non_exhaustive()
    }
}

/// A started agent. Dropping it without calling [`shutdown`](Self::shutdown)
/// leaves the background tasks running until the runtime ends.
#[derive(Debug)]
pub struct RunningAgent {
    pid: u32,
    cancel: CancellationToken,
    abort: CancellationToken,
    tracker: TaskTracker,
    ticker: JoinHandle<()>,
    lock: Arc<LockState>,
    _watcher: WatcherHandle,
}

impl RunningAgent {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Number of dispatch tasks that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Stop sweeping and watching, wait up to `grace` for in-flight runs,
    /// then clear the busy marker.
    ///
    /// Runs that started keep going through their current step; no new
    /// step starts. Runs still going when `grace` ends are aborted and
    /// their step processes killed.
    ///
    /// Returns `true` when every in-flight run finished within `grace`.
    pub async fn shutdown(self, grace: Duration) -> bool {
        info!("agent shutting down");
        self.cancel.cancel();

        if let Err(err) = self.ticker.await {
            warn!(error = %err, "scheduler task ended abnormally");
        }

        self.tracker.close();
        let drained = tokio::time::timeout(grace, self.tracker.wait()).await.is_ok();
        if !drained {
            warn!(in_flight = self.tracker.len(), ?grace, "grace period over; aborting in-flight runs");
            self.abort.cancel();
            self.tracker.wait().await;
        }

        let marker = self.lock.marker();
        if let Err(err) = marker.unlock() {
            warn!(path = ?marker.path(), error = %err, "failed to clear lock marker");
        }

        info!("agent stopped");
        drained
    }
}
