// src/exec/pool.rs

//! Pluggable worker pool abstraction.
//!
//! The dispatcher talks to a `WorkerPool` instead of spawning processes
//! itself. Production uses [`ShellWorkerPool`]; tests can provide a pool that
//! records runs and completes them without touching the OS.

use std::collections::BTreeMap;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::exec::command::{expand_variables, run_step};
use crate::recipe::Recipe;

/// Future returned by [`Worker::run`].
pub type WorkerRun = Pin<Box<dyn Future<Output = Result<(), WorkerError>> + Send>>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("all {max} workers are busy")]
    Exhausted { max: usize },

    #[error("worker pool is closed")]
    Closed,
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("step {index} (`{cmd}`) exited with code {code}")]
    StepFailed { index: usize, cmd: String, code: i32 },

    #[error("running step {index} (`{cmd}`): {source}")]
    Io {
        index: usize,
        cmd: String,
        #[source]
        source: io::Error,
    },

    #[error("run cancelled")]
    Cancelled,
}

/// One acquired execution slot, bound to a recipe.
///
/// The slot is released when the worker (or the future returned by `run`)
/// is dropped.
pub trait Worker: Send {
    /// Run every step of the recipe in order, stopping at the first failure.
    ///
    /// Implementations check `cancel` before each step and let a step that
    /// already started finish.
    fn run(self: Box<Self>, cancel: CancellationToken) -> WorkerRun;
}

/// Bounded source of workers.
pub trait WorkerPool: Send + Sync {
    /// Try to take a free slot for `recipe`. Never waits.
    fn acquire(&self, recipe: &Recipe) -> Result<Box<dyn Worker>, PoolError>;
}

/// Production pool: at most `max` recipes run at once, each step as a shell
/// command with `[variables]` substituted in.
#[derive(Debug, Clone)]
pub struct ShellWorkerPool {
    slots: Arc<Semaphore>,
    max: usize,
    variables: Arc<BTreeMap<String, String>>,
}

impl ShellWorkerPool {
    pub fn new(max: usize, variables: BTreeMap<String, String>) -> Self {
        let max = max.max(1);
        Self {
            slots: Arc::new(Semaphore::new(max)),
            max,
            variables: Arc::new(variables),
        }
    }

    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }
}

impl WorkerPool for ShellWorkerPool {
    fn acquire(&self, recipe: &Recipe) -> Result<Box<dyn Worker>, PoolError> {
        let permit = Arc::clone(&self.slots)
            .try_acquire_owned()
            .map_err(|e| match e {
                TryAcquireError::NoPermits => PoolError::Exhausted { max: self.max },
                TryAcquireError::Closed => PoolError::Closed,
            })?;

        debug!(recipe = %recipe.name, free = self.available(), "worker acquired");

        Ok(Box::new(ShellWorker {
            _permit: permit,
            recipe: recipe.name.clone(),
            steps: recipe.steps.clone(),
            variables: Arc::clone(&self.variables),
        }))
    }
}

struct ShellWorker {
    _permit: OwnedSemaphorePermit,
    recipe: String,
    steps: Vec<String>,
    variables: Arc<BTreeMap<String, String>>,
}

impl Worker for ShellWorker {
    fn run(self: Box<Self>, cancel: CancellationToken) -> WorkerRun {
        Box::pin(async move {
            let worker = *self;

            for (index, step) in worker.steps.iter().enumerate() {
                if cancel.is_cancelled() {
                    info!(recipe = %worker.recipe, step = index, "cancelled before step");
                    return Err(WorkerError::Cancelled);
                }
                let cmd = expand_variables(step, &worker.variables);
                run_step(&worker.recipe, index, &cmd).await?;
            }

            info!(recipe = %worker.recipe, steps = worker.steps.len(), "recipe finished");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::recipe::{DefinitionKind, Schedule};

    fn recipe(steps: &[&str]) -> Recipe {
        Recipe {
            name: "t".into(),
            definition: DefinitionKind::Schedule,
            schedule: Some(Schedule::default()),
            due: None,
            steps: steps.iter().map(|s| s.to_string()).collect(),
            path: PathBuf::from("t.yml"),
            fault: None,
        }
    }

    #[test]
    fn pool_is_bounded_and_slots_come_back_on_drop() {
        let pool = ShellWorkerPool::new(2, BTreeMap::new());
        let r = recipe(&["true"]);

        let a = pool.acquire(&r).unwrap();
        let _b = pool.acquire(&r).unwrap();
        assert!(matches!(pool.acquire(&r), Err(PoolError::Exhausted { max: 2 })));

        drop(a);
        assert!(pool.acquire(&r).is_ok());
    }

    #[test]
    fn zero_sized_pool_still_has_one_slot() {
        let pool = ShellWorkerPool::new(0, BTreeMap::new());
        assert_eq!(pool.available(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_step_stops_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("after");
        let pool = ShellWorkerPool::new(1, BTreeMap::new());
        let touch = format!("touch {}", marker.display());
        let r = recipe(&["true", "exit 3", touch.as_str()]);

        let err = pool
            .acquire(&r)
            .unwrap()
            .run(CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, WorkerError::StepFailed { index: 1, code: 3, .. }));
        assert!(!marker.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn variables_reach_the_shell() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");
        let mut vars = BTreeMap::new();
        vars.insert("greeting".to_string(), "hello".to_string());
        let pool = ShellWorkerPool::new(1, vars);
        let step = format!("echo $greeting > {}", out.display());

        pool.acquire(&recipe(&[step.as_str()]))
            .unwrap()
            .run(CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(out).unwrap().trim(), "hello");
    }

    #[tokio::test]
    async fn cancelled_token_skips_all_steps() {
        let pool = ShellWorkerPool::new(1, BTreeMap::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = pool
            .acquire(&recipe(&["true"]))
            .unwrap()
            .run(cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Cancelled));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cancel_mid_step_finishes_the_step_and_skips_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        let pool = ShellWorkerPool::new(1, BTreeMap::new());
        let slow = format!("sleep 0.3 && touch {}", first.display());
        let next = format!("touch {}", second.display());
        let r = recipe(&[slow.as_str(), next.as_str()]);

        let cancel = CancellationToken::new();
        let run = tokio::spawn(pool.acquire(&r).unwrap().run(cancel.clone()));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        cancel.cancel();

        let err = run.await.unwrap().unwrap_err();
        assert!(matches!(err, WorkerError::Cancelled));
        assert!(first.exists());
        assert!(!second.exists());
    }
}
