use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use recipe_agent::exec::{PoolError, Worker, WorkerError, WorkerPool, WorkerRun};
use recipe_agent::recipe::Recipe;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

/// A worker pool that never touches the OS:
/// - at most `max` runs hold a slot at once, like the real pool
/// - every started run is recorded by recipe name
/// - recipes marked with [`failing`](Self::failing) fail their run
/// - when [`gated`](Self::gated), runs block until [`release`](Self::release);
///   like a shell step, a blocked run does not notice cancellation
#[derive(Clone)]
pub struct FakeWorkerPool {
    inner: Arc<Inner>,
}

struct Inner {
    max: usize,
    slots: Arc<Semaphore>,
    started: Mutex<Vec<String>>,
    finished: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    gate: Option<Arc<Semaphore>>,
}

impl FakeWorkerPool {
    pub fn new(max: usize) -> Self {
        Self::build(max, None)
    }

    /// Pool whose runs wait for [`release`](Self::release) before finishing.
    pub fn gated(max: usize) -> Self {
        Self::build(max, Some(Arc::new(Semaphore::new(0))))
    }

    fn build(max: usize, gate: Option<Arc<Semaphore>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                max,
                slots: Arc::new(Semaphore::new(max)),
                started: Mutex::new(Vec::new()),
                finished: Mutex::new(Vec::new()),
                failing: Mutex::new(HashSet::new()),
                gate,
            }),
        }
    }

    pub fn failing(self, name: &str) -> Self {
        self.inner.failing.lock().unwrap().insert(name.to_string());
        self
    }

    /// Let `n` gated runs finish.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.inner.gate {
            gate.add_permits(n);
        }
    }

    /// Names of recipes whose run has started, in start order.
    pub fn started(&self) -> Vec<String> {
        self.inner.started.lock().unwrap().clone()
    }

    /// Names of recipes whose run has returned (success or failure).
    pub fn finished(&self) -> Vec<String> {
        self.inner.finished.lock().unwrap().clone()
    }

    pub fn available(&self) -> usize {
        self.inner.slots.available_permits()
    }

    pub fn as_pool(&self) -> Arc<dyn WorkerPool> {
        Arc::new(self.clone())
    }
}

impl WorkerPool for FakeWorkerPool {
    fn acquire(&self, recipe: &Recipe) -> Result<Box<dyn Worker>, PoolError> {
        let permit = Arc::clone(&self.inner.slots)
            .try_acquire_owned()
            .map_err(|_| PoolError::Exhausted { max: self.inner.max })?;

        Ok(Box::new(FakeWorker {
            name: recipe.name.clone(),
            inner: Arc::clone(&self.inner),
            _permit: permit,
        }))
    }
}

struct FakeWorker {
    name: String,
    inner: Arc<Inner>,
    _permit: OwnedSemaphorePermit,
}

impl Worker for FakeWorker {
    fn run(self: Box<Self>, cancel: CancellationToken) -> WorkerRun {
        Box::pin(async move {
            if cancel.is_cancelled() {
                return Err(WorkerError::Cancelled);
            }

            self.inner.started.lock().unwrap().push(self.name.clone());

            if let Some(gate) = &self.inner.gate {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }

            self.inner.finished.lock().unwrap().push(self.name.clone());

            if self.inner.failing.lock().unwrap().contains(&self.name) {
                Err(WorkerError::StepFailed {
                    index: 0,
                    cmd: "fake".to_string(),
                    code: 1,
                })
            } else {
                Ok(())
            }
        })
    }
}
