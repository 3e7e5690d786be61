// src/engine/dispatch.rs

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::engine::events::{AgentEvent, EventBus};
use crate::engine::queue::{RecipeId, RecipeQueue};
use crate::exec::{WorkerError, WorkerPool};
use crate::recipe::{next_due, Recipe, RecipeFault};

/// What happened to one queue entry in one sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Due time did not match the sweep minute.
    NotDue,
    /// Due, but no worker was free. The occurrence is lost.
    Dropped,
    /// Ran to completion; carries the recomputed due time.
    Completed { next_due: DateTime<Utc> },
    /// A step failed; the recipe now carries a fault.
    Failed(String),
    /// Shutdown was requested before the run, or a started run was aborted.
    Cancelled,
}

/// Per-entry evaluation: match, acquire, lock, run, unlock, reschedule.
///
/// Cheap to clone; one clone moves into every task a sweep spawns.
#[derive(Clone)]
pub struct Dispatcher {
    queue: Arc<RecipeQueue>,
    pool: Arc<dyn WorkerPool>,
    events: Arc<EventBus>,
    cancel: CancellationToken,
    abort: CancellationToken,
}

impl Dispatcher {
    pub fn new(
        queue: Arc<RecipeQueue>,
        pool: Arc<dyn WorkerPool>,
        events: Arc<EventBus>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            queue,
            pool,
            events,
            cancel,
            abort: CancellationToken::new(),
        }
    }

    /// Drop a started run (killing its current step) once `abort` fires.
    ///
    /// Without this, `cancel` only keeps later steps from starting.
    pub fn with_abort(mut self, abort: CancellationToken) -> Self {
        self.abort = abort;
        self
    }

    /// Evaluate `recipe` (a snapshot of entry `id`) against the truncated
    /// sweep time `now`.
    pub async fn evaluate(&self, id: RecipeId, recipe: Recipe, now: DateTime<Utc>) -> DispatchOutcome {
        if !recipe.is_due_at(now) {
            return DispatchOutcome::NotDue;
        }

        if self.cancel.is_cancelled() {
            debug!(recipe = %recipe.name, "shutdown requested; not dispatching");
            return DispatchOutcome::Cancelled;
        }

        let worker = match self.pool.acquire(&recipe) {
            Ok(worker) => worker,
            Err(err) => {
                warn!(recipe = %recipe.name, error = %err, due = %now, "no worker available; firing dropped");
                return DispatchOutcome::Dropped;
            }
        };

        self.events.publish(AgentEvent::Lock);
        info!(recipe = %recipe.name, "recipe is in progress");

        let result = tokio::select! {
            res = worker.run(self.cancel.clone()) => res,
            _ = self.abort.cancelled() => {
                warn!(recipe = %recipe.name, "run aborted");
                Err(WorkerError::Cancelled)
            }
        };

        self.events.publish(AgentEvent::Unlock);

        match result {
            Ok(()) => self.reschedule(id, &recipe, now),
            Err(WorkerError::Cancelled) => {
                info!(recipe = %recipe.name, "run cancelled");
                DispatchOutcome::Cancelled
            }
            Err(err) => {
                error!(recipe = %recipe.name, error = %err, "recipe run failed");
                let reason = err.to_string();
                self.queue.mark_failed(id, RecipeFault::RunFailed(reason.clone()));
                DispatchOutcome::Failed(reason)
            }
        }
    }

    fn reschedule(&self, id: RecipeId, recipe: &Recipe, trigger: DateTime<Utc>) -> DispatchOutcome {
        let Some(schedule) = recipe.schedule else {
            self.queue.mark_failed(id, RecipeFault::MissingSchedule);
            return DispatchOutcome::Failed(RecipeFault::MissingSchedule.to_string());
        };

        match next_due(&schedule, trigger) {
            Some(due) => {
                self.queue.reschedule(id, due);
                info!(recipe = %recipe.name, next_due = %due, "recipe completed");
                DispatchOutcome::Completed { next_due: due }
            }
            None => {
                let fault = RecipeFault::ScheduleOverflow(schedule);
                let reason = fault.to_string();
                self.queue.mark_failed(id, fault);
                DispatchOutcome::Failed(reason)
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("queue_len", &self.queue.len())
            .field("cancelled", &self.cancel.is_cancelled())
            .field("aborted", &self.abort.is_cancelled())
            .finish_non_exhaustive()
    }
}
