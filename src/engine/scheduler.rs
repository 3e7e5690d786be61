// src/engine/scheduler.rs

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::engine::dispatch::{DispatchOutcome, Dispatcher};
use crate::engine::queue::RecipeQueue;
use crate::recipe::truncate_to_minute;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(60);

/// Fixed-interval sweep loop over the recipe queue.
///
/// Each sweep fans out one task per dispatchable entry and returns without
/// waiting for them. Tasks of the same sweep are not ordered relative to
/// each other.
#[derive(Debug)]
pub struct Scheduler {
    queue: Arc<RecipeQueue>,
    dispatcher: Dispatcher,
    tracker: TaskTracker,
    cancel: CancellationToken,
    interval: Duration,
}

impl Scheduler {
    pub fn new(
        queue: Arc<RecipeQueue>,
        dispatcher: Dispatcher,
        tracker: TaskTracker,
        cancel: CancellationToken,
        interval: Duration,
    ) -> Self {
        Self {
            queue,
            dispatcher,
            tracker,
            cancel,
            interval,
        }
    }

    /// Run one sweep for wall-clock time `now`.
    ///
    /// Entries with a fault get no task at all. The returned handles may be
    /// dropped; the tasks keep running.
    pub fn sweep(&self, now: DateTime<Utc>) -> Vec<JoinHandle<DispatchOutcome>> {
        let minute = truncate_to_minute(now);

        let handles: Vec<JoinHandle<DispatchOutcome>> = self
            .queue
            .snapshot()
            .into_iter()
            .filter(|(_, recipe)| recipe.is_dispatchable())
            .map(|(id, recipe)| {
                let dispatcher = self.dispatcher.clone();
                self.tracker
                    .spawn(async move { dispatcher.evaluate(id, recipe, minute).await })
            })
            .collect();

        debug!(minute = %minute, candidates = handles.len(), "sweep dispatched");
        handles
    }

    /// Sweep, sleep `interval`, repeat, until cancelled.
    ///
    /// The sleep is not shortened by however long spawning took.
    pub async fn run(self) {
        info!(interval = ?self.interval, queued = self.queue.len(), "scheduler started");

        loop {
            let _detached = self.sweep(Utc::now());

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!("scheduler stopped");
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
