// src/engine/mod.rs

//! Queue-and-scheduling engine.
//!
//! This module ties together:
//! - the recipe queue shared by the watcher and the scheduler
//! - the event bus that decouples dispatch from the busy/idle lock
//! - the lock state that mirrors "something is running" onto the filesystem
//! - the tick loop and the per-recipe dispatch path

pub mod dispatch;
pub mod events;
pub mod lock;
pub mod queue;
pub mod scheduler;

pub use dispatch::{DispatchOutcome, Dispatcher};
pub use events::{AgentEvent, EventBus};
pub use lock::{LockMarker, LockState};
pub use queue::{RecipeId, RecipeQueue};
pub use scheduler::{Scheduler, DEFAULT_TICK_INTERVAL};
