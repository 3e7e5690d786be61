// src/watch/mod.rs

//! Recipe directory watching.
//!
//! This module is responsible for:
//! - Compiling the recipe file-name patterns (`*.yml` by default).
//! - Wiring up a filesystem watcher (`notify`) on the recipe directory.
//! - Parsing recipe files created in or moved into the directory and appending schedule recipes to
//!   the queue.
//!
//! It does **not** know about sweeps or dispatch; it only feeds the queue.

pub mod patterns;
pub mod watcher;

pub use patterns::RecipePatterns;
pub use watcher::{run_intake, spawn_watcher, WatcherHandle};
