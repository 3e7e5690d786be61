// src/recipe/mod.rs

//! Recipe records and how they are read from disk.
//!
//! - [`model`] defines the in-memory `Recipe` record the engine works with.
//! - [`schedule`] is the pure resolver turning a schedule interval and a
//!   trigger time into the next due time.
//! - [`loader`] parses YAML recipe files, one at a time or a whole directory.

pub mod loader;
pub mod model;
pub mod schedule;

pub use loader::{load_all, load_file, parse_recipe, RecipeError};
pub use model::{DefinitionKind, Recipe, RecipeFault, Schedule};
pub use schedule::{next_due, truncate_to_minute};
