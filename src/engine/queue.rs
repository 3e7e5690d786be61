// src/engine/queue.rs

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::recipe::{Recipe, RecipeFault};

/// Stable handle to a queue entry. Entries are never removed, so the index
/// stays valid for the lifetime of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecipeId(usize);

impl RecipeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Ordered collection of schedule recipes awaiting evaluation.
///
/// Writers (startup load, watcher appends, dispatch updates) take the write
/// lock; the scheduler copies the entries out under the read lock, so a sweep
/// never sees a half-applied append.
#[derive(Debug, Default)]
pub struct RecipeQueue {
    entries: RwLock<Vec<Recipe>>,
}

impl RecipeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a recipe. Returns `None` (and leaves the queue untouched) for
    /// anything that is not a schedule recipe.
    pub fn push(&self, recipe: Recipe) -> Option<RecipeId> {
        if !recipe.is_schedule() {
            debug!(recipe = %recipe.name, kind = %recipe.definition, "not a schedule recipe; not queued");
            return None;
        }

        let mut entries = self.write();
        entries.push(recipe);
        Some(RecipeId(entries.len() - 1))
    }

    /// Bulk append, keeping only schedule recipes. Returns how many were queued.
    pub fn extend(&self, recipes: impl IntoIterator<Item = Recipe>) -> usize {
        let scheduled: Vec<Recipe> = recipes.into_iter().filter(Recipe::is_schedule).collect();
        let added = scheduled.len();
        self.write().extend(scheduled);
        added
    }

    pub fn snapshot(&self) -> Vec<(RecipeId, Recipe)> {
        self.read()
            .iter()
            .enumerate()
            .map(|(i, r)| (RecipeId(i), r.clone()))
            .collect()
    }

    pub fn get(&self, id: RecipeId) -> Option<Recipe> {
        self.read().get(id.0).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Set the next due time of an entry. Returns false for an unknown id.
    pub fn reschedule(&self, id: RecipeId, due: DateTime<Utc>) -> bool {
        match self.write().get_mut(id.0) {
            Some(recipe) => {
                debug!(recipe = %recipe.name, %due, "recipe rescheduled");
                recipe.due = Some(due);
                true
            }
            None => false,
        }
    }

    /// Attach a fault to an entry, excluding it from every later sweep.
    ///
    /// The first fault wins; later ones are ignored.
    pub fn mark_failed(&self, id: RecipeId, fault: RecipeFault) -> bool {
        match self.write().get_mut(id.0) {
            Some(recipe) if recipe.fault.is_none() => {
                warn!(recipe = %recipe.name, %fault, "recipe excluded from scheduling");
                recipe.fault = Some(fault);
                true
            }
            _ => false,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Recipe>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Recipe>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::recipe::{DefinitionKind, Schedule};

    fn recipe(name: &str, definition: DefinitionKind) -> Recipe {
        Recipe {
            name: name.into(),
            definition,
            schedule: Some(Schedule::new(0, 0, 1)),
            due: None,
            steps: vec!["true".into()],
            path: PathBuf::from(format!("{name}.yml")),
            fault: None,
        }
    }

    #[test]
    fn hook_recipes_are_never_queued() {
        let q = RecipeQueue::new();
        assert!(q.push(recipe("h", DefinitionKind::Hook)).is_none());

        let added = q.extend(vec![
            recipe("a", DefinitionKind::Schedule),
            recipe("h2", DefinitionKind::Hook),
            recipe("b", DefinitionKind::Schedule),
        ]);

        assert_eq!(added, 2);
        let names: Vec<String> = q.snapshot().into_iter().map(|(_, r)| r.name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn ids_follow_insertion_order() {
        let q = RecipeQueue::new();
        q.extend(vec![recipe("a", DefinitionKind::Schedule)]);
        let id = q.push(recipe("b", DefinitionKind::Schedule)).unwrap();
        assert_eq!(id.index(), 1);
        assert_eq!(q.get(id).unwrap().name, "b");
    }

    #[test]
    fn first_fault_sticks() {
        let q = RecipeQueue::new();
        let id = q.push(recipe("a", DefinitionKind::Schedule)).unwrap();

        assert!(q.mark_failed(id, RecipeFault::RunFailed("boom".into())));
        assert!(!q.mark_failed(id, RecipeFault::NoSteps));
        assert_eq!(q.get(id).unwrap().fault, Some(RecipeFault::RunFailed("boom".into())));
    }

    #[test]
    fn unknown_ids_are_rejected() {
        let q = RecipeQueue::new();
        assert!(!q.reschedule(RecipeId(3), Utc::now()));
        assert!(!q.mark_failed(RecipeId(3), RecipeFault::NoSteps));
    }
}
