// src/recipe/loader.rs

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::recipe::model::{DefinitionKind, Recipe, RecipeFault, Schedule};
use crate::recipe::schedule::next_due;

/// A recipe source that could not be turned into a record at all.
///
/// Recipes that parse but are unusable are still returned, with
/// [`Recipe::fault`] set.
#[derive(Error, Debug)]
pub enum RecipeError {
    #[error("reading recipe {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("parsing recipe {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// On-disk shape of a recipe file. Unknown top-level keys are ignored.
#[derive(Debug, Deserialize)]
struct RecipeFile {
    #[serde(default)]
    name: Option<String>,
    definition: DefinitionKind,
    #[serde(default)]
    schedule: Option<Schedule>,
    #[serde(default)]
    steps: Vec<String>,
}

/// Read and parse a single recipe file.
///
/// `now` is the time the initial due time is computed from.
pub fn load_file(path: &Path, now: DateTime<Utc>) -> Result<Recipe, RecipeError> {
    let contents = fs::read_to_string(path).map_err(|source| RecipeError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_recipe(&contents, path, now)
}

/// Parse recipe YAML that was read from `path`.
pub fn parse_recipe(src: &str, path: &Path, now: DateTime<Utc>) -> Result<Recipe, RecipeError> {
    let raw: RecipeFile = serde_yaml::from_str(src).map_err(|source| RecipeError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let name = raw
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| file_stem(path));

    let mut recipe = Recipe {
        name,
        definition: raw.definition,
        schedule: raw.schedule,
        due: None,
        steps: raw.steps,
        path: path.to_path_buf(),
        fault: None,
    };

    if recipe.steps.is_empty() {
        recipe.fault = Some(RecipeFault::NoSteps);
    } else if recipe.is_schedule() {
        match recipe.schedule {
            None => recipe.fault = Some(RecipeFault::MissingSchedule),
            Some(schedule) => match next_due(&schedule, now) {
                Some(due) => recipe.due = Some(due),
                None => recipe.fault = Some(RecipeFault::ScheduleOverflow(schedule)),
            },
        }
    }

    if let Some(fault) = &recipe.fault {
        warn!(recipe = %recipe.name, path = ?path, %fault, "recipe loaded with fault");
    }

    Ok(recipe)
}

/// Parse every regular file in `dir`, in file-name order.
///
/// A file that fails to parse is logged and skipped. Only failing to read the
/// directory itself is an error.
pub fn load_all(dir: &Path, now: DateTime<Utc>) -> io::Result<Vec<Recipe>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut recipes = Vec::with_capacity(paths.len());
    for path in paths {
        match load_file(&path, now) {
            Ok(recipe) => {
                debug!(recipe = %recipe.name, kind = %recipe.definition, "loaded recipe");
                recipes.push(recipe);
            }
            Err(err) => error!(error = %err, "skipping recipe"),
        }
    }

    Ok(recipes)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
