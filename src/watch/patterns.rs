// src/watch/patterns.rs

use std::fmt;
use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};

/// Compiled file-name patterns that mark a file as a recipe.
///
/// Patterns are matched against the file name only, not the full path, so
/// `*.yml` matches `/etc/agent/recipes/backup.yml`.
#[derive(Clone)]
pub struct RecipePatterns {
    patterns: Vec<String>,
    set: GlobSet,
}

impl RecipePatterns {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, globset::Error> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(Glob::new(pattern.as_ref())?);
        }

        Ok(Self {
            patterns: patterns.iter().map(|p| p.as_ref().to_string()).collect(),
            set: builder.build()?,
        })
    }

    pub fn matches(&self, path: &Path) -> bool {
        path.file_name()
            .map(|name| self.set.is_match(name))
            .unwrap_or(false)
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl fmt::Debug for RecipePatterns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecipePatterns")
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}
