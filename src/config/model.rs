// src/config/model.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Extra time `stop` waits on top of the agent's shutdown grace, so a
/// shutdown that uses its whole grace is not mistaken for a hang.
pub const STOP_WAIT_MARGIN: Duration = Duration::from_secs(5);

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [agent]
/// recipes_path = "recipes"
/// pid_file = "run/agent.pid"
/// lock_file = "run/agent.lock"
/// max_allowed_workers = 5
///
/// [variables]
/// data_dir = "/srv/data"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub agent: AgentSection,

    /// Values substituted into recipe steps as `$name` / `${name}`.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

/// `[agent]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSection {
    /// Directory scanned at startup and watched for new recipes.
    pub recipes_path: PathBuf,

    /// Where the running agent records its process id.
    #[serde(default = "default_pid_file")]
    pub pid_file: PathBuf,

    /// Zero-length marker present while a recipe runs.
    #[serde(default = "default_lock_file")]
    pub lock_file: PathBuf,

    /// Upper bound on recipes running at the same time.
    #[serde(default = "default_max_allowed_workers")]
    pub max_allowed_workers: usize,

    /// Seconds between scheduler sweeps.
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,

    /// How long shutdown waits for in-flight runs before killing them.
    /// `stop` waits this long plus [`STOP_WAIT_MARGIN`] for the exit.
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,

    /// File-name globs that mark a newly created file as a recipe.
    #[serde(default = "default_recipe_patterns")]
    pub recipe_patterns: Vec<String>,
}

fn default_pid_file() -> PathBuf {
    PathBuf::from("recipe-agent.pid")
}

fn default_lock_file() -> PathBuf {
    PathBuf::from("recipe-agent.lock")
}

fn default_max_allowed_workers() -> usize {
    5
}

fn default_tick_interval_secs() -> u64 {
    60
}

fn default_stop_timeout_secs() -> u64 {
    30
}

fn default_recipe_patterns() -> Vec<String> {
    vec!["*.yml".to_string(), "*.yaml".to_string()]
}

impl AgentSection {
    /// Section with every optional field at its default.
    pub fn with_recipes_path(recipes_path: impl Into<PathBuf>) -> Self {
        Self {
            recipes_path: recipes_path.into(),
            pid_file: default_pid_file(),
            lock_file: default_lock_file(),
            max_allowed_workers: default_max_allowed_workers(),
            tick_interval_secs: default_tick_interval_secs(),
            stop_timeout_secs: default_stop_timeout_secs(),
            recipe_patterns: default_recipe_patterns(),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    /// How long `stop` waits for the agent process to exit.
    pub fn stop_wait(&self) -> Duration {
        self.stop_timeout() + STOP_WAIT_MARGIN
    }
}

impl ConfigFile {
    pub fn new(agent: AgentSection) -> Self {
        Self {
            agent,
            variables: BTreeMap::new(),
        }
    }

    /// Make every relative path in the config relative to `base` instead of
    /// the current working directory.
    pub fn anchor_paths(&mut self, base: &Path) {
        for path in [
            &mut self.agent.recipes_path,
            &mut self.agent.pid_file,
            &mut self.agent.lock_file,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}
