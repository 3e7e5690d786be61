use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use recipe_agent::config::{AgentSection, ConfigFile};
use recipe_agent::recipe::{next_due, DefinitionKind, Recipe, RecipeFault, Schedule};

/// Builder for in-memory `Recipe`s and their YAML form.
#[derive(Debug, Clone)]
pub struct RecipeBuilder {
    name: String,
    definition: DefinitionKind,
    schedule: Option<Schedule>,
    due: Option<DateTime<Utc>>,
    steps: Vec<String>,
    fault: Option<RecipeFault>,
}

impl RecipeBuilder {
    /// A `schedule` recipe with a one-minute interval and one `true` step.
    pub fn schedule(name: &str) -> Self {
        Self {
            name: name.to_string(),
            definition: DefinitionKind::Schedule,
            schedule: Some(Schedule::new(0, 0, 1)),
            due: None,
            steps: vec!["true".to_string()],
            fault: None,
        }
    }

    /// A `hook` recipe: never queued.
    pub fn hook(name: &str) -> Self {
        Self {
            definition: DefinitionKind::Hook,
            schedule: None,
            ..Self::schedule(name)
        }
    }

    pub fn every(mut self, day: u32, hour: u32, min: u32) -> Self {
        self.schedule = Some(Schedule::new(day, hour, min));
        self
    }

    pub fn without_schedule(mut self) -> Self {
        self.schedule = None;
        self
    }

    pub fn due(mut self, due: DateTime<Utc>) -> Self {
        self.due = Some(due);
        self
    }

    /// Replace the default step list.
    pub fn steps(mut self, steps: &[&str]) -> Self {
        self.steps = steps.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn fault(mut self, fault: RecipeFault) -> Self {
        self.fault = Some(fault);
        self
    }

    /// Build the record directly. When no due time was set, a schedule
    /// recipe gets one computed from `Utc::now()`.
    pub fn build(self) -> Recipe {
        let due = match (self.due, self.schedule, self.definition) {
            (Some(due), _, _) => Some(due),
            (None, Some(schedule), DefinitionKind::Schedule) if self.fault.is_none() => {
                next_due(&schedule, Utc::now())
            }
            _ => None,
        };

        Recipe {
            path: PathBuf::from(format!("{}.yml", self.name)),
            name: self.name,
            definition: self.definition,
            schedule: self.schedule,
            due,
            steps: self.steps,
            fault: self.fault,
        }
    }

    /// Render as a recipe file body.
    pub fn to_yaml(&self) -> String {
        let mut out = format!("name: {}\ndefinition: {}\n", self.name, self.definition);
        if let Some(s) = self.schedule {
            out.push_str(&format!(
                "schedule:\n  day: {}\n  hour: {}\n  min: {}\n",
                s.day, s.hour, s.min
            ));
        }
        if self.steps.is_empty() {
            out.push_str("steps: []\n");
        } else {
            out.push_str("steps:\n");
            for step in &self.steps {
                out.push_str(&format!("  - {step:?}\n"));
            }
        }
        out
    }

    /// Write `<dir>/<name>.yml` and return its path.
    pub fn write_to(&self, dir: &Path) -> PathBuf {
        let path = dir.join(format!("{}.yml", self.name));
        std::fs::write(&path, self.to_yaml()).expect("failed to write recipe file");
        path
    }
}

/// Builder for `ConfigFile` to simplify test setup.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: ConfigFile,
}

impl ConfigBuilder {
    /// Config whose recipe directory, PID file and lock marker all live
    /// under `root`. Creates `root/recipes`.
    pub fn in_dir(root: &Path) -> Self {
        let recipes = root.join("recipes");
        std::fs::create_dir_all(&recipes).expect("failed to create recipe dir");

        let mut agent = AgentSection::with_recipes_path(recipes);
        agent.pid_file = root.join("agent.pid");
        agent.lock_file = root.join("agent.lock");

        Self {
            config: ConfigFile::new(agent),
        }
    }

    pub fn workers(mut self, max: usize) -> Self {
        self.config.agent.max_allowed_workers = max;
        self
    }

    pub fn tick_secs(mut self, secs: u64) -> Self {
        self.config.agent.tick_interval_secs = secs;
        self
    }

    pub fn stop_timeout_secs(mut self, secs: u64) -> Self {
        self.config.agent.stop_timeout_secs = secs;
        self
    }

    pub fn variable(mut self, name: &str, value: &str) -> Self {
        self.config
            .variables
            .insert(name.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> ConfigFile {
        self.config
    }
}
