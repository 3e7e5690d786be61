// src/recipe/model.rs

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

/// How a recipe gets triggered.
///
/// Only `schedule` recipes take part in queueing and dispatch. `hook`
/// recipes are triggered from outside the agent and are loaded only so that
/// they can be listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefinitionKind {
    Schedule,
    Hook,
}

impl fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefinitionKind::Schedule => write!(f, "schedule"),
            DefinitionKind::Hook => write!(f, "hook"),
        }
    }
}

/// Interval added to the trigger minute to get the next due time.
///
/// ```yaml
/// schedule:
///   day: 0
///   hour: 1
///   min: 30
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Schedule {
    #[serde(default)]
    pub day: u32,
    #[serde(default)]
    pub hour: u32,
    #[serde(default)]
    pub min: u32,
}

impl Schedule {
    pub fn new(day: u32, hour: u32, min: u32) -> Self {
        Self { day, hour, min }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d {}h {}m", self.day, self.hour, self.min)
    }
}

/// Reason a recipe is permanently excluded from dispatch.
///
/// Set once, either when a parseable recipe turns out to be unusable or when
/// one of its runs fails. Never cleared for the lifetime of the process.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecipeFault {
    #[error("schedule recipe has no `schedule` block")]
    MissingSchedule,

    #[error("recipe has no steps")]
    NoSteps,

    #[error("schedule {0} overflows the calendar")]
    ScheduleOverflow(Schedule),

    #[error("run failed: {0}")]
    RunFailed(String),
}

/// A single task definition as the engine sees it.
#[derive(Debug, Clone)]
pub struct Recipe {
    pub name: String,
    pub definition: DefinitionKind,
    pub schedule: Option<Schedule>,
    /// Next minute this recipe should run at. `None` for hook recipes and
    /// for schedule recipes that carry a fault.
    pub due: Option<DateTime<Utc>>,
    pub steps: Vec<String>,
    pub path: PathBuf,
    pub fault: Option<RecipeFault>,
}

impl Recipe {
    pub fn is_schedule(&self) -> bool {
        self.definition == DefinitionKind::Schedule
    }

    /// Whether the scheduler may still consider this recipe at all.
    pub fn is_dispatchable(&self) -> bool {
        self.fault.is_none()
    }

    /// Exact-minute match against an already truncated `now`.
    ///
    /// A due time that is earlier than `now` does not match: that occurrence
    /// was missed and stays missed.
    pub fn is_due_at(&self, now: DateTime<Utc>) -> bool {
        self.due == Some(now)
    }
}
