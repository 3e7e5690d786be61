// src/config/validate.rs

use anyhow::{anyhow, Context, Result};

use crate::config::model::ConfigFile;
use crate::watch::RecipePatterns;

/// Run basic semantic validation against a loaded configuration.
///
/// This checks:
/// - `recipes_path` is set
/// - `max_allowed_workers >= 1`
/// - `tick_interval_secs >= 1`
/// - there is at least one recipe pattern and every pattern compiles
///
/// It does **not** check that any of the paths exist; the agent reports
/// that at startup.
pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    let agent = &cfg.agent;

    if agent.recipes_path.as_os_str().is_empty() {
        return Err(anyhow!("[agent].recipes_path must not be empty"));
    }

    if agent.max_allowed_workers == 0 {
        return Err(anyhow!("[agent].max_allowed_workers must be >= 1 (got 0)"));
    }

    if agent.tick_interval_secs == 0 {
        return Err(anyhow!("[agent].tick_interval_secs must be >= 1 (got 0)"));
    }

    if agent.recipe_patterns.is_empty() {
        return Err(anyhow!("[agent].recipe_patterns must contain at least one glob"));
    }

    RecipePatterns::new(&agent.recipe_patterns).context("invalid [agent].recipe_patterns")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::AgentSection;

    fn base() -> ConfigFile {
        ConfigFile::new(AgentSection::with_recipes_path("recipes"))
    }

    #[test]
    fn defaults_are_valid() {
        validate_config(&base()).unwrap();
    }

    #[test]
    fn zero_workers_is_rejected() {
        let mut cfg = base();
        cfg.agent.max_allowed_workers = 0;
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn zero_tick_is_rejected() {
        let mut cfg = base();
        cfg.agent.tick_interval_secs = 0;
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn bad_pattern_is_rejected() {
        let mut cfg = base();
        cfg.agent.recipe_patterns = vec!["[".into()];
        let err = validate_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("recipe_patterns"));
    }
}
