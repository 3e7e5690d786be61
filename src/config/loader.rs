// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::model::ConfigFile;
use crate::config::validate::validate_config;

/// Load a configuration file from a given path and return the raw `ConfigFile`.
///
/// This only performs TOML deserialization; it does **not** validate or
/// anchor relative paths. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading config file at {:?}", path))?;

    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("parsing TOML config from {:?}", path))?;

    Ok(config)
}

/// Load a configuration file from path, validate it, and resolve relative
/// paths against the directory containing the file.
///
/// This is the entry point the rest of the application uses.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let mut config = load_from_path(path)?;
    validate_config(&config)?;
    config.anchor_paths(&config_root_dir(path));
    Ok(config)
}

/// Directory containing the config file, or the current working directory
/// for a bare file name.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_follow_the_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let cfg_path = dir.path().join("Agent.toml");
        fs::write(
            &cfg_path,
            "[agent]\nrecipes_path = \"recipes\"\nlock_file = \"/abs/agent.lock\"\n",
        )
        .unwrap();

        let cfg = load_and_validate(&cfg_path).unwrap();

        assert_eq!(cfg.agent.recipes_path, dir.path().join("recipes"));
        assert_eq!(cfg.agent.pid_file, dir.path().join("recipe-agent.pid"));
        assert_eq!(cfg.agent.lock_file, PathBuf::from("/abs/agent.lock"));
        assert_eq!(cfg.agent.max_allowed_workers, 5);
        assert_eq!(cfg.agent.tick_interval_secs, 60);
    }

    #[test]
    fn missing_agent_section_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cfg_path = dir.path().join("Agent.toml");
        fs::write(&cfg_path, "[variables]\nx = \"1\"\n").unwrap();

        assert!(load_and_validate(&cfg_path).is_err());
    }
}
