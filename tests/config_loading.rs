// tests/config_loading.rs

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use recipe_agent::config::{load_and_validate, load_from_path, STOP_WAIT_MARGIN};
use recipe_agent::recipe::load_all;
use tempfile::NamedTempFile;

#[test]
fn full_config_round_trips_every_field() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[agent]
recipes_path = "/srv/recipes"
pid_file = "/run/agent.pid"
lock_file = "/run/agent.lock"
max_allowed_workers = 2
tick_interval_secs = 5
stop_timeout_secs = 7
recipe_patterns = ["*.recipe"]

[variables]
greeting = "hello"
"#
    )
    .unwrap();

    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.agent.recipes_path, Path::new("/srv/recipes"));
    assert_eq!(cfg.agent.max_allowed_workers, 2);
    assert_eq!(cfg.agent.tick_interval_secs, 5);
    assert_eq!(cfg.agent.stop_timeout_secs, 7);
    // `stop` outlasts the agent's own shutdown grace.
    assert_eq!(cfg.agent.stop_wait(), Duration::from_secs(7) + STOP_WAIT_MARGIN);
    assert!(cfg.agent.stop_wait() > cfg.agent.stop_timeout());
    assert_eq!(cfg.agent.recipe_patterns, vec!["*.recipe"]);
    assert_eq!(cfg.variables.get("greeting").map(String::as_str), Some("hello"));
}

#[test]
fn zero_workers_fails_validation_but_parses() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "[agent]\nrecipes_path = \"r\"\nmax_allowed_workers = 0\n").unwrap();

    assert!(load_from_path(file.path()).is_ok());
    let err = load_and_validate(file.path()).unwrap_err();
    assert!(err.to_string().contains("max_allowed_workers"));
}

#[test]
fn unknown_file_reports_its_path() {
    let err = load_and_validate("/definitely/not/here/Agent.toml").unwrap_err();
    assert!(format!("{err:#}").contains("/definitely/not/here/Agent.toml"));
}

#[test]
fn demo_config_and_recipes_load() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos");
    let cfg = load_and_validate(root.join("Agent.toml")).unwrap();

    assert_eq!(cfg.agent.recipes_path, root.join("recipes"));

    let recipes = load_all(&cfg.agent.recipes_path, chrono::Utc::now()).unwrap();
    assert!(recipes.len() >= 3);
    assert!(recipes.iter().any(|r| !r.is_schedule()));
    assert!(recipes.iter().filter(|r| r.is_schedule()).all(|r| r.fault.is_none()));
}
