// src/config/mod.rs

//! Configuration loading and validation for the agent.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk and anchor relative paths (`loader.rs`).
//! - Validate basic invariants like pool size and patterns (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{AgentSection, ConfigFile, STOP_WAIT_MARGIN};
pub use validate::validate_config;
