// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `recipe-agent`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "recipe-agent",
    version,
    about = "Run YAML recipes on a schedule, picking up new ones as they appear.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Agent.toml` in the current working directory.
    #[arg(long, global = true, value_name = "PATH", default_value = "Agent.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `RECIPE_AGENT_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the agent in the foreground until SIGINT or SIGTERM.
    Start {
        /// Load config and recipes, print the queue, run nothing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Stop the running agent (asks for confirmation).
    Stop,

    /// Print the recorded PID and the effective configuration.
    Info,

    /// List every recipe in the recipe directory.
    Recipes,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for tracing::Level {
    fn from(lvl: LogLevel) -> Self {
        match lvl {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_after_subcommand() {
        let args = CliArgs::try_parse_from([
            "recipe-agent",
            "start",
            "--dry-run",
            "--config",
            "demos/Agent.toml",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert_eq!(args.config, "demos/Agent.toml");
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
        assert!(matches!(args.command, Command::Start { dry_run: true }));
    }

    #[test]
    fn subcommand_is_required() {
        assert!(CliArgs::try_parse_from(["recipe-agent"]).is_err());
    }
}
