// src/lib.rs

pub mod agent;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod lifecycle;
pub mod logging;
pub mod recipe;
pub mod watch;

pub use agent::{Agent, RunningAgent};
pub use errors::{AgentError, Result};

use anyhow::Context;
use chrono::Utc;
use tracing::{debug, info};

use crate::cli::{CliArgs, Command};
use crate::config::{load_and_validate, ConfigFile};
use crate::engine::RecipeQueue;
use crate::lifecycle::{AgentControl, PidFile, StopSignal, SystemProcessControl, TerminalPrompt};
use crate::recipe::{load_all, Recipe};

/// High-level entry point used by `main.rs`.
///
/// Loads the config named on the command line and dispatches to the
/// requested subcommand:
/// - `start` runs the agent until SIGINT/SIGTERM (or prints the queue)
/// - `stop` runs the interactive stop flow against the recorded PID
/// - `info` / `recipes` print state and exit
pub async fn run(args: CliArgs) -> anyhow::Result<()> {
    let cfg = load_and_validate(&args.config)?;

    match args.command {
        Command::Start { dry_run: true } => print_dry_run(&cfg),
        Command::Start { dry_run: false } => run_agent(cfg).await,
        Command::Stop => run_stop(cfg).await,
        Command::Info => print_info(&cfg),
        Command::Recipes => print_recipes(&cfg),
    }
}

async fn run_agent(cfg: ConfigFile) -> anyhow::Result<()> {
    let grace = cfg.agent.stop_timeout();
    let agent = Agent::new(cfg)?;
    let running = agent.start()?;

    shutdown_signal().await?;
    info!("shutdown requested");

    running.shutdown(grace).await;
    Ok(())
}

async fn run_stop(cfg: ConfigFile) -> anyhow::Result<()> {
    let timeout = cfg.agent.stop_wait();
    let agent = Agent::new(cfg)?;

    // Prompts read stdin and the exit wait polls with sleeps.
    let signal = tokio::task::spawn_blocking(move || {
        let mut prompt = TerminalPrompt::stdio();
        let mut process = SystemProcessControl::new(timeout);
        agent.stop_with(&mut prompt, &mut process)
    })
    .await
    .context("stop flow panicked")?;

    match signal {
        StopSignal::Terminate => println!("agent stopped"),
        StopSignal::Interrupt => println!("agent left running"),
    }
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix (what `stop` sends).
async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut term = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res.context("listening for Ctrl+C")?,
            _ = term.recv() => {}
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await.context("listening for Ctrl+C")?;

    Ok(())
}

fn load_recipes(cfg: &ConfigFile) -> anyhow::Result<Vec<Recipe>> {
    load_all(&cfg.agent.recipes_path, Utc::now())
        .with_context(|| format!("reading recipe directory {:?}", cfg.agent.recipes_path))
}

/// Simple dry-run output: the queue as it would be at startup.
fn print_dry_run(cfg: &ConfigFile) -> anyhow::Result<()> {
    let queue = RecipeQueue::new();
    let loaded = load_recipes(cfg)?;
    let total = loaded.len();
    queue.extend(loaded);

    println!("recipe-agent dry-run");
    println!("  agent.recipes_path = {}", cfg.agent.recipes_path.display());
    println!("  agent.max_allowed_workers = {}", cfg.agent.max_allowed_workers);
    println!("  agent.tick_interval_secs = {}", cfg.agent.tick_interval_secs);
    println!();

    println!("queue ({} of {} recipes):", queue.len(), total);
    for (id, recipe) in queue.snapshot() {
        println!("  [{}] {}", id.index(), recipe.name);
        if let Some(schedule) = recipe.schedule {
            println!("      schedule: {schedule}");
        }
        match recipe.due {
            Some(due) => println!("      due: {}", due.to_rfc3339()),
            None => println!("      due: never"),
        }
        if let Some(fault) = &recipe.fault {
            println!("      skipped: {fault}");
        }
        for step in &recipe.steps {
            println!("      step: {step}");
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}

fn print_info(cfg: &ConfigFile) -> anyhow::Result<()> {
    match PidFile::new(&cfg.agent.pid_file).read_pid() {
        Ok(pid) => println!("pid: {pid}"),
        Err(err) => println!("pid: unknown ({err})"),
    }
    println!();

    let rendered = toml::to_string_pretty(cfg).context("rendering config as TOML")?;
    print!("{rendered}");
    Ok(())
}

fn print_recipes(cfg: &ConfigFile) -> anyhow::Result<()> {
    let recipes = load_recipes(cfg)?;

    println!("recipes ({}):", recipes.len());
    for recipe in &recipes {
        let due = recipe
            .due
            .map(|d| d.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        let status = recipe
            .fault
            .as_ref()
            .map(|f| f.to_string())
            .unwrap_or_else(|| "ok".to_string());

        println!(
            "  - {} ({}) due {} [{}] {}",
            recipe.name,
            recipe.definition,
            due,
            status,
            recipe.path.display()
        );
    }
    Ok(())
}
