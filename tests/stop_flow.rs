// tests/stop_flow.rs

mod common;

use std::fs;

use common::*;
use recipe_agent::config::ConfigFile;
use recipe_agent::lifecycle::{AgentControl, PidFile, StopSignal};
use recipe_agent::Agent;

const AGENT_PID: u32 = 4_000_000;

/// An agent handle pointing at a "running" agent with `AGENT_PID`.
fn stopper(busy: bool) -> (tempfile::TempDir, ConfigFile, Agent) {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let cfg = ConfigBuilder::in_dir(dir.path()).build();

    PidFile::new(&cfg.agent.pid_file)
        .write_pid_value(AGENT_PID)
        .unwrap();
    if busy {
        fs::write(&cfg.agent.lock_file, "").unwrap();
    }

    let agent = Agent::with_pool(cfg.clone(), FakeWorkerPool::new(1).as_pool()).unwrap();
    (dir, cfg, agent)
}

#[test]
fn declined_confirmation_leaves_everything_alone() {
    let (_dir, cfg, agent) = stopper(true);
    let mut prompt = ScriptedPrompt::new(&[false]);
    let mut process = FakeProcessControl::new();

    assert_eq!(agent.stop_with(&mut prompt, &mut process), StopSignal::Interrupt);
    assert_eq!(prompt.asked, vec!["Are you sure?"]);
    assert!(process.waited.is_empty() && process.killed.is_empty());
    assert!(cfg.agent.lock_file.exists());
}

#[test]
fn busy_agent_force_quit_kills() {
    let (_dir, cfg, agent) = stopper(true);
    let mut prompt = ScriptedPrompt::new(&[true, true]);
    let mut process = FakeProcessControl::new();

    assert_eq!(agent.stop_with(&mut prompt, &mut process), StopSignal::Terminate);
    assert_eq!(prompt.asked, vec!["Are you sure?", "Force quit?"]);
    assert_eq!(process.killed, vec![AGENT_PID]);
    assert!(process.waited.is_empty());
    assert!(!cfg.agent.lock_file.exists());
}

#[test]
fn busy_agent_without_force_stops_gracefully() {
    let (_dir, cfg, agent) = stopper(true);
    let mut prompt = ScriptedPrompt::new(&[true, false]);
    let mut process = FakeProcessControl::new();

    assert_eq!(agent.stop_with(&mut prompt, &mut process), StopSignal::Terminate);
    assert_eq!(process.waited, vec![AGENT_PID]);
    assert!(process.killed.is_empty());
    assert!(!cfg.agent.lock_file.exists());
}

#[test]
fn idle_agent_stops_gracefully_without_force_prompt() {
    let (_dir, _cfg, agent) = stopper(false);
    let mut prompt = ScriptedPrompt::new(&[true]);
    let mut process = FakeProcessControl::new();

    assert_eq!(agent.stop_with(&mut prompt, &mut process), StopSignal::Terminate);
    assert_eq!(prompt.asked, vec!["Are you sure?"]);
    assert_eq!(process.waited, vec![AGENT_PID]);
}

#[test]
fn graceful_failure_escalates_to_kill() {
    let (_dir, cfg, agent) = stopper(true);
    let mut prompt = ScriptedPrompt::new(&[true, false]);
    let mut process = FakeProcessControl::new().wait_fails();

    assert_eq!(agent.stop_with(&mut prompt, &mut process), StopSignal::Terminate);
    assert_eq!(process.waited, vec![AGENT_PID]);
    assert_eq!(process.killed, vec![AGENT_PID]);
    assert!(!cfg.agent.lock_file.exists());
}

#[test]
fn kill_failure_interrupts() {
    let (_dir, cfg, agent) = stopper(true);
    let mut prompt = ScriptedPrompt::new(&[true, true]);
    let mut process = FakeProcessControl::new().kill_fails();

    assert_eq!(agent.stop_with(&mut prompt, &mut process), StopSignal::Interrupt);
    assert!(cfg.agent.lock_file.exists());
}

#[test]
fn garbled_pid_file_interrupts_before_any_signal() {
    let (_dir, cfg, agent) = stopper(false);
    fs::write(&cfg.agent.pid_file, "twelve").unwrap();
    let mut prompt = ScriptedPrompt::new(&[true]);
    let mut process = FakeProcessControl::new();

    assert_eq!(agent.stop_with(&mut prompt, &mut process), StopSignal::Interrupt);
    assert!(process.waited.is_empty() && process.killed.is_empty());
}

#[test]
fn missing_pid_file_interrupts_before_any_signal() {
    let (_dir, cfg, agent) = stopper(true);
    fs::remove_file(&cfg.agent.pid_file).unwrap();
    let mut prompt = ScriptedPrompt::new(&[true, true]);
    let mut process = FakeProcessControl::new();

    assert_eq!(agent.stop_with(&mut prompt, &mut process), StopSignal::Interrupt);
    assert!(process.waited.is_empty() && process.killed.is_empty());
    assert!(cfg.agent.lock_file.exists());
}

#[test]
fn own_pid_is_never_signalled() {
    let (_dir, cfg, agent) = stopper(false);
    PidFile::new(&cfg.agent.pid_file).write_pid().unwrap();
    let mut prompt = ScriptedPrompt::new(&[true]);
    let mut process = FakeProcessControl::new();

    assert_eq!(agent.stop_with(&mut prompt, &mut process), StopSignal::Interrupt);
    assert!(process.waited.is_empty() && process.killed.is_empty());
}
