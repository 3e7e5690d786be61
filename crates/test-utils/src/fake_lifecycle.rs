use std::collections::VecDeque;
use std::time::Duration;

use recipe_agent::lifecycle::{Confirm, LifecycleError, ProcessControl};

/// Answers prompts from a fixed script and records every question asked.
/// Questions beyond the script are answered "no".
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: VecDeque<bool>,
    pub asked: Vec<String>,
}

impl ScriptedPrompt {
    pub fn new(answers: &[bool]) -> Self {
        Self {
            answers: answers.iter().copied().collect(),
            asked: Vec::new(),
        }
    }
}

impl Confirm for ScriptedPrompt {
    fn confirm(&mut self, question: &str) -> bool {
        self.asked.push(question.to_string());
        self.answers.pop_front().unwrap_or(false)
    }
}

/// Records which pids were waited on or killed; each call can be made to
/// fail.
#[derive(Debug, Default)]
pub struct FakeProcessControl {
    pub wait_fails: bool,
    pub kill_fails: bool,
    pub waited: Vec<u32>,
    pub killed: Vec<u32>,
}

impl FakeProcessControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wait_fails(mut self) -> Self {
        self.wait_fails = true;
        self
    }

    pub fn kill_fails(mut self) -> Self {
        self.kill_fails = true;
        self
    }
}

impl ProcessControl for FakeProcessControl {
    fn wait_for_exit(&mut self, pid: u32) -> Result<(), LifecycleError> {
        self.waited.push(pid);
        if self.wait_fails {
            return Err(LifecycleError::WaitTimeout {
                pid,
                timeout: Duration::from_secs(0),
            });
        }
        Ok(())
    }

    fn kill(&mut self, pid: u32) -> Result<(), LifecycleError> {
        self.killed.push(pid);
        if self.kill_fails {
            return Err(LifecycleError::Signal {
                pid,
                signal: "SIGKILL",
                reason: "operation not permitted".to_string(),
            });
        }
        Ok(())
    }
}
