// src/lifecycle/stop.rs

use std::io::{self, BufRead, StdinLock, Stdout, Write};
use std::time::Duration;

use tracing::{error, info, warn};

use crate::engine::LockMarker;
use crate::lifecycle::{LifecycleError, PidFile};

/// How the stop flow ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// The agent is gone and the busy marker was cleared.
    Terminate,
    /// Nothing was stopped: the operator declined or something failed.
    Interrupt,
}

/// Yes/no question to the operator.
pub trait Confirm {
    fn confirm(&mut self, question: &str) -> bool;
}

/// Signals sent to the agent process by the stop flow.
pub trait ProcessControl {
    /// Ask `pid` to shut down and block until it has exited.
    fn wait_for_exit(&mut self, pid: u32) -> Result<(), LifecycleError>;

    /// Terminate `pid` immediately.
    fn kill(&mut self, pid: u32) -> Result<(), LifecycleError>;
}

/// Interactive stop flow.
///
/// 1. "Are you sure?" declined: `Interrupt`, nothing is sent.
/// 2. Busy marker present: "Force quit?" picks the forced or graceful path.
/// 3. Graceful: wait for the agent to exit; on failure fall through to forced.
/// 4. Forced: kill the agent; failure gives `Interrupt`.
///
/// Either path clears the busy marker when the agent is gone. A missing or
/// garbled PID file gives `Interrupt`.
pub fn stop<C, P>(prompt: &mut C, process: &mut P, pid_file: &PidFile, lock: &LockMarker) -> StopSignal
where
    C: Confirm + ?Sized,
    P: ProcessControl + ?Sized,
{
    if !prompt.confirm("Are you sure?") {
        info!("stop cancelled");
        return StopSignal::Interrupt;
    }

    let pid = match pid_file.read_pid() {
        Ok(pid) => pid,
        Err(err) => {
            error!(error = %err, "cannot find the running agent");
            return StopSignal::Interrupt;
        }
    };

    if pid == std::process::id() {
        error!(pid, "pid file points at this process; refusing to stop it");
        return StopSignal::Interrupt;
    }

    let forced = lock.is_locked() && prompt.confirm("Force quit?");

    if !forced {
        info!(pid, "waiting for agent to exit");
        match process.wait_for_exit(pid) {
            Ok(()) => return terminated(lock, pid),
            Err(err) => warn!(pid, error = %err, "graceful stop failed; forcing"),
        }
    }

    match process.kill(pid) {
        Ok(()) => terminated(lock, pid),
        Err(err) => {
            error!(pid, error = %err, "failed to kill agent");
            StopSignal::Interrupt
        }
    }
}

fn terminated(lock: &LockMarker, pid: u32) -> StopSignal {
    if let Err(err) = lock.unlock() {
        warn!(path = ?lock.path(), error = %err, "failed to clear lock marker");
    }
    info!(pid, "agent stopped");
    StopSignal::Terminate
}

/// [`Confirm`] over a line-based reader/writer pair. Only `y` and `yes`
/// (any case) count as agreement.
#[derive(Debug)]
pub struct TerminalPrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> TerminalPrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl TerminalPrompt<StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Confirm for TerminalPrompt<R, W> {
    fn confirm(&mut self, question: &str) -> bool {
        if let Err(err) = write!(self.output, "{question} [y/N] ").and_then(|_| self.output.flush()) {
            warn!(error = %err, "failed to write prompt");
            return false;
        }

        let mut answer = String::new();
        match self.input.read_line(&mut answer) {
            Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            Err(err) => {
                warn!(error = %err, "failed to read answer");
                false
            }
        }
    }
}

/// [`ProcessControl`] backed by OS signals.
///
/// `wait_for_exit` sends `SIGTERM` and polls until the process is gone or
/// `timeout` elapses. `kill` sends `SIGKILL`.
#[derive(Debug, Clone)]
pub struct SystemProcessControl {
    timeout: Duration,
    poll_interval: Duration,
}

impl SystemProcessControl {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            poll_interval: Duration::from_millis(100),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

#[cfg(unix)]
impl ProcessControl for SystemProcessControl {
    fn wait_for_exit(&mut self, pid: u32) -> Result<(), LifecycleError> {
        use nix::errno::Errno;
        use nix::sys::signal::{kill, Signal};
        use std::time::Instant;

        let target = to_nix_pid(pid, "SIGTERM")?;
        match kill(target, Signal::SIGTERM) {
            Ok(()) => {}
            Err(Errno::ESRCH) => return Ok(()),
            Err(e) => {
                return Err(LifecycleError::Signal {
                    pid,
                    signal: "SIGTERM",
                    reason: e.to_string(),
                });
            }
        }

        let deadline = Instant::now() + self.timeout;
        loop {
            match kill(target, None::<Signal>) {
                Err(Errno::ESRCH) => return Ok(()),
                Ok(()) | Err(Errno::EPERM) => {}
                Err(e) => {
                    return Err(LifecycleError::Signal {
                        pid,
                        signal: "probe",
                        reason: e.to_string(),
                    });
                }
            }

            if Instant::now() >= deadline {
                return Err(LifecycleError::WaitTimeout {
                    pid,
                    timeout: self.timeout,
                });
            }
            std::thread::sleep(self.poll_interval);
        }
    }

    fn kill(&mut self, pid: u32) -> Result<(), LifecycleError> {
        use nix::sys::signal::{kill, Signal};

        let target = to_nix_pid(pid, "SIGKILL")?;
        kill(target, Signal::SIGKILL).map_err(|e| LifecycleError::Signal {
            pid,
            signal: "SIGKILL",
            reason: e.to_string(),
        })
    }
}

#[cfg(unix)]
fn to_nix_pid(pid: u32, signal: &'static str) -> Result<nix::unistd::Pid, LifecycleError> {
    match i32::try_from(pid) {
        Ok(raw) if raw > 0 => Ok(nix::unistd::Pid::from_raw(raw)),
        _ => Err(LifecycleError::Signal {
            pid,
            signal,
            reason: "pid out of range".to_string(),
        }),
    }
}

#[cfg(not(unix))]
impl ProcessControl for SystemProcessControl {
    fn wait_for_exit(&mut self, _pid: u32) -> Result<(), LifecycleError> {
        Err(LifecycleError::Unsupported)
    }

    fn kill(&mut self, _pid: u32) -> Result<(), LifecycleError> {
        Err(LifecycleError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn terminal_prompt_accepts_only_yes() {
        for (input, expected) in [("y\n", true), ("YES\n", true), ("n\n", false), ("\n", false), ("", false)] {
            let mut out = Vec::new();
            let mut prompt = TerminalPrompt::new(Cursor::new(input), &mut out);
            assert_eq!(prompt.confirm("Are you sure?"), expected, "input {input:?}");
            assert_eq!(String::from_utf8(out).unwrap(), "Are you sure? [y/N] ");
        }
    }

    #[cfg(unix)]
    #[test]
    fn system_control_waits_for_terminated_child() {
        let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
        let pid = child.id();

        // Reap in the background so the liveness check sees the pid disappear.
        let reaper = std::thread::spawn(move || child.wait());

        let mut control =
            SystemProcessControl::new(Duration::from_secs(5)).with_poll_interval(Duration::from_millis(10));
        control.wait_for_exit(pid).unwrap();

        reaper.join().unwrap().unwrap();
    }
}
