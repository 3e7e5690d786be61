// src/exec/command.rs

use std::collections::BTreeMap;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::exec::pool::WorkerError;

/// Substitute `${name}` and `$name` occurrences with values from `vars`.
///
/// Longer names are substituted first so `$dir_out` is not clobbered by a
/// `$dir` variable. Unknown names are left for the shell to expand.
pub fn expand_variables(step: &str, vars: &BTreeMap<String, String>) -> String {
    let mut names: Vec<&String> = vars.keys().collect();
    names.sort_by_key(|n| std::cmp::Reverse(n.len()));

    let mut out = step.to_string();
    for name in names {
        let value = &vars[name];
        out = out.replace(&format!("${{{name}}}"), value);
        out = out.replace(&format!("${name}"), value);
    }
    out
}

/// Run one recipe step as a shell process and wait for it to exit.
///
/// A started step always runs to completion. The child is only killed when
/// the returned future is dropped. Output is drained line by line into the
/// log at debug level.
pub(crate) async fn run_step(recipe: &str, index: usize, cmd_line: &str) -> Result<(), WorkerError> {
    info!(recipe = %recipe, step = index, cmd = %cmd_line, "starting step");

    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd_line);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd_line);
        c
    };

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let io_err = |source| WorkerError::Io {
        index,
        cmd: cmd_line.to_string(),
        source,
    };

    let mut child = cmd.spawn().map_err(io_err)?;

    drain_lines(recipe, "stdout", child.stdout.take());
    drain_lines(recipe, "stderr", child.stderr.take());

    let status = child.wait().await.map_err(io_err)?;

    let code = status.code().unwrap_or(-1);
    info!(
        recipe = %recipe,
        step = index,
        exit_code = code,
        success = status.success(),
        "step exited"
    );

    if status.success() {
        Ok(())
    } else {
        Err(WorkerError::StepFailed {
            index,
            cmd: cmd_line.to_string(),
            code,
        })
    }
}

fn drain_lines<R>(recipe: &str, stream: &'static str, reader: Option<R>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let Some(reader) = reader else {
        return;
    };
    let recipe = recipe.to_string();

    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(recipe = %recipe, stream, "{}", line);
        }
    });
}
