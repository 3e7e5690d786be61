// src/lifecycle/pid.rs

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::lifecycle::LifecycleError;

/// The file holding the running agent's process id as one decimal integer.
///
/// Written on every start (previous content is truncated) and read back by
/// the stop flow from another process.
#[derive(Debug, Clone)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record the current process id.
    pub fn write_pid(&self) -> Result<u32, LifecycleError> {
        let pid = std::process::id();
        self.write_pid_value(pid)?;
        Ok(pid)
    }

    pub fn write_pid_value(&self, pid: u32) -> Result<(), LifecycleError> {
        let write_err = |source| LifecycleError::PidWrite {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(write_err)?;
            }
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)
            .map_err(write_err)?;

        write!(file, "{pid}").map_err(write_err)?;

        info!(path = ?self.path, pid, "pid file written");
        Ok(())
    }

    /// Read the recorded process id.
    ///
    /// A missing file, unreadable content or a pid of zero are all errors.
    pub fn read_pid(&self) -> Result<u32, LifecycleError> {
        let contents = fs::read_to_string(&self.path).map_err(|source| LifecycleError::PidRead {
            path: self.path.clone(),
            source,
        })?;

        match contents.trim().parse::<u32>() {
            Ok(pid) if pid != 0 => Ok(pid),
            _ => Err(LifecycleError::PidFormat {
                path: self.path.clone(),
                contents: contents.trim().to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_current_pid() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = PidFile::new(dir.path().join("run").join("agent.pid"));

        let written = pid_file.write_pid().unwrap();

        assert_eq!(written, std::process::id());
        assert_eq!(pid_file.read_pid().unwrap(), written);
    }

    #[test]
    fn write_truncates_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.pid");
        fs::write(&path, "1234567890\n").unwrap();

        let pid_file = PidFile::new(&path);
        pid_file.write_pid_value(42).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "42");
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = PidFile::new(dir.path().join("nope.pid"));

        assert!(matches!(
            pid_file.read_pid(),
            Err(LifecycleError::PidRead { .. })
        ));
    }

    #[test]
    fn garbage_and_zero_are_format_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.pid");
        let pid_file = PidFile::new(&path);

        for contents in ["not a pid", "", "0", "-3"] {
            fs::write(&path, contents).unwrap();
            assert!(
                matches!(pid_file.read_pid(), Err(LifecycleError::PidFormat { .. })),
                "contents {contents:?} should be rejected"
            );
        }
    }
}
