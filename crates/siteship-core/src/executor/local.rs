//! Executor for the controlling host

use camino::Utf8Path;
use std::process::Command;

use super::{CommandOutput, RemoteExecutor, Target, run_process};
use crate::{Error, Result};

/// Runs commands on the controlling host through `sh -c`
#[derive(Debug)]
pub struct LocalExecutor {
    target: Target,
}

impl LocalExecutor {
    /// Create a new local executor
    pub fn new() -> Self {
        Self {
            target: Target::Local,
        }
    }
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteExecutor for LocalExecutor {
    fn target(&self) -> &Target {
        &self.target
    }

    fn copy_file(&self, local: &Utf8Path, remote: &Utf8Path) -> Result<()> {
        tracing::debug!("Copying {} to {}", local, remote);

        if let Some(parent) = remote.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::transfer(
                    format!("Failed to create {}: {}", parent, e),
                    "Check permissions on the destination directory",
                )
            })?;
        }

        std::fs::copy(local, remote).map_err(|e| {
            Error::transfer(
                format!("Failed to copy {} to {}: {}", local, remote, e),
                "Check that the source exists and the destination is writable",
            )
        })?;

        Ok(())
    }

    fn run_command(&self, command: &str) -> Result<CommandOutput> {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        run_process(&mut cmd, &self.target, command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_run_command_captures_stdout() {
        let executor = LocalExecutor::new();
        let output = executor.run_command("echo 'test output'").unwrap();
        assert_eq!(output.stdout.trim(), "test output");
        assert_eq!(output.status, Some(0));
    }

    #[test]
    fn test_run_command_nonzero_is_error() {
        let executor = LocalExecutor::new();
        let err = executor.run_command("false").unwrap_err();
        assert!(matches!(err, Error::RemoteCommand { status: Some(1), .. }));
    }

    #[test]
    fn test_copy_file_creates_parent() {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8Path::from_path(temp_dir.path()).unwrap();
        std::fs::write(root.join("a.tgz"), "payload").unwrap();

        let executor = LocalExecutor::new();
        executor
            .copy_file(&root.join("a.tgz"), &root.join("tmp/nested/a.tgz"))
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(root.join("tmp/nested/a.tgz")).unwrap(),
            "payload"
        );
    }

    #[test]
    fn test_copy_missing_file_is_transfer_error() {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8Path::from_path(temp_dir.path()).unwrap();

        let executor = LocalExecutor::new();
        let err = executor
            .copy_file(&root.join("missing.tgz"), &root.join("out.tgz"))
            .unwrap_err();
        assert!(matches!(err, Error::Transfer { .. }));
    }
}
