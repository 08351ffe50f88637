//! Executor that only reports what it would do

use camino::Utf8Path;
use std::cell::RefCell;

use super::{CommandOutput, RemoteExecutor, Target};
use crate::Result;

/// Logs uploads and commands for a target without running them
#[derive(Debug)]
pub struct DryRunExecutor {
    target: Target,
    planned: RefCell<Vec<String>>,
}

impl DryRunExecutor {
    /// Create a dry-run executor for a target
    pub fn new(target: Target) -> Self {
        Self {
            target,
            planned: RefCell::new(Vec::new()),
        }
    }

    /// Everything that would have run, in order
    pub fn planned(&self) -> Vec<String> {
        self.planned.borrow().clone()
    }
}

impl RemoteExecutor for DryRunExecutor {
    fn target(&self) -> &Target {
        &self.target
    }

    fn copy_file(&self, local: &Utf8Path, remote: &Utf8Path) -> Result<()> {
        let line = format!("upload {} -> {}", local, remote);
        tracing::info!(host = %self.target, "[DRY RUN] {}", line);
        self.planned.borrow_mut().push(line);
        Ok(())
    }

    fn run_command(&self, command: &str) -> Result<CommandOutput> {
        tracing::info!(host = %self.target, "[DRY RUN] {}", command);
        self.planned.borrow_mut().push(command.to_string());
        Ok(CommandOutput {
            status: Some(0),
            ..CommandOutput::default()
        })
    }
}
