//! Executor for remote hosts over ssh
//!
//! Uploads go through `scp`, commands through `ssh`. Both run in batch mode so
//! a missing key fails the step instead of prompting.

use camino::Utf8Path;
use std::process::Command;

use super::{CommandOutput, RemoteExecutor, RemoteHost, Target, run_process};
use crate::{Error, Result};

/// Runs commands on a remote host through the system ssh client
#[derive(Debug)]
pub struct SshExecutor {
    host: RemoteHost,
    target: Target,
}

impl SshExecutor {
    /// Create a new ssh executor for a host
    pub fn new(host: RemoteHost) -> Self {
        Self {
            target: Target::Remote(host.clone()),
            host,
        }
    }

    /// Arguments for `ssh` up to and including the `--` separator
    fn ssh_args(&self) -> Vec<String> {
        let mut args = vec!["-o".to_string(), "BatchMode=yes".to_string()];

        if let Some(port) = self.host.port {
            args.push("-p".to_string());
            args.push(port.to_string());
        }

        if let Some(identity) = &self.host.identity_file {
            args.push("-i".to_string());
            args.push(identity.to_string());
        }

        args.push(self.host.destination());
        args.push("--".to_string());
        args
    }

    /// Arguments for `scp` copying `local` to `remote`
    fn scp_args(&self, local: &Utf8Path, remote: &Utf8Path) -> Vec<String> {
        let mut args = vec!["-B".to_string()];

        // scp spells the port flag with a capital P
        if let Some(port) = self.host.port {
            args.push("-P".to_string());
            args.push(port.to_string());
        }

        if let Some(identity) = &self.host.identity_file {
            args.push("-i".to_string());
            args.push(identity.to_string());
        }

        args.push(local.to_string());
        args.push(format!("{}:{}", self.host.destination(), remote));
        args
    }
}

impl RemoteExecutor for SshExecutor {
    fn target(&self) -> &Target {
        &self.target
    }

    fn copy_file(&self, local: &Utf8Path, remote: &Utf8Path) -> Result<()> {
        let mut cmd = Command::new("scp");
        cmd.args(self.scp_args(local, remote));

        let shown = format!("scp {} {}:{}", local, self.host.destination(), remote);
        run_process(&mut cmd, &self.target, &shown).map_err(|e| {
            Error::transfer(
                format!("Failed to upload {} to {}: {}", local, self.target, e),
                "Check SSH connectivity, the identity file and free space in the upload directory",
            )
        })?;

        Ok(())
    }

    fn run_command(&self, command: &str) -> Result<CommandOutput> {
        let mut cmd = Command::new("ssh");
        cmd.args(self.ssh_args()).arg(command);
        run_process(&mut cmd, &self.target, command)
    }
}
