//! Command execution on deployment targets
//!
//! A [`RemoteExecutor`] is the capability the activator drives: copy a file to
//! the target and run shell commands there. Implementations:
//! - [`LocalExecutor`]: the controlling host, via `sh -c`
//! - [`SshExecutor`]: a remote host, via `scp` and `ssh`
//! - [`DryRunExecutor`]: logs what would run and always succeeds

mod dry_run;
mod local;
mod ssh;

pub use dry_run::DryRunExecutor;
pub use local::LocalExecutor;
pub use ssh::SshExecutor;

use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use std::process::{Command, Stdio};

use crate::{Error, Result};

/// A host reachable over ssh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteHost {
    /// Host name or address
    pub host: String,
    /// Login user, `None` leaves it to the ssh client
    pub user: Option<String>,
    /// Non-standard ssh port
    pub port: Option<u16>,
    /// Private key file
    pub identity_file: Option<Utf8PathBuf>,
}

impl RemoteHost {
    /// Host with default login settings
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: None,
            port: None,
            identity_file: None,
        }
    }

    /// `user@host` or `host`, as understood by ssh and scp
    pub fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{}@{}", user, self.host),
            None => self.host.clone(),
        }
    }
}

/// Where a release is activated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// The controlling host
    Local,
    /// A host reached through ssh
    Remote(RemoteHost),
}

impl Target {
    /// Whether commands run on the controlling host
    pub fn is_local(&self) -> bool {
        matches!(self, Target::Local)
    }

    /// Name used for state directories and reports
    pub fn name(&self) -> String {
        match self {
            Target::Local => "local".to_string(),
            Target::Remote(host) => host.host.clone(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Local => write!(f, "local"),
            Target::Remote(host) => write!(f, "{}", host.destination()),
        }
    }
}

/// Captured result of a successful command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, `None` when killed by a signal
    pub status: Option<i32>,
}

/// Capability to stage files on a target and run commands there
pub trait RemoteExecutor {
    /// The target this executor acts on
    fn target(&self) -> &Target;

    /// Copy a local file to `remote` on the target
    fn copy_file(&self, local: &Utf8Path, remote: &Utf8Path) -> Result<()>;

    /// Run a shell command on the target.
    ///
    /// A non-zero exit status is reported as [`Error::RemoteCommand`].
    fn run_command(&self, command: &str) -> Result<CommandOutput>;
}

impl<E: RemoteExecutor + ?Sized> RemoteExecutor for Box<E> {
    fn target(&self) -> &Target {
        (**self).target()
    }

    fn copy_file(&self, local: &Utf8Path, remote: &Utf8Path) -> Result<()> {
        (**self).copy_file(local, remote)
    }

    fn run_command(&self, command: &str) -> Result<CommandOutput> {
        (**self).run_command(command)
    }
}

/// Escape a string for shell use
pub fn shell_escape(s: &str) -> String {
    // Use single quotes and escape any single quotes in the string
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Run a process to completion, turning a non-zero exit into an error
///
/// `shown` is the command as reported in logs and errors.
pub(crate) fn run_process(
    command: &mut Command,
    target: &Target,
    shown: &str,
) -> Result<CommandOutput> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    tracing::debug!(host = %target, "Running: {}", shown);

    let output = command.output().map_err(|e| {
        Error::remote_command(target.to_string(), shown, None, e.to_string())
    })?;

    let result = CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        status: output.status.code(),
    };

    if !output.status.success() {
        return Err(Error::remote_command(
            target.to_string(),
            shown,
            result.status,
            result.stderr.trim(),
        ));
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_escape() {
        assert_eq!(shell_escape("simple"), "'simple'");
        assert_eq!(shell_escape("with space"), "'with space'");
        assert_eq!(shell_escape("it's quoted"), "'it'\\''s quoted'");
    }

    #[test]
    fn test_target_display() {
        assert_eq!(Target::Local.to_string(), "local");

        let mut host = RemoteHost::new("100.25.104.141");
        assert_eq!(Target::Remote(host.clone()).to_string(), "100.25.104.141");

        host.user = Some("ubuntu".to_string());
        let target = Target::Remote(host);
        assert_eq!(target.to_string(), "ubuntu@100.25.104.141");
        assert_eq!(target.name(), "100.25.104.141");
        assert!(!target.is_local());
    }

    #[test]
    fn test_run_process_failure_carries_status() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo oops >&2; exit 3"]);

        let err = run_process(&mut cmd, &Target::Local, "exit 3").unwrap_err();
        match err {
            Error::RemoteCommand { status, stderr, .. } => {
                assert_eq!(status, Some(3));
                assert_eq!(stderr, "oops");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
