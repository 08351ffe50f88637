//! Recording executors
//!
//! A [`RecordingExecutor`] logs every call into a [`CallLog`] shared by all
//! executors of a [`RecordingFactory`]. With `execute` set, calls are carried
//! out on this machine, so a "remote" host activates into the same scratch
//! root as the local target.

use camino::{Utf8Path, Utf8PathBuf};
use siteship_core::deploy::ExecutorFactory;
use siteship_core::executor::{CommandOutput, LocalExecutor, RemoteExecutor, RemoteHost, Target};
use siteship_core::{Error, Result};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// A call made through an executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Upload {
        target: String,
        local: Utf8PathBuf,
        remote: Utf8PathBuf,
    },
    Command {
        target: String,
        command: String,
    },
}

impl Call {
    /// Name of the target the call was made on
    pub fn target(&self) -> &str {
        match self {
            Call::Upload { target, .. } | Call::Command { target, .. } => target,
        }
    }
}

/// Calls recorded across executors, in order
#[derive(Debug, Clone, Default)]
pub struct CallLog(Rc<RefCell<Vec<Call>>>);

impl CallLog {
    pub fn calls(&self) -> Vec<Call> {
        self.0.borrow().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Target names in the order they were first touched
    pub fn targets(&self) -> Vec<String> {
        let mut targets: Vec<String> = Vec::new();
        for call in self.0.borrow().iter() {
            if !targets.iter().any(|t| t == call.target()) {
                targets.push(call.target().to_string());
            }
        }
        targets
    }

    /// Commands run on one target
    pub fn commands_on(&self, target: &str) -> Vec<String> {
        self.0
            .borrow()
            .iter()
            .filter_map(|call| match call {
                Call::Command { target: t, command } if t == target => Some(command.clone()),
                _ => None,
            })
            .collect()
    }

    fn push(&self, call: Call) {
        self.0.borrow_mut().push(call);
    }
}

/// Executor that records its calls
pub struct RecordingExecutor {
    target: Target,
    log: CallLog,
    fail_on: Option<String>,
    refuse_uploads: bool,
    inner: Option<LocalExecutor>,
}

impl RecordingExecutor {
    /// Record calls without running them; every call succeeds
    pub fn new(target: Target, log: CallLog) -> Self {
        Self {
            target,
            log,
            fail_on: None,
            refuse_uploads: false,
            inner: None,
        }
    }

    /// Carry calls out on this machine
    pub fn executing(mut self) -> Self {
        self.inner = Some(LocalExecutor::new());
        self
    }

    /// Fail any command containing `pattern`
    pub fn fail_on(mut self, pattern: impl Into<String>) -> Self {
        self.fail_on = Some(pattern.into());
        self
    }

    /// Fail every upload
    pub fn refuse_uploads(mut self) -> Self {
        self.refuse_uploads = true;
        self
    }
}

impl RemoteExecutor for RecordingExecutor {
    fn target(&self) -> &Target {
        &self.target
    }

    fn copy_file(&self, local: &Utf8Path, remote: &Utf8Path) -> Result<()> {
        self.log.push(Call::Upload {
            target: self.target.name(),
            local: local.to_path_buf(),
            remote: remote.to_path_buf(),
        });

        if self.refuse_uploads {
            return Err(Error::transfer(
                format!("Upload to {} refused", self.target),
                "Recording executor configured to refuse uploads",
            ));
        }

        match &self.inner {
            Some(inner) => inner.copy_file(local, remote),
            None => Ok(()),
        }
    }

    fn run_command(&self, command: &str) -> Result<CommandOutput> {
        self.log.push(Call::Command {
            target: self.target.name(),
            command: command.to_string(),
        });

        if self
            .fail_on
            .as_ref()
            .is_some_and(|pattern| command.contains(pattern.as_str()))
        {
            return Err(Error::remote_command(
                self.target.to_string(),
                command,
                Some(1),
                "injected failure",
            ));
        }

        match &self.inner {
            Some(inner) => inner.run_command(command),
            None => Ok(CommandOutput {
                status: Some(0),
                ..CommandOutput::default()
            }),
        }
    }
}

/// Hands out recording executors that share one [`CallLog`]
#[derive(Debug, Clone, Default)]
pub struct RecordingFactory {
    log: CallLog,
    execute: bool,
    fail_on: HashMap<String, String>,
    refuse_uploads: HashSet<String>,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Carry out every call on this machine
    pub fn executing(mut self) -> Self {
        self.execute = true;
        self
    }

    /// Fail commands containing `pattern` on the named target ("local" or a host)
    pub fn fail_on(mut self, target: &str, pattern: &str) -> Self {
        self.fail_on.insert(target.to_string(), pattern.to_string());
        self
    }

    /// Refuse uploads to the named host
    pub fn refuse_uploads(mut self, target: &str) -> Self {
        self.refuse_uploads.insert(target.to_string());
        self
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    fn executor(&self, target: Target) -> RecordingExecutor {
        let name = target.name();
        let mut executor = RecordingExecutor::new(target, self.log.clone());
        if self.execute {
            executor = executor.executing();
        }
        if let Some(pattern) = self.fail_on.get(&name) {
            executor = executor.fail_on(pattern.clone());
        }
        if self.refuse_uploads.contains(&name) {
            executor = executor.refuse_uploads();
        }
        executor
    }
}

impl ExecutorFactory for RecordingFactory {
    fn local(&self) -> Box<dyn RemoteExecutor> {
        Box::new(self.executor(Target::Local))
    }

    fn remote(&self, host: &RemoteHost) -> Box<dyn RemoteExecutor> {
        Box::new(self.executor(Target::Remote(host.clone())))
    }
}
