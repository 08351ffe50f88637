//! Deployment orchestration
//!
//! A deployment packs the source directory once, activates the archive on the
//! controlling host as a smoke test, then activates it on each remote host in
//! configured order. Hosts are handled one at a time; each host is fully
//! activated before the next begins.
//!
//! Outcome rules:
//! - pack failure: nothing is activated anywhere
//! - local failure: remote hosts are never touched
//! - remote failure: the remaining hosts are still attempted under
//!   [`FailurePolicy::Continue`] and skipped under [`FailurePolicy::Stop`]
//! - the deployment succeeds only if every attempted target succeeded

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{Local, NaiveDateTime};

use super::activator::{ActivationResult, ActivationStep, ReleaseActivator, ReleaseLayout};
use super::progress::DeployProgress;
use super::state::DeployState;
use super::utils::hash_file;
use crate::archive::{Archive, ArchiveBuilder};
use crate::config::{Config, FailurePolicy};
use crate::executor::{
    DryRunExecutor, LocalExecutor, RemoteExecutor, RemoteHost, SshExecutor, Target,
};

/// Produces the executors a deployment runs through
pub trait ExecutorFactory {
    /// Executor for the controlling host
    fn local(&self) -> Box<dyn RemoteExecutor>;

    /// Executor for a remote host
    fn remote(&self, host: &RemoteHost) -> Box<dyn RemoteExecutor>;
}

/// Executors that really run: `sh` locally, ssh/scp remotely
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutors;

impl ExecutorFactory for SystemExecutors {
    fn local(&self) -> Box<dyn RemoteExecutor> {
        Box::new(LocalExecutor::new())
    }

    fn remote(&self, host: &RemoteHost) -> Box<dyn RemoteExecutor> {
        Box::new(SshExecutor::new(host.clone()))
    }
}

/// Executors that only log what would run
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunExecutors;

impl ExecutorFactory for DryRunExecutors {
    fn local(&self) -> Box<dyn RemoteExecutor> {
        Box::new(DryRunExecutor::new(Target::Local))
    }

    fn remote(&self, host: &RemoteHost) -> Box<dyn RemoteExecutor> {
        Box::new(DryRunExecutor::new(Target::Remote(host.clone())))
    }
}

/// Outcome of a deployment run
#[derive(Debug, Clone, Default)]
pub struct DeploymentReport {
    /// Archive produced by the pack step
    pub archive: Option<Archive>,
    /// Why packing failed
    pub pack_error: Option<String>,
    /// One result per attempted target, in attempt order
    pub results: Vec<ActivationResult>,
    /// Targets that were never attempted
    pub skipped: Vec<String>,
}

impl DeploymentReport {
    /// Whether the archive was produced and every attempted target succeeded
    pub fn success(&self) -> bool {
        self.archive.is_some() && self.results.iter().all(|r| r.success)
    }

    /// Results of targets that failed
    pub fn failures(&self) -> impl Iterator<Item = &ActivationResult> {
        self.results.iter().filter(|r| !r.success)
    }
}

/// Runs a full deployment from an explicit configuration
pub struct Deployer<F: ExecutorFactory> {
    config: Config,
    project_root: Utf8PathBuf,
    factory: F,
    activator: ReleaseActivator,
    progress: Option<DeployProgress>,
    record_state: bool,
    clock: fn() -> NaiveDateTime,
}

impl<F: ExecutorFactory> Deployer<F> {
    /// Create a deployer for a project
    ///
    /// Relative paths in `config` are resolved against `project_root`.
    pub fn new(config: Config, project_root: impl Into<Utf8PathBuf>, factory: F) -> Self {
        let activator = ReleaseActivator::new(ReleaseLayout::from_config(&config));
        Self {
            config,
            project_root: project_root.into(),
            factory,
            activator,
            progress: None,
            record_state: true,
            clock: || Local::now().naive_local(),
        }
    }

    /// Show progress bars while deploying
    pub fn with_progress(mut self, progress: DeployProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Do not write deploy state records
    pub fn without_state(mut self) -> Self {
        self.record_state = false;
        self
    }

    /// Use a fixed clock for archive names
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    /// Targets in activation order
    pub fn targets(&self) -> Vec<Target> {
        let mut targets = Vec::new();
        if self.config.local.enabled {
            targets.push(Target::Local);
        }
        targets.extend(self.config.remote_targets().into_iter().map(Target::Remote));
        targets
    }

    /// Run the deployment, reporting only whether it fully succeeded
    pub fn deploy(&mut self) -> bool {
        self.run().success()
    }

    /// Run the deployment
    pub fn run(&mut self) -> DeploymentReport {
        let mut report = DeploymentReport::default();
        let targets = self.targets();

        let archive = match self.pack() {
            Ok(archive) => archive,
            Err(e) => {
                tracing::error!("{}", e);
                report.pack_error = Some(e.to_string());
                report.skipped = targets.iter().map(Target::name).collect();
                return report;
            }
        };

        if targets.is_empty() {
            tracing::warn!("No targets configured: local target disabled and no remote hosts");
        }

        let archive_hash = if self.record_state {
            match hash_file(&archive.path) {
                Ok(hash) => Some(hash),
                Err(e) => {
                    tracing::warn!("Deploy state will not be recorded: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let mut remaining = targets.into_iter();
        while let Some(target) = remaining.next() {
            let executor = match &target {
                Target::Local => self.factory.local(),
                Target::Remote(host) => self.factory.remote(host),
            };
            let name = target.name();

            if let Some(progress) = self.progress.as_mut() {
                progress.start_target(&name);
            }

            let result = {
                let progress = self.progress.as_ref();
                self.activator
                    .activate_report(&archive.path, executor.as_ref(), &|step: ActivationStep| {
                        if let Some(progress) = progress {
                            progress.update_target(&name, step);
                        }
                    })
            };

            if let Some(progress) = self.progress.as_mut() {
                match &result.error {
                    None => progress.finish_target(&name),
                    Some(error) => progress.fail_target(&name, error),
                }
            }

            if let (Some(release), Some(hash)) = (&result.release, &archive_hash) {
                self.record(&archive, release.id.as_str(), &release.path, &name, hash);
            }

            let failed = !result.success;
            report.results.push(result);

            if failed {
                let stop = match target {
                    Target::Local => {
                        tracing::error!("Local activation failed; remote hosts will not be touched");
                        true
                    }
                    Target::Remote(_) => {
                        self.config.remote.on_failure == FailurePolicy::Stop
                    }
                };

                if stop {
                    report.skipped = remaining.map(|t| t.name()).collect();
                    break;
                }
            }
        }

        if let Some(progress) = &self.progress {
            progress.finish();
        }

        tracing::info!(
            success = report.success(),
            attempted = report.results.len(),
            skipped = report.skipped.len(),
            "Deployment finished"
        );

        report.archive = Some(archive);
        report
    }

    fn pack(&self) -> crate::Result<Archive> {
        let builder = ArchiveBuilder::new(
            self.project_root.join(&self.config.archive.output_dir),
            self.config.archive_prefix(),
        );
        let source_dir = self.project_root.join(&self.config.archive.source_dir);
        builder.pack_at(&source_dir, (self.clock)())
    }

    fn record(
        &self,
        archive: &Archive,
        release_id: &str,
        release_path: &Utf8Path,
        target: &str,
        hash: &str,
    ) {
        if !self.record_state {
            return;
        }

        let state = DeployState::new(target, release_id, release_path, archive.file_name(), hash);
        let state_dir = self.config.state_dir(&self.project_root);
        match state.record(&state_dir) {
            Ok(path) => tracing::debug!("Recorded deploy state at {}", path),
            Err(e) => tracing::warn!(host = target, "Failed to record deploy state: {}", e),
        }
    }
}
