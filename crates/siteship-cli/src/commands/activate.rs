//! Activate command implementation

use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use miette::{IntoDiagnostic, Result};
use siteship_core::config::Config;
use siteship_core::deploy::{
    ActivationStep, DryRunExecutors, ExecutorFactory, ReleaseActivator, ReleaseLayout,
    SystemExecutors,
};

/// Arguments for the activate command
#[derive(Debug, Args)]
pub struct ActivateArgs {
    /// Archive to activate
    pub archive: Utf8PathBuf,

    /// Host to activate on ("host" or "user@host:port"); repeatable.
    /// Defaults to every host in remote.hosts
    #[arg(long = "host", value_name = "HOST")]
    pub hosts: Vec<String>,

    /// Activate on this machine only
    #[arg(long, conflicts_with = "hosts")]
    pub local: bool,

    /// Dry run - show the commands that would run
    #[arg(long)]
    pub dry_run: bool,
}

/// Run the activate command
pub fn run(project_root: &Utf8Path, args: ActivateArgs) -> Result<()> {
    let mut config = Config::load(project_root).into_diagnostic()?;
    if !args.hosts.is_empty() {
        config.remote.hosts = args.hosts;
        config.validate().into_diagnostic()?;
    }

    let archive = project_root.join(&args.archive);
    let activator = ReleaseActivator::new(ReleaseLayout::from_config(&config));
    let factory: Box<dyn ExecutorFactory> = if args.dry_run {
        Box::new(DryRunExecutors)
    } else {
        Box::new(SystemExecutors)
    };

    let executors = if args.local {
        vec![factory.local()]
    } else {
        config
            .remote_targets()
            .iter()
            .map(|host| factory.remote(host))
            .collect()
    };

    if executors.is_empty() {
        return Err(miette::miette!(
            help = "Pass --host, --local, or set remote.hosts in siteship.toml",
            "No targets to activate on"
        ));
    }

    let mut failed = Vec::new();
    for executor in &executors {
        let result = activator.activate_report(&archive, executor.as_ref(), &|step: ActivationStep| {
            tracing::debug!(host = %executor.target(), "{}", step);
        });
        match (&result.release, &result.error) {
            (Some(release), _) => println!("{}: activated {}", result.target, release.path),
            (None, Some(error)) => println!("{}: FAILED - {}", result.target, error),
            (None, None) => println!("{}: FAILED", result.target),
        }
        if !result.success {
            failed.push(result.target);
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        Err(miette::miette!(
            "Activation failed on {} of {} targets: {}",
            failed.len(),
            executors.len(),
            failed.join(", ")
        ))
    }
}
