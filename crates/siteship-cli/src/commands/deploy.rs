//! Deploy command implementation

use camino::Utf8Path;
use clap::Args;
use miette::{IntoDiagnostic, Result};
use siteship_core::config::{Config, FailurePolicy};
use siteship_core::deploy::{
    DeployProgress, Deployer, DeploymentReport, DryRunExecutors, ExecutorFactory,
    SystemExecutors,
};

/// Arguments for the deploy command
#[derive(Debug, Args)]
pub struct DeployArgs {
    /// Dry run - pack, then show the commands that would run on each target
    #[arg(long)]
    pub dry_run: bool,

    /// Stop at the first failed remote host (overrides remote.on_failure)
    #[arg(long)]
    pub stop_on_failure: bool,
}

/// Run the deploy command
pub fn run(project_root: &Utf8Path, args: DeployArgs, quiet: bool) -> Result<()> {
    let mut config = Config::load(project_root).into_diagnostic()?;
    if args.stop_on_failure {
        config.remote.on_failure = FailurePolicy::Stop;
    }

    let report = if args.dry_run {
        tracing::info!("Dry run: no commands will be executed on any target");
        execute(Deployer::new(config, project_root, DryRunExecutors).without_state(), quiet)
    } else {
        execute(Deployer::new(config, project_root, SystemExecutors), quiet)
    };

    print_summary(&report);

    if report.success() {
        println!("Deployment successful");
        Ok(())
    } else {
        println!("Deployment failed");
        Err(miette::miette!(
            "{}",
            report
                .pack_error
                .clone()
                .unwrap_or_else(|| format!("{} target(s) failed", report.failures().count()))
        ))
    }
}

fn execute<F: ExecutorFactory>(deployer: Deployer<F>, quiet: bool) -> DeploymentReport {
    let mut deployer = if quiet {
        deployer
    } else {
        let total = deployer.targets().len();
        deployer.with_progress(DeployProgress::new(total))
    };
    deployer.run()
}

fn print_summary(report: &DeploymentReport) {
    if let Some(archive) = &report.archive {
        println!("Archive: {}", archive.path);
    }

    for result in &report.results {
        if result.success {
            println!("  {} ok ({} ms)", result.target, result.duration_ms);
        } else {
            println!(
                "  {} FAILED: {}",
                result.target,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    for target in &report.skipped {
        println!("  {} skipped", target);
    }
}
