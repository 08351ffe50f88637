//! Status command implementation

use camino::Utf8Path;
use clap::Args;
use miette::{IntoDiagnostic, Result};
use siteship_core::config::Config;
use siteship_core::deploy::DeployState;

/// Arguments for the status command
#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Show a single target only
    #[arg(short, long)]
    pub target: Option<String>,
}

/// Run the status command
pub fn run(project_root: &Utf8Path, args: StatusArgs) -> Result<()> {
    let config = Config::load(project_root).into_diagnostic()?;
    let state_dir = config.state_dir(project_root);

    let states: Vec<DeployState> = DeployState::load_all(&state_dir)
        .into_diagnostic()?
        .into_iter()
        .filter(|s| args.target.as_ref().is_none_or(|t| *t == s.target))
        .collect();

    if states.is_empty() {
        println!("No deployments recorded in {}", state_dir);
        return Ok(());
    }

    for state in &states {
        println!("{}", state.target);
        println!("  release:  {}", state.release_id);
        println!("  path:     {}", state.release_path);
        println!("  archive:  {}", state.archive);
        println!("  blake3:   {}", state.archive_hash);
        println!(
            "  deployed: {}",
            state.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }

    Ok(())
}
