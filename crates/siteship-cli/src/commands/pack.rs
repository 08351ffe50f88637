//! Pack command implementation

use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use miette::{IntoDiagnostic, Result};
use siteship_core::archive::ArchiveBuilder;
use siteship_core::config::Config;

/// Arguments for the pack command
#[derive(Debug, Args)]
pub struct PackArgs {
    /// Directory to pack (overrides archive.source_dir)
    #[arg(short, long)]
    pub source: Option<Utf8PathBuf>,

    /// Directory to write the archive into (overrides archive.output_dir)
    #[arg(short, long)]
    pub output: Option<Utf8PathBuf>,
}

/// Run the pack command
pub fn run(project_root: &Utf8Path, args: PackArgs) -> Result<()> {
    let mut config = Config::load(project_root).into_diagnostic()?;
    if let Some(source) = args.source {
        config.archive.source_dir = source;
    }
    if let Some(output) = args.output {
        config.archive.output_dir = output;
    }

    let builder = ArchiveBuilder::new(
        project_root.join(&config.archive.output_dir),
        config.archive_prefix(),
    );
    let archive = builder
        .pack(&project_root.join(&config.archive.source_dir))
        .into_diagnostic()?;

    println!("{}", archive.path);
    Ok(())
}
