//! siteship CLI - static site packing and release deployment

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use miette::Result;
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;

/// siteship - pack a static site and activate it on web hosts
#[derive(Debug, Parser)]
#[command(name = "siteship")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print warnings and errors, without progress bars
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Project root directory (where siteship.toml lives)
    #[arg(short = 'C', long, global = true)]
    project: Option<Utf8PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Pack the source directory into a timestamped archive
    Pack(commands::pack::PackArgs),

    /// Activate an existing archive on chosen targets
    Activate(commands::activate::ActivateArgs),

    /// Pack, then activate locally and on every configured host
    Deploy(commands::deploy::DeployArgs),

    /// Show the last successful release on each target
    Status(commands::status::StatusArgs),
}

impl Cli {
    fn default_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with indicatif layer for progress bar support
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.default_filter()));

    let indicatif_layer = IndicatifLayer::new();

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(indicatif_layer.get_stderr_writer()))
        .with(indicatif_layer)
        .with(filter)
        .init();

    // Determine project root
    let project_root = if let Some(ref path) = cli.project {
        path.clone()
    } else {
        std::env::current_dir()
            .ok()
            .and_then(|p| Utf8PathBuf::try_from(p).ok())
            .unwrap_or_else(|| Utf8PathBuf::from("."))
    };

    match cli.command {
        Commands::Pack(args) => commands::pack::run(&project_root, args),
        Commands::Activate(args) => commands::activate::run(&project_root, args),
        Commands::Deploy(args) => commands::deploy::run(&project_root, args, cli.quiet),
        Commands::Status(args) => commands::status::run(&project_root, args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_deploy_flags() {
        let cli = Cli::try_parse_from([
            "siteship",
            "-C",
            "/srv/site",
            "deploy",
            "--dry-run",
            "--stop-on-failure",
        ])
        .unwrap();

        assert_eq!(cli.project.as_deref(), Some(camino::Utf8Path::new("/srv/site")));
        match cli.command {
            Commands::Deploy(args) => {
                assert!(args.dry_run);
                assert!(args.stop_on_failure);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_activate_hosts() {
        let cli = Cli::try_parse_from([
            "siteship",
            "activate",
            "versions/web_static_20240102030405.tgz",
            "--host",
            "web-01",
            "--host",
            "deploy@web-02:2222",
        ])
        .unwrap();

        match cli.command {
            Commands::Activate(args) => {
                assert_eq!(args.archive, "versions/web_static_20240102030405.tgz");
                assert_eq!(args.hosts, vec!["web-01", "deploy@web-02:2222"]);
                assert!(!args.local);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["siteship", "-v", "-q", "status"]).is_err());
    }

    #[test]
    fn test_default_filter() {
        let cli = Cli::try_parse_from(["siteship", "--verbose", "pack"]).unwrap();
        assert_eq!(cli.default_filter(), "debug");

        let cli = Cli::try_parse_from(["siteship", "status", "--quiet"]).unwrap();
        assert_eq!(cli.default_filter(), "warn");
    }
}
