//! Release activation and deployment orchestration
//!
//! This module provides:
//! - Activation: staging an archive into a release directory on one target and
//!   switching the `current` symlink to it
//! - Orchestration: packing once, then activating on the local gate and on each
//!   remote host in order
//! - Deploy state: the last successful release per target
//!
//! **Note**: Activation runs POSIX shell commands (`tar`, `mv`, `ln`) on every
//! target and is designed for Linux web hosts.

mod activator;
mod orchestrator;
mod progress;
mod state;
mod utils;

pub use activator::{ActivationResult, ActivationStep, Release, ReleaseActivator, ReleaseLayout};
pub use orchestrator::{
    DeploymentReport, Deployer, DryRunExecutors, ExecutorFactory, SystemExecutors,
};
pub use progress::DeployProgress;
pub use state::DeployState;
pub use utils::{hash_file, parse_ssh_target, release_id_from_archive};
