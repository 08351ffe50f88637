//! Subcommand implementations

pub mod activate;
pub mod deploy;
pub mod pack;
pub mod status;
