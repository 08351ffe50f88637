//! siteship-core - Core library for siteship
//!
//! This crate provides the core functionality for siteship, including:
//! - Configuration file parsing and merging
//! - Packing a static site into a timestamped archive
//! - Command execution on the local host and on remote hosts over SSH
//! - Release activation (staging, flattening, switching the `current` link)
//! - Deployment orchestration across the local gate and remote hosts

pub mod archive;
pub mod config;
pub mod deploy;
pub mod error;
pub mod executor;

pub use error::{Error, Result};
