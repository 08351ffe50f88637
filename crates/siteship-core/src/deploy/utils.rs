//! Utility functions for deployment
//!
//! This module contains helper functions used by the deployment system.

use camino::Utf8Path;
use std::io::Read;

use crate::{Error, Result};

/// Parse SSH target string to extract host and optional port
///
/// Supports formats:
/// - "user@host" -> ("user@host", None)
/// - "user@host:port" -> ("user@host", Some(port))
pub fn parse_ssh_target(target: &str) -> (&str, Option<u16>) {
    // Only treat the suffix as a port if it parses as a valid u16
    if let Some((host_part, port_str)) = target.rsplit_once(':') {
        if let Ok(port) = port_str.parse::<u16>() {
            return (host_part, Some(port));
        }
    }
    (target, None)
}

/// Release identifier for an archive: its file name up to the first `.`
///
/// `versions/web_static_20240102030405.tgz` -> `web_static_20240102030405`
pub fn release_id_from_archive(archive: &Utf8Path) -> String {
    let file_name = archive.file_name().unwrap_or(archive.as_str());
    match file_name.split_once('.') {
        Some((stem, _)) => stem.to_string(),
        None => file_name.to_string(),
    }
}

/// BLAKE3 hex digest of a file
pub fn hash_file(path: &Utf8Path) -> Result<String> {
    let mut file = std::fs::File::open(path).map_err(|e| {
        Error::state(
            format!("Failed to open {} for hashing: {}", path, e),
            "Check that the archive still exists",
        )
    })?;

    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}
