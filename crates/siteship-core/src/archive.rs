//! Timestamped site archives
//!
//! An archive is a gzip-compressed tar of the source directory holding exactly
//! one top-level entry: the source directory itself. Archives are named
//! `<output_dir>/<prefix>_<YYYYMMDDHHMMSS>.tgz` after the invocation-time local
//! clock. There is no collision detection: two packs within the same second
//! produce the same name and the second overwrites the first.

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{Local, NaiveDateTime, Timelike};
use std::collections::BTreeSet;
use std::process::Command;

use crate::deploy::release_id_from_archive;
use crate::{Error, Result};

/// Timestamp format used in archive names
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Extension of produced archives
pub const ARCHIVE_EXTENSION: &str = "tgz";

/// A packed copy of the source directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    /// Directory that was packed
    pub source_dir: Utf8PathBuf,
    /// Invocation time, second resolution
    pub created_at: NaiveDateTime,
    /// Where the archive was written
    pub path: Utf8PathBuf,
}

impl Archive {
    /// File name of the archive
    pub fn file_name(&self) -> &str {
        self.path.file_name().unwrap_or(self.path.as_str())
    }

    /// Release identifier derived from the archive name
    pub fn release_id(&self) -> String {
        release_id_from_archive(&self.path)
    }
}

/// Produces archives of a source directory
#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    output_dir: Utf8PathBuf,
    prefix: String,
}

impl ArchiveBuilder {
    /// Create a builder writing `<prefix>_<timestamp>.tgz` files into `output_dir`
    pub fn new(output_dir: impl Into<Utf8PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            prefix: prefix.into(),
        }
    }

    /// Path of the archive a pack at `timestamp` would produce
    pub fn archive_path(&self, timestamp: NaiveDateTime) -> Utf8PathBuf {
        self.output_dir.join(format!(
            "{}_{}.{}",
            self.prefix,
            timestamp.format(TIMESTAMP_FORMAT),
            ARCHIVE_EXTENSION
        ))
    }

    /// Pack `source_dir` using the current local time
    pub fn pack(&self, source_dir: &Utf8Path) -> Result<Archive> {
        self.pack_at(source_dir, Local::now().naive_local())
    }

    /// Pack `source_dir`, naming the archive after `timestamp`
    pub fn pack_at(&self, source_dir: &Utf8Path, timestamp: NaiveDateTime) -> Result<Archive> {
        if !source_dir.is_dir() {
            return Err(Error::pack(
                format!("Source directory not found: {}", source_dir),
                "Set archive.source_dir to an existing directory",
            ));
        }

        let dir_name = source_dir.file_name().ok_or_else(|| {
            Error::pack(
                format!("Cannot determine directory name of {}", source_dir),
                "Use a source path that ends in a directory name, not '..' or '/'",
            )
        })?;
        let parent = match source_dir.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent,
            _ => Utf8Path::new("."),
        };

        std::fs::create_dir_all(&self.output_dir).map_err(|e| {
            Error::pack(
                format!("Failed to create {}: {}", self.output_dir, e),
                "Check permissions on the output directory",
            )
        })?;

        // Second resolution, as in the archive name
        let created_at = timestamp.with_nanosecond(0).unwrap_or(timestamp);
        let path = self.archive_path(created_at);

        tracing::info!(source = %source_dir, archive = %path, "Packing");

        let mut cmd = Command::new("tar");
        cmd.arg("-czf")
            .arg(path.as_str())
            .arg("-C")
            .arg(parent.as_str())
            .arg(dir_name);

        tracing::debug!("Running: {:?}", cmd);

        let output = cmd.output().map_err(|e| {
            Error::pack(
                format!("Failed to run tar: {}", e),
                "Ensure tar is installed and available in PATH",
            )
        })?;

        if !output.status.success() {
            remove_partial_archive(&path);
            return Err(Error::pack(
                format!(
                    "tar failed with exit code {:?}: {}",
                    output.status.code(),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
                "Check that the source directory is readable and the disk is not full",
            ));
        }

        let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        tracing::info!(archive = %path, bytes = size, "Archive created");

        Ok(Archive {
            source_dir: source_dir.to_path_buf(),
            created_at,
            path,
        })
    }
}

/// Drop whatever a failed `tar` left behind so it is not mistaken for an archive
fn remove_partial_archive(path: &Utf8Path) {
    if !path.is_file() {
        return;
    }
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!("Failed to remove partial archive {}: {}", path, e);
    }
}

/// Name of the single top-level directory an archive holds
///
/// Fails unless every entry lives under one directory.
pub fn top_level_dir(archive: &Utf8Path) -> Result<String> {
    let output = Command::new("tar")
        .arg("-tzf")
        .arg(archive.as_str())
        .output()
        .map_err(|e| {
            Error::activation(
                format!("Failed to run tar: {}", e),
                "Ensure tar is installed and available in PATH",
            )
        })?;

    if !output.status.success() {
        return Err(Error::activation(
            format!(
                "Cannot list {}: {}",
                archive,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
            "Check that the file is a gzip-compressed tar archive",
        ));
    }

    let listing = String::from_utf8_lossy(&output.stdout);
    let mut roots = BTreeSet::new();
    let mut nested = false;
    for line in listing.lines() {
        let entry = line.trim_start_matches("./");
        let root = match entry.split_once('/') {
            Some((root, _)) => {
                nested = true;
                root
            }
            None => entry,
        };
        if !root.is_empty() && root != "." {
            roots.insert(root.to_string());
        }
    }

    match roots.into_iter().collect::<Vec<_>>().as_slice() {
        [root] if nested => Ok(root.clone()),
        roots => Err(Error::activation(
            format!(
                "{} must hold exactly one top-level directory, found: {}",
                archive,
                if roots.is_empty() {
                    "nothing".to_string()
                } else {
                    roots.join(", ")
                }
            ),
            "Create archives with `siteship pack`",
        )),
    }
}
