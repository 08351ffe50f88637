//! Directory snapshots

use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeMap;
use std::fs;
use walkdir::WalkDir;

/// Result type for snapshot operations
pub type Result<T> = std::result::Result<T, TreeError>;

/// Error type for snapshot operations
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Walkdir error: {0}")]
    Walkdir(#[from] walkdir::Error),

    #[error("Invalid UTF-8 path: {0}")]
    NonUtf8(String),
}

/// One entry of a directory snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Dir,
    /// BLAKE3 digest of the contents
    File(String),
    Symlink(Utf8PathBuf),
}

/// Snapshot a directory as relative path -> node, without following links
pub fn scan_directory(root: &Utf8Path) -> Result<BTreeMap<Utf8PathBuf, Node>> {
    let mut entries = BTreeMap::new();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry?;
        let path = entry.path();

        let relative = path.strip_prefix(root).unwrap_or(path);
        let relative = Utf8PathBuf::from_path_buf(relative.to_path_buf())
            .map_err(|p| TreeError::NonUtf8(format!("{:?}", p)))?;

        // Skip the root directory itself
        if relative.as_str().is_empty() {
            continue;
        }

        let node = if entry.path_is_symlink() {
            let target = fs::read_link(path)?;
            Node::Symlink(
                Utf8PathBuf::from_path_buf(target)
                    .map_err(|p| TreeError::NonUtf8(format!("{:?}", p)))?,
            )
        } else if entry.file_type().is_dir() {
            Node::Dir
        } else {
            Node::File(blake3::hash(&fs::read(path)?).to_hex().to_string())
        };

        entries.insert(relative, node);
    }

    Ok(entries)
}

/// Describe how two directories differ; empty when they hold the same tree
pub fn diff_directories(expected: &Utf8Path, actual: &Utf8Path) -> Result<Vec<String>> {
    let expected = scan_directory(expected)?;
    let actual = scan_directory(actual)?;
    let mut differences = Vec::new();

    for (path, node) in &expected {
        match actual.get(path) {
            None => differences.push(format!("missing: {}", path)),
            Some(other) if other != node => {
                differences.push(format!("changed: {} ({:?} vs {:?})", path, node, other))
            }
            Some(_) => {}
        }
    }
    for path in actual.keys().filter(|p| !expected.contains_key(*p)) {
        differences.push(format!("unexpected: {}", path));
    }

    Ok(differences)
}
