//! Integration tests for packing
//!
//! Archives are extracted with the system `tar` and compared with the source
//! directory they were packed from.

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{NaiveDate, NaiveDateTime};
use siteship_core::archive::ArchiveBuilder;
use siteship_core::config::Config;
use siteship_integration_tests::tree::diff_directories;
use siteship_integration_tests::write_site;
use std::process::Command;
use tempfile::TempDir;

fn example_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(3, 4, 5)
        .unwrap()
}

fn scratch() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let root = Utf8Path::from_path(temp_dir.path()).unwrap().to_path_buf();
    (temp_dir, root)
}

#[test]
fn test_archive_extracts_to_source_tree() {
    let (_temp, root) = scratch();
    let site = write_site(&root).unwrap();

    let archive = ArchiveBuilder::new(root.join("versions"), "web_static")
        .pack_at(&site, example_time())
        .unwrap();
    assert_eq!(
        archive.path,
        root.join("versions/web_static_20240102030405.tgz")
    );

    let out = root.join("out");
    std::fs::create_dir_all(&out).unwrap();
    let status = Command::new("tar")
        .args(["-xzf", archive.path.as_str(), "-C", out.as_str()])
        .status()
        .unwrap();
    assert!(status.success());

    // Exactly one top-level entry, named after the source folder
    let top: Vec<_> = std::fs::read_dir(&out)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(top, vec!["web_static"]);

    let differences = diff_directories(&site, &out.join("web_static")).unwrap();
    assert!(differences.is_empty(), "{:#?}", differences);
}

#[test]
fn test_pack_from_project_config() {
    let (_temp, root) = scratch();
    let site = write_site(&root).unwrap();
    std::fs::rename(&site, root.join("public")).unwrap();
    std::fs::write(
        root.join("siteship.toml"),
        "[archive]\nsource_dir = \"public\"\noutput_dir = \"dist/archives\"\n",
    )
    .unwrap();

    let config = Config::load(&root).unwrap();
    assert_eq!(config.archive_prefix(), "public");

    let archive = ArchiveBuilder::new(
        root.join(&config.archive.output_dir),
        config.archive_prefix(),
    )
    .pack_at(&root.join(&config.archive.source_dir), example_time())
    .unwrap();

    assert_eq!(
        archive.path,
        root.join("dist/archives/public_20240102030405.tgz")
    );
    assert_eq!(archive.release_id(), "public_20240102030405");
}

#[test]
fn test_failed_pack_leaves_no_archive() {
    let (_temp, root) = scratch();

    let result = ArchiveBuilder::new(root.join("versions"), "web_static")
        .pack_at(&root.join("web_static"), example_time());

    assert!(result.is_err());
    let produced = root
        .join("versions")
        .read_dir_utf8()
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(produced, 0);
}
