//! Test support for siteship end-to-end tests
//!
//! - [`recording`]: executors that record every upload and command, and can
//!   be told to fail
//! - [`tree`]: directory snapshots for comparing extracted releases with
//!   their source

pub mod recording;
pub mod tree;

use camino::{Utf8Path, Utf8PathBuf};
use siteship_core::config::Config;

/// Write a small static site into `<root>/web_static`
pub fn write_site(root: &Utf8Path) -> std::io::Result<Utf8PathBuf> {
    let site = root.join("web_static");
    std::fs::create_dir_all(site.join("images"))?;
    std::fs::create_dir_all(site.join(".well-known"))?;
    std::fs::write(site.join("index.html"), "<h1>Holberton</h1>\n")?;
    std::fs::write(site.join("styles.css"), "body { margin: 0; }\n")?;
    std::fs::write(site.join("images/logo.png"), [0x89u8, b'P', b'N', b'G'])?;
    std::fs::write(site.join(".well-known/security.txt"), "Contact: ops@example.com\n")?;
    Ok(site)
}

/// Configuration for a project at `root` whose release layout also lives under `root`
///
/// Releases go to `<root>/data/web_static` and uploads to `<root>/tmp`.
pub fn scratch_config(root: &Utf8Path, hosts: &[&str]) -> Config {
    let mut config = Config::default();
    config.layout.root = root.join("data/web_static");
    config.layout.remote_tmp = root.join("tmp");
    config.remote.user = Some("ubuntu".to_string());
    config.remote.hosts = hosts.iter().map(|h| h.to_string()).collect();
    config
}
