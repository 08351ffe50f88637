//! Configuration file parsing and merging
//!
//! This module handles parsing of `siteship.toml` and `siteship.local.toml`.
//! The local file is overlaid on the base file: tables merge recursively,
//! arrays and scalars from the local file replace the base value.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::deploy::parse_ssh_target;
use crate::executor::RemoteHost;
use crate::{Error, Result};

/// Name of the main configuration file
pub const CONFIG_FILE: &str = "siteship.toml";

/// Name of the untracked override file
pub const LOCAL_CONFIG_FILE: &str = "siteship.local.toml";

/// Main configuration structure for siteship
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Archive settings
    pub archive: ArchiveConfig,

    /// Filesystem layout on every target
    pub layout: LayoutConfig,

    /// Local smoke-test target
    pub local: LocalConfig,

    /// Remote hosts and login settings
    pub remote: RemoteConfig,

    /// Where deploy records are kept
    pub state: StateConfig,
}

/// Archive configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Directory to pack (default: "web_static")
    pub source_dir: Utf8PathBuf,

    /// Directory archives are written to (default: "versions")
    pub output_dir: Utf8PathBuf,

    /// Archive name prefix (default: file name of `source_dir`)
    pub prefix: Option<String>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            source_dir: Utf8PathBuf::from("web_static"),
            output_dir: Utf8PathBuf::from("versions"),
            prefix: None,
        }
    }
}

/// How the `current` symlink is switched to a new release
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchStrategy {
    /// Remove the old link, then create the new one
    #[default]
    Replace,
    /// Create the new link under a temporary name and rename it over the old one
    Atomic,
}

/// Release layout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Root holding `releases/` and the `current` link (default: "/data/web_static")
    pub root: Utf8PathBuf,

    /// Upload directory on remote hosts (default: "/tmp")
    pub remote_tmp: Utf8PathBuf,

    /// Symlink switch strategy (default: replace)
    pub switch: SwitchStrategy,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            root: Utf8PathBuf::from("/data/web_static"),
            remote_tmp: Utf8PathBuf::from("/tmp"),
            switch: SwitchStrategy::Replace,
        }
    }
}

/// Local target configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Activate on the controlling host before any remote host (default: true)
    pub enabled: bool,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// What the orchestrator does after a remote host fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Keep deploying to the remaining hosts
    #[default]
    Continue,
    /// Stop at the first failed host
    Stop,
}

/// Remote hosts configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Login user applied to hosts that do not name one
    pub user: Option<String>,

    /// Private key passed to ssh and scp
    pub identity_file: Option<Utf8PathBuf>,

    /// Hosts in deployment order, as "host", "user@host" or "user@host:port"
    pub hosts: Vec<String>,

    /// Behavior after a failed host (default: continue)
    pub on_failure: FailurePolicy,
}

/// Deploy state configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// State directory relative to the project root (default: ".siteship")
    pub dir: Utf8PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            dir: Utf8PathBuf::from(".siteship"),
        }
    }
}

impl Config {
    /// Load configuration from a project directory.
    ///
    /// This loads `siteship.toml` and merges `siteship.local.toml` over it if it exists.
    pub fn load(project_root: &Utf8Path) -> Result<Self> {
        let config_path = project_root.join(CONFIG_FILE);
        let local_config_path = project_root.join(LOCAL_CONFIG_FILE);

        let base_config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str::<toml::Value>(&content)?
        } else {
            toml::Value::Table(toml::map::Map::new())
        };

        let local_config = if local_config_path.exists() {
            let content = std::fs::read_to_string(&local_config_path)?;
            Some(toml::from_str::<toml::Value>(&content)?)
        } else {
            None
        };

        let merged = match local_config {
            Some(local) => merge_toml_values(base_config, local),
            None => base_config,
        };

        let config: Config = merged.try_into()?;
        config.validate()?;

        tracing::debug!(
            root = %project_root,
            hosts = config.remote.hosts.len(),
            "Loaded configuration"
        );

        Ok(config)
    }

    /// Load configuration from a string
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.archive.source_dir.as_str().is_empty() {
            return Err(Error::config(
                "archive.source_dir cannot be empty",
                "Point archive.source_dir at the directory holding the static site",
            ));
        }

        // Release ids end at the first '.' of the archive name
        let prefix = self.archive_prefix();
        if prefix.is_empty() || prefix.contains('/') || prefix.contains('.') {
            return Err(Error::config(
                format!("Invalid archive prefix: {:?}", prefix),
                "Set archive.prefix to a non-empty file name without '/' or '.'",
            ));
        }

        if !self.layout.root.is_absolute() {
            return Err(Error::config(
                format!("layout.root must be absolute, got {}", self.layout.root),
                "Use an absolute path such as /data/web_static",
            ));
        }

        if !self.layout.remote_tmp.is_absolute() {
            return Err(Error::config(
                format!(
                    "layout.remote_tmp must be absolute, got {}",
                    self.layout.remote_tmp
                ),
                "Use an absolute path such as /tmp",
            ));
        }

        if let Some(host) = self.remote.hosts.iter().find(|h| h.trim().is_empty()) {
            return Err(Error::config(
                format!("Empty entry in remote.hosts: {:?}", host),
                "Remove the blank host entry",
            ));
        }

        Ok(())
    }

    /// Prefix used in archive names
    pub fn archive_prefix(&self) -> String {
        match &self.archive.prefix {
            Some(prefix) => prefix.clone(),
            None => self
                .archive
                .source_dir
                .file_name()
                .unwrap_or(self.archive.source_dir.as_str())
                .to_string(),
        }
    }

    /// Directory holding one subdirectory per release
    pub fn releases_dir(&self) -> Utf8PathBuf {
        self.layout.root.join("releases")
    }

    /// The `current` symlink
    pub fn current_link(&self) -> Utf8PathBuf {
        self.layout.root.join("current")
    }

    /// Remote hosts in configured order, with login settings applied
    pub fn remote_targets(&self) -> Vec<RemoteHost> {
        let identity_file = self.remote.identity_file.as_deref().map(expand_home);

        self.remote
            .hosts
            .iter()
            .map(|entry| {
                let (destination, port) = parse_ssh_target(entry.trim());
                let (user, host) = match destination.split_once('@') {
                    Some((user, host)) => (Some(user.to_string()), host.to_string()),
                    None => (self.remote.user.clone(), destination.to_string()),
                };

                RemoteHost {
                    host,
                    user,
                    port,
                    identity_file: identity_file.clone(),
                }
            })
            .collect()
    }

    /// State directory for a project
    pub fn state_dir(&self, project_root: &Utf8Path) -> Utf8PathBuf {
        project_root.join(&self.state.dir)
    }
}

/// Expand a leading `~/` using `$HOME`
fn expand_home(path: &Utf8Path) -> Utf8PathBuf {
    match (path.strip_prefix("~"), std::env::var("HOME")) {
        (Ok(rest), Ok(home)) => Utf8PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

/// Merge two TOML values:
/// - Tables: recursively merged
/// - Arrays: local replaces base (not merged)
/// - Primitives: local overrides base
fn merge_toml_values(base: toml::Value, local: toml::Value) -> toml::Value {
    match (base, local) {
        (toml::Value::Table(mut base_table), toml::Value::Table(local_table)) => {
            for (key, local_value) in local_table {
                if let Some(base_value) = base_table.remove(&key) {
                    base_table.insert(key, merge_toml_values(base_value, local_value));
                } else {
                    base_table.insert(key, local_value);
                }
            }
            toml::Value::Table(base_table)
        }
        (_, local) => local,
    }
}
