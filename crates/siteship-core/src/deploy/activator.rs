//! Release activation on a single target
//!
//! Activation stages an archive into `<releases_dir>/<release_id>` and points
//! the `current` symlink at it. The steps run strictly in order and the first
//! failure aborts the rest.
//!
//! Partially staged releases are left on disk when a step fails. Nothing is
//! rolled back: a failure before the link step leaves the previous `current`
//! link untouched, a failure during the [`SwitchStrategy::Replace`] link step
//! can leave the target without a `current` link.

use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use std::time::Instant;

use super::utils::release_id_from_archive;
use crate::archive::top_level_dir;
use crate::config::{Config, SwitchStrategy};
use crate::executor::{RemoteExecutor, Target, shell_escape};
use crate::{Error, Result};

/// Where releases live on every target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseLayout {
    /// Directory holding one subdirectory per release
    pub releases_dir: Utf8PathBuf,
    /// The `current` symlink
    pub current_link: Utf8PathBuf,
    /// Upload directory on remote targets
    pub remote_tmp: Utf8PathBuf,
    /// How the `current` link is switched
    pub switch: SwitchStrategy,
}

impl ReleaseLayout {
    /// Layout described by a configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            releases_dir: config.releases_dir(),
            current_link: config.current_link(),
            remote_tmp: config.layout.remote_tmp.clone(),
            switch: config.layout.switch,
        }
    }

    /// Directory a release is staged into
    pub fn release_path(&self, release_id: &str) -> Utf8PathBuf {
        self.releases_dir.join(release_id)
    }
}

/// Steps of an activation, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationStep {
    /// Copy the archive to the target's upload directory
    Transfer,
    /// Create the release directory
    CreateReleaseDir,
    /// Unpack the archive into the release directory
    Extract,
    /// Delete the uploaded archive copy
    RemoveUpload,
    /// Move the archive's top-level directory contents up one level
    Flatten,
    /// Delete the old `current` link
    RemoveCurrent,
    /// Point `current` at the release
    LinkCurrent,
}

impl fmt::Display for ActivationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActivationStep::Transfer => "transfer archive",
            ActivationStep::CreateReleaseDir => "create release directory",
            ActivationStep::Extract => "extract archive",
            ActivationStep::RemoveUpload => "remove uploaded archive",
            ActivationStep::Flatten => "flatten release",
            ActivationStep::RemoveCurrent => "remove current link",
            ActivationStep::LinkCurrent => "link current release",
        };
        f.write_str(name)
    }
}

/// A release staged and activated on a target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    /// Identifier derived from the archive name
    pub id: String,
    /// Target the release lives on
    pub target: Target,
    /// Staged directory
    pub path: Utf8PathBuf,
}

/// Outcome of activating on one target
#[derive(Debug, Clone)]
pub struct ActivationResult {
    /// Target name
    pub target: String,
    /// Whether the `current` link now points at the release
    pub success: bool,
    /// The activated release on success
    pub release: Option<Release>,
    /// Step that failed, `None` for a failed precondition
    pub failed_step: Option<ActivationStep>,
    /// Error message on failure
    pub error: Option<String>,
    /// Duration of the activation
    pub duration_ms: u64,
}

/// Drives the activation sequence through a [`RemoteExecutor`]
#[derive(Debug, Clone)]
pub struct ReleaseActivator {
    layout: ReleaseLayout,
}

impl ReleaseActivator {
    /// Create an activator for a layout
    pub fn new(layout: ReleaseLayout) -> Self {
        Self { layout }
    }

    /// The layout releases are staged into
    pub fn layout(&self) -> &ReleaseLayout {
        &self.layout
    }

    /// Activate, reporting only whether it worked
    ///
    /// Errors are logged and collapsed into `false`.
    pub fn activate(&self, archive: &Utf8Path, executor: &dyn RemoteExecutor) -> bool {
        match self.try_activate(archive, executor) {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(host = %executor.target(), "{}", e);
                false
            }
        }
    }

    /// Activate an archive on the executor's target
    pub fn try_activate(
        &self,
        archive: &Utf8Path,
        executor: &dyn RemoteExecutor,
    ) -> Result<Release> {
        self.try_activate_with(archive, executor, &|_| {})
    }

    /// Activate, calling `on_step` before each step starts
    pub fn try_activate_with(
        &self,
        archive: &Utf8Path,
        executor: &dyn RemoteExecutor,
        on_step: &dyn Fn(ActivationStep),
    ) -> Result<Release> {
        self.run_steps(archive, executor, on_step)
            .map_err(|failure| match failure {
                StepFailure::Precondition(e) => e,
                StepFailure::Step(step, e) => Error::activation(
                    format!("{} failed on {}: {}", step, executor.target(), e),
                    "The staged release was left in place for inspection; \
                     the current link is unchanged unless the link step failed",
                ),
            })
    }

    /// Activate and summarize the outcome
    pub fn activate_report(
        &self,
        archive: &Utf8Path,
        executor: &dyn RemoteExecutor,
        on_step: &dyn Fn(ActivationStep),
    ) -> ActivationResult {
        let start_time = Instant::now();
        let outcome = self.run_steps(archive, executor, on_step);
        let duration_ms = start_time.elapsed().as_millis() as u64;
        let target = executor.target().name();

        match outcome {
            Ok(release) => ActivationResult {
                target,
                success: true,
                release: Some(release),
                failed_step: None,
                error: None,
                duration_ms,
            },
            Err(failure) => {
                let (failed_step, error) = match failure {
                    StepFailure::Precondition(e) => (None, e.to_string()),
                    StepFailure::Step(step, e) => (Some(step), format!("{}: {}", step, e)),
                };
                tracing::error!(host = %executor.target(), "Activation failed: {}", error);

                ActivationResult {
                    target,
                    success: false,
                    release: None,
                    failed_step,
                    error: Some(error),
                    duration_ms,
                }
            }
        }
    }

    fn run_steps(
        &self,
        archive: &Utf8Path,
        executor: &dyn RemoteExecutor,
        on_step: &dyn Fn(ActivationStep),
    ) -> std::result::Result<Release, StepFailure> {
        if !archive.is_file() {
            return Err(StepFailure::Precondition(Error::activation(
                format!("Archive not found: {}", archive),
                "Run `siteship pack` first or pass the path of an existing archive",
            )));
        }

        let target = executor.target().clone();
        let file_name = archive.file_name().ok_or_else(|| {
            StepFailure::Precondition(Error::activation(
                format!("Archive path has no file name: {}", archive),
                "Pass the path of an archive file",
            ))
        })?;
        let archive_root = top_level_dir(archive).map_err(StepFailure::Precondition)?;
        let release_id = release_id_from_archive(archive);
        let release_path = self.layout.release_path(&release_id);
        let release = shell_escape(release_path.as_str());

        tracing::info!(host = %target, release = %release_id, "Activating release");

        let run = |step: ActivationStep, command: String| {
            on_step(step);
            executor
                .run_command(&command)
                .map(|_| ())
                .map_err(|e| StepFailure::Step(step, e))
        };

        // Local targets unpack the archive where it is
        let upload = if target.is_local() {
            None
        } else {
            Some(self.layout.remote_tmp.join(file_name))
        };
        let archive_on_target = match &upload {
            Some(upload) => {
                on_step(ActivationStep::Transfer);
                executor
                    .copy_file(archive, upload)
                    .map_err(|e| StepFailure::Step(ActivationStep::Transfer, e))?;
                upload.clone()
            }
            None => archive
                .canonicalize_utf8()
                .map_err(|e| StepFailure::Step(ActivationStep::Transfer, e.into()))?,
        };

        run(
            ActivationStep::CreateReleaseDir,
            format!("mkdir -p {}", release),
        )?;

        run(
            ActivationStep::Extract,
            format!(
                "tar -xzf {} -C {}",
                shell_escape(archive_on_target.as_str()),
                release
            ),
        )?;

        if let Some(upload) = &upload {
            run(
                ActivationStep::RemoveUpload,
                format!("rm {}", shell_escape(upload.as_str())),
            )?;
        }

        // Merge rather than rename: the release may already hold these entries
        let nested = shell_escape(release_path.join(&archive_root).as_str());
        run(
            ActivationStep::Flatten,
            format!("cp -a {}/. {}/", nested, release),
        )?;
        run(ActivationStep::Flatten, format!("rm -rf {}", nested))?;

        let current = shell_escape(self.layout.current_link.as_str());
        match self.layout.switch {
            SwitchStrategy::Replace => {
                run(ActivationStep::RemoveCurrent, format!("rm -rf {}", current))?;
                run(
                    ActivationStep::LinkCurrent,
                    format!("ln -s {} {}", release, current),
                )?;
            }
            SwitchStrategy::Atomic => {
                let next = shell_escape(&format!("{}.next", self.layout.current_link));
                run(
                    ActivationStep::LinkCurrent,
                    format!("ln -sfn {release} {next} && mv -Tf {next} {current}"),
                )?;
            }
        }

        tracing::info!(host = %target, release = %release_id, path = %release_path, "Release activated");

        Ok(Release {
            id: release_id,
            target,
            path: release_path,
        })
    }
}

enum StepFailure {
    Precondition(Error),
    Step(ActivationStep, Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{CommandOutput, DryRunExecutor, LocalExecutor, RemoteHost};
    use std::cell::RefCell;
    use std::process::Command;
    use tempfile::TempDir;

    fn layout(root: &Utf8Path) -> ReleaseLayout {
        ReleaseLayout {
            releases_dir: root.join("releases"),
            current_link: root.join("current"),
            remote_tmp: Utf8PathBuf::from("/tmp"),
            switch: SwitchStrategy::Replace,
        }
    }

    /// Build `<dir>/<name>_20240102030405.tgz` holding a `<name>/` site
    fn make_named_archive(dir: &Utf8Path, name: &str) -> Utf8PathBuf {
        let source = dir.join("src").join(name);
        std::fs::create_dir_all(source.join("images")).unwrap();
        std::fs::write(source.join("index.html"), "<h1>hello</h1>").unwrap();
        std::fs::write(source.join(".well-known"), "dot").unwrap();
        std::fs::write(source.join("images/logo.png"), [1u8, 2, 3]).unwrap();

        let archive = dir.join(format!("{}_20240102030405.tgz", name));
        let status = Command::new("tar")
            .args(["-czf", archive.as_str(), "-C", dir.join("src").as_str(), name])
            .status()
            .unwrap();
        assert!(status.success());
        archive
    }

    fn make_archive(dir: &Utf8Path) -> Utf8PathBuf {
        make_named_archive(dir, "web_static")
    }

    /// Executor that fails every command containing `fail_on`
    struct FailingExecutor {
        target: Target,
        fail_on: &'static str,
        commands: RefCell<Vec<String>>,
    }

    impl RemoteExecutor for FailingExecutor {
        fn target(&self) -> &Target {
            &self.target
        }

        fn copy_file(&self, _local: &Utf8Path, _remote: &Utf8Path) -> Result<()> {
            Ok(())
        }

        fn run_command(&self, command: &str) -> Result<CommandOutput> {
            self.commands.borrow_mut().push(command.to_string());
            if command.contains(self.fail_on) {
                return Err(Error::remote_command("test", command, Some(1), "boom"));
            }
            Ok(CommandOutput::default())
        }
    }

    #[test]
    fn test_local_activation_flattens_and_links() {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8Path::from_path(temp_dir.path()).unwrap();
        let archive = make_archive(root);

        let activator = ReleaseActivator::new(layout(&root.join("data")));
        let release = activator
            .try_activate(&archive, &LocalExecutor::new())
            .unwrap();

        let expected = root.join("data/releases/web_static_20240102030405");
        assert_eq!(release.id, "web_static_20240102030405");
        assert_eq!(release.path, expected);
        assert_eq!(release.target, Target::Local);

        assert_eq!(
            std::fs::read_to_string(expected.join("index.html")).unwrap(),
            "<h1>hello</h1>"
        );
        assert!(expected.join(".well-known").exists());
        assert!(!expected.join("web_static").exists());
        assert_eq!(
            std::fs::read_link(root.join("data/current")).unwrap(),
            expected.as_std_path()
        );
    }

    #[test]
    fn test_reactivating_same_release_merges_into_it() {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8Path::from_path(temp_dir.path()).unwrap();
        let archive = make_archive(root);

        let activator = ReleaseActivator::new(layout(&root.join("data")));
        let local = LocalExecutor::new();
        activator.try_activate(&archive, &local).unwrap();
        let release = activator.try_activate(&archive, &local).unwrap();

        assert!(release.path.join("images/logo.png").is_file());
        assert!(!release.path.join("web_static").exists());
        assert_eq!(
            std::fs::read_link(root.join("data/current")).unwrap(),
            release.path.as_std_path()
        );
    }

    #[test]
    fn test_flattens_the_directory_the_archive_holds() {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8Path::from_path(temp_dir.path()).unwrap();
        let archive = make_named_archive(root, "public");

        let activator = ReleaseActivator::new(layout(&root.join("data")));
        let release = activator
            .try_activate(&archive, &LocalExecutor::new())
            .unwrap();

        assert_eq!(release.id, "public_20240102030405");
        assert!(release.path.join("index.html").is_file());
        assert!(!release.path.join("public").exists());
    }

    #[test]
    fn test_archive_without_single_root_runs_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8Path::from_path(temp_dir.path()).unwrap();
        std::fs::write(root.join("a.html"), "a").unwrap();
        std::fs::write(root.join("b.html"), "b").unwrap();
        let archive = root.join("loose_20240102030405.tgz");
        let status = Command::new("tar")
            .args(["-czf", archive.as_str(), "-C", root.as_str(), "a.html", "b.html"])
            .status()
            .unwrap();
        assert!(status.success());

        let executor = DryRunExecutor::new(Target::Remote(RemoteHost::new("web-01")));
        let activator = ReleaseActivator::new(layout(root));

        let err = activator.try_activate(&archive, &executor).unwrap_err();
        assert!(matches!(err, Error::Activation { .. }));
        assert!(executor.planned().is_empty());
    }

    #[test]
    fn test_atomic_switch_replaces_existing_link() {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8Path::from_path(temp_dir.path()).unwrap();
        let archive = make_archive(root);

        let data = root.join("data");
        std::fs::create_dir_all(data.join("releases/old")).unwrap();
        std::os::unix::fs::symlink(data.join("releases/old"), data.join("current")).unwrap();

        let mut layout = layout(&data);
        layout.switch = SwitchStrategy::Atomic;
        let activator = ReleaseActivator::new(layout);
        assert!(activator.activate(&archive, &LocalExecutor::new()));

        assert_eq!(
            std::fs::read_link(data.join("current")).unwrap(),
            data.join("releases/web_static_20240102030405").as_std_path()
        );
        assert!(!data.join("current.next").exists());
    }

    #[test]
    fn test_missing_archive_runs_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8Path::from_path(temp_dir.path()).unwrap();

        let executor = DryRunExecutor::new(Target::Remote(RemoteHost::new("web-01")));
        let activator = ReleaseActivator::new(layout(root));

        assert!(!activator.activate(&root.join("missing.tgz"), &executor));
        assert!(executor.planned().is_empty());
    }

    #[test]
    fn test_remote_command_sequence() {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8Path::from_path(temp_dir.path()).unwrap();
        let archive = make_archive(root);

        let executor = DryRunExecutor::new(Target::Remote(RemoteHost::new("web-01")));
        let activator = ReleaseActivator::new(layout(Utf8Path::new("/data/web_static")));
        let release = activator.try_activate(&archive, &executor).unwrap();
        assert_eq!(
            release.path,
            Utf8PathBuf::from("/data/web_static/releases/web_static_20240102030405")
        );

        let planned = executor.planned();
        assert_eq!(planned.len(), 8);
        assert_eq!(
            planned[0],
            format!("upload {} -> /tmp/web_static_20240102030405.tgz", archive)
        );
        assert_eq!(
            planned[1],
            "mkdir -p '/data/web_static/releases/web_static_20240102030405'"
        );
        assert_eq!(
            planned[2],
            "tar -xzf '/tmp/web_static_20240102030405.tgz' -C '/data/web_static/releases/web_static_20240102030405'"
        );
        assert_eq!(planned[3], "rm '/tmp/web_static_20240102030405.tgz'");
        assert_eq!(
            planned[4],
            "cp -a '/data/web_static/releases/web_static_20240102030405/web_static'/. \
             '/data/web_static/releases/web_static_20240102030405'/"
        );
        assert_eq!(
            planned[5],
            "rm -rf '/data/web_static/releases/web_static_20240102030405/web_static'"
        );
        assert_eq!(planned[6], "rm -rf '/data/web_static/current'");
        assert_eq!(
            planned[7],
            "ln -s '/data/web_static/releases/web_static_20240102030405' '/data/web_static/current'"
        );
    }

    #[test]
    fn test_failure_aborts_remaining_steps() {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8Path::from_path(temp_dir.path()).unwrap();
        let archive = make_archive(root);

        let executor = FailingExecutor {
            target: Target::Remote(RemoteHost::new("web-01")),
            fail_on: "tar -xzf",
            commands: RefCell::new(Vec::new()),
        };
        let activator = ReleaseActivator::new(layout(Utf8Path::new("/data/web_static")));
        let report = activator.activate_report(&archive, &executor, &|_| {});

        assert!(!report.success);
        assert_eq!(report.target, "web-01");
        assert_eq!(report.failed_step, Some(ActivationStep::Extract));
        assert!(report.error.unwrap().starts_with("extract archive"));

        let commands = executor.commands.borrow();
        assert_eq!(commands.len(), 2);
        assert!(commands.iter().all(|c| !c.contains("ln -s")));
    }

    #[test]
    fn test_steps_reported_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8Path::from_path(temp_dir.path()).unwrap();
        let archive = make_archive(root);

        let executor = DryRunExecutor::new(Target::Remote(RemoteHost::new("web-01")));
        let activator = ReleaseActivator::new(layout(Utf8Path::new("/data/web_static")));

        let steps = RefCell::new(Vec::new());
        activator
            .try_activate_with(&archive, &executor, &|step| steps.borrow_mut().push(step))
            .unwrap();

        let mut seen = steps.into_inner();
        seen.dedup();
        assert_eq!(
            seen,
            vec![
                ActivationStep::Transfer,
                ActivationStep::CreateReleaseDir,
                ActivationStep::Extract,
                ActivationStep::RemoveUpload,
                ActivationStep::Flatten,
                ActivationStep::RemoveCurrent,
                ActivationStep::LinkCurrent,
            ]
        );
    }

    #[test]
    fn test_try_activate_names_failed_step() {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8Path::from_path(temp_dir.path()).unwrap();
        let archive = make_archive(root);

        let executor = FailingExecutor {
            target: Target::Local,
            fail_on: "ln -s",
            commands: RefCell::new(Vec::new()),
        };
        let activator = ReleaseActivator::new(layout(Utf8Path::new("/data/web_static")));
        let err = activator.try_activate(&archive, &executor).unwrap_err();

        assert!(matches!(err, Error::Activation { .. }));
        assert!(err.to_string().contains("link current release failed on local"));
    }
}
