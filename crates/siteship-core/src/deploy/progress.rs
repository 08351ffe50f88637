//! Progress display for multi-target deployments
//!
//! One bar counts finished targets; each target being activated gets a
//! spinner showing its current step.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::HashMap;
use std::time::Duration;

use super::ActivationStep;

/// Progress manager for a deployment run
pub struct DeployProgress {
    /// Multi-progress container for all progress bars
    multi: MultiProgress,
    /// Active spinners indexed by target name
    bars: HashMap<String, ProgressBar>,
    /// Finished targets count
    completed: usize,
    /// Failed targets count
    failed: usize,
    /// Total targets count
    total: usize,
    /// Main progress bar showing overall progress
    main_bar: ProgressBar,
}

impl DeployProgress {
    /// Create a new progress manager drawing to stderr
    pub fn new(total: usize) -> Self {
        Self::with_multi(MultiProgress::new(), total)
    }

    /// Create a progress manager that draws nothing
    pub fn hidden(total: usize) -> Self {
        Self::with_multi(
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
            total,
        )
    }

    fn with_multi(multi: MultiProgress, total: usize) -> Self {
        let main_bar = multi.add(ProgressBar::new(total as u64));
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} targets {msg}")
        {
            main_bar.set_style(style.progress_chars("#>-"));
        }
        main_bar.enable_steady_tick(Duration::from_millis(100));

        Self {
            multi,
            bars: HashMap::new(),
            completed: 0,
            failed: 0,
            total,
            main_bar,
        }
    }

    /// Start activating on a target
    pub fn start_target(&mut self, target: &str) {
        let bar = self.multi.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::default_spinner().template("  {spinner:.yellow} {msg}") {
            bar.set_style(style);
        }
        bar.set_message(target.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));

        self.bars.insert(target.to_string(), bar);
    }

    /// Show the step a target is on
    pub fn update_target(&self, target: &str, step: ActivationStep) {
        if let Some(bar) = self.bars.get(target) {
            bar.set_message(format!("{}: {}", target, step));
        }
    }

    /// Mark a target as activated
    pub fn finish_target(&mut self, target: &str) {
        if let Some(bar) = self.bars.remove(target) {
            bar.finish_and_clear();
        }
        self.completed += 1;
        self.main_bar.set_position(self.completed as u64);
    }

    /// Mark a target as failed
    pub fn fail_target(&mut self, target: &str, error: &str) {
        if let Some(bar) = self.bars.remove(target) {
            bar.abandon_with_message(format!("{}: FAILED - {}", target, error));
        }
        self.failed += 1;
        self.completed += 1;
        self.main_bar.set_position(self.completed as u64);
    }

    /// Finish all progress bars
    pub fn finish(&self) {
        self.main_bar.finish_with_message(format!(
            "Deployed {}/{} targets ({} failed)",
            self.completed - self.failed,
            self.total,
            self.failed
        ));
    }
}

impl Drop for DeployProgress {
    fn drop(&mut self) {
        // Clear any remaining progress bars
        for (_, bar) in self.bars.drain() {
            bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_finished_and_failed_targets() {
        let mut progress = DeployProgress::hidden(3);

        progress.start_target("local");
        progress.update_target("local", ActivationStep::Extract);
        progress.finish_target("local");

        progress.start_target("web-01");
        progress.fail_target("web-01", "exit status 1");

        assert_eq!(progress.completed, 2);
        assert_eq!(progress.failed, 1);
        assert!(progress.bars.is_empty());
        assert_eq!(progress.main_bar.position(), 2);

        progress.finish();
        assert_eq!(progress.main_bar.message(), "Deployed 1/3 targets (1 failed)");
        assert!(progress.main_bar.is_finished());
    }
}
