//! Progress display for deployment runs

use crate::ui;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use provision::{PackageOutcome, ProgressCallback};
use std::time::Duration;

/// Spinner per policy plus one line per finished package
///
/// The spinner is hidden when quiet, or when verbose logging would
/// interleave with it.
pub struct RunProgress {
    bar: Option<ProgressBar>,
    show_spinner: bool,
    quiet: bool,
}

impl RunProgress {
    pub fn new(quiet: bool, verbose: u8) -> Self {
        Self {
            bar: None,
            show_spinner: !quiet && verbose == 0,
            quiet,
        }
    }

    fn spinner(policy: &str, packages: usize) -> ProgressBar {
        let pb = ProgressBar::new(packages as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} {prefix:.bold} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        pb.set_style(style);
        pb.set_prefix(policy.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    fn println(&self, line: &str) {
        match &self.bar {
            Some(pb) => pb.println(line),
            None => println!("{line}"),
        }
    }
}

impl ProgressCallback for RunProgress {
    fn on_policy_start(&mut self, policy: &str, packages: usize) {
        if self.quiet {
            return;
        }
        ui::section(&format!("Policy {policy} ({packages} packages)"));
        if self.show_spinner {
            self.bar = Some(Self::spinner(policy, packages));
        }
    }

    fn on_package_start(&mut self, package: &str, roles: &[String]) {
        if let Some(pb) = &self.bar {
            pb.set_message(format!("{} on {}", package, roles.join(", ")));
        }
    }

    fn on_package_complete(&mut self, package: &str, outcome: PackageOutcome) {
        if !self.quiet {
            self.println(&format!(
                "  {} {} {}",
                ui::outcome_symbol(outcome),
                package,
                ui::outcome_label(outcome).dimmed()
            ));
        }
        if let Some(pb) = &self.bar {
            pb.inc(1);
        }
    }

    fn on_policy_complete(&mut self, policy: &str) {
        if let Some(pb) = self.bar.take() {
            pb.finish_and_clear();
        }
        if !self.quiet {
            println!("  {} {}", "done".dimmed(), policy.dimmed());
        }
    }
}
