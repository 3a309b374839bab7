use colored::Colorize;
use provision::{PackageOutcome, RunSummary};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

// ============================================================================
// Outcomes
// ============================================================================

/// Colored symbol for a package outcome
pub fn outcome_symbol(outcome: PackageOutcome) -> String {
    match outcome {
        PackageOutcome::AlreadySatisfied => "○".dimmed().to_string(),
        PackageOutcome::Installed => "✓".green().to_string(),
        PackageOutcome::Meta => "◇".blue().to_string(),
        PackageOutcome::Simulated => "~".yellow().to_string(),
    }
}

/// Human label for a package outcome
pub fn outcome_label(outcome: PackageOutcome) -> &'static str {
    match outcome {
        PackageOutcome::AlreadySatisfied => "already installed",
        PackageOutcome::Installed => "installed",
        PackageOutcome::Meta => "meta",
        PackageOutcome::Simulated => "simulated",
    }
}

/// Print the end-of-run summary
pub fn summary(summary: &RunSummary) {
    println!();
    let mut parts = Vec::new();
    if summary.installed > 0 {
        parts.push(format!("{} installed", summary.installed).green().to_string());
    }
    if summary.already_satisfied > 0 {
        parts.push(format!("{} already installed", summary.already_satisfied));
    }
    if summary.meta > 0 {
        parts.push(format!("{} meta", summary.meta).dimmed().to_string());
    }
    if summary.simulated > 0 {
        parts.push(format!("{} simulated", summary.simulated).yellow().to_string());
    }

    if parts.is_empty() {
        dim("Nothing to do");
    } else {
        println!("{} {}", "Summary:".bold(), parts.join(", "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_labels() {
        assert_eq!(outcome_label(PackageOutcome::AlreadySatisfied), "already installed");
        assert_eq!(outcome_label(PackageOutcome::Simulated), "simulated");
    }
}
