use super::Session;
use crate::Context;
use crate::cli::RunArgs;
use crate::ui;
use anyhow::Result;
use colored::Colorize;
use provision::PackageStatus;

pub fn run(ctx: &Context, args: RunArgs) -> Result<()> {
    let session = Session::open(&args)?;
    let deployment = session.deployment();
    let mut chooser = session.chooser(&args);

    let checks = deployment.check(&mut chooser)?;

    ui::header("Package status");
    let mut missing = 0;
    for policy in &checks {
        ui::section(&format!("Policy {} on {}", policy.name, policy.roles.join(", ")));
        for (name, status) in &policy.packages {
            match status {
                PackageStatus::Satisfied => println!("  {} {}", "✓".green(), name),
                PackageStatus::Meta => println!("  {} {} {}", "◇".blue(), name, "(meta)".dimmed()),
                PackageStatus::Unverified => {
                    println!("  {} {} {}", "?".yellow(), name, "(no verifications)".dimmed());
                }
                PackageStatus::Missing { verifier, check } => {
                    missing += 1;
                    println!("  {} {} {}", "✗".red(), name, format!("({verifier})").dimmed());
                    if ctx.verbose > 0 {
                        ui::dim(&format!("    failed: {check}"));
                    }
                }
            }
        }
    }

    println!();
    if missing == 0 {
        ui::success("All verified packages are installed");
    } else {
        ui::warn(&format!("{missing} package(s) not installed"));
    }
    Ok(())
}
