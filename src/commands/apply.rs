use super::Session;
use crate::Context;
use crate::cli::RunArgs;
use crate::progress::RunProgress;
use crate::ui;
use anyhow::Result;

pub fn run(ctx: &Context, args: RunArgs) -> Result<()> {
    let session = Session::open(&args)?;

    if !ctx.quiet {
        ui::header("Applying policies");
        ui::kv("Script", &args.script.display().to_string());
        ui::kv("Packages", &session.loaded.registry.len().to_string());
        if args.testing {
            ui::warn("Testing mode: commands are generated but not run");
        }
        if args.force {
            ui::warn("Force mode: pre-checks are skipped");
        }
    }

    let deployment = session.deployment();
    let mut chooser = session.chooser(&args);
    let mut progress = RunProgress::new(ctx.quiet, ctx.verbose);

    let report = deployment.process(&mut chooser, &mut progress)?;

    if !ctx.quiet {
        ui::summary(&report.summary);
        if report.summary.installed > 0 {
            ui::success(&format!(
                "Installed {} package(s) across {} policies",
                report.summary.installed,
                report.policies.len()
            ));
        } else if report.summary.simulated == 0 {
            ui::success("Everything already installed");
        }
    }

    Ok(())
}
