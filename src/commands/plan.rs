use super::Session;
use crate::Context;
use crate::cli::RunArgs;
use crate::ui;
use anyhow::Result;
use colored::Colorize;
use provision::{InstallerDefaults, Package, ResolveObserver};

/// Collects dependency edges as indented tree lines
#[derive(Default)]
struct TreePrinter {
    lines: Vec<String>,
}

impl ResolveObserver for TreePrinter {
    fn on_dependency(&mut self, dependent: &Package, dependency: &Package, depth: usize) {
        self.lines.push(format!(
            "{}{} {} {}",
            "  ".repeat(depth),
            dependent.name(),
            "->".dimmed(),
            dependency.name()
        ));
    }
}

pub fn run(ctx: &Context, args: RunArgs) -> Result<()> {
    let session = Session::open(&args)?;
    let deployment = session.deployment();
    let mut chooser = session.chooser(&args);
    let mut tree = TreePrinter::default();

    let plan = deployment.plan(&mut chooser, &mut tree)?;

    ui::header("Install plan");
    if !tree.lines.is_empty() {
        ui::section("Dependencies");
        for line in &tree.lines {
            println!("{line}");
        }
    }

    for planned in &plan.policies {
        let roles = planned.policy.roles();
        ui::section(&format!(
            "Policy {} on {}",
            planned.policy.name(),
            roles.join(", ")
        ));

        for (i, package) in planned.packages.iter().enumerate() {
            let kind = if package.is_meta() { " (meta)".dimmed().to_string() } else { String::new() };
            println!("  {:>3}. {}{}", i + 1, package.name().bold(), kind);

            if args.testing {
                print_commands(package, &session.loaded.script.defaults, roles)?;
            }
        }
    }

    println!();
    ui::info(&format!("{} package runs planned", plan.total()));
    Ok(())
}

/// Show the commands each installer would submit
fn print_commands(package: &Package, defaults: &InstallerDefaults, roles: &[String]) -> Result<()> {
    for installer in package.installers() {
        let installer = installer.configured(defaults);
        let targets = installer.target_roles(roles);
        if targets.is_empty() {
            ui::dim(&format!("{}: skipped, no matching roles", installer.kind_name()));
            continue;
        }

        let mut commands = installer.pre_commands()?;
        commands.extend(installer.install_commands()?);
        if let provision::InstallerKind::Transfer {
            source,
            destination,
        } = installer.kind()
        {
            commands.push(format!("upload {source} -> {destination}"));
        }
        commands.extend(installer.post_commands());

        for command in commands {
            ui::dim(&format!("[{}] {}", installer.kind_name(), command));
        }
    }
    Ok(())
}
