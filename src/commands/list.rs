use crate::Context;
use crate::cli::ListArgs;
use crate::loader;
use crate::paths;
use crate::ui;
use anyhow::{Context as _, Result};
use colored::Colorize;
use serde::Serialize;

#[derive(Serialize)]
struct PackageEntry<'a> {
    name: &'a str,
    provides: Option<&'a str>,
    description: Option<&'a str>,
    version: Option<&'a str>,
    requires: &'a [String],
    recommends: &'a [String],
    optional: &'a [String],
    installers: Vec<&'static str>,
    verifications: usize,
}

#[derive(Serialize)]
struct PolicyEntry<'a> {
    name: &'a str,
    roles: &'a [String],
    packages: &'a [String],
}

#[derive(Serialize)]
struct Listing<'a> {
    packages: Vec<PackageEntry<'a>>,
    virtual_packages: Vec<(&'a str, &'a [String])>,
    policies: Vec<PolicyEntry<'a>>,
}

pub fn run(_ctx: &Context, args: ListArgs) -> Result<()> {
    let script = paths::resolve_script(&args.script)?;
    let loaded = loader::load(&script, None)?;

    let listing = Listing {
        packages: loaded
            .registry
            .packages()
            .map(|p| PackageEntry {
                name: p.name(),
                provides: p.provides(),
                description: p.description(),
                version: p.version(),
                requires: p.dependencies(),
                recommends: p.recommends(),
                optional: p.optional(),
                installers: p.installers().iter().map(|i| i.kind_name()).collect(),
                verifications: p.verifications().len(),
            })
            .collect(),
        virtual_packages: loaded.registry.virtual_names().collect(),
        policies: loaded
            .policies
            .iter()
            .map(|p| PolicyEntry {
                name: p.name(),
                roles: p.roles(),
                packages: p.packages(),
            })
            .collect(),
    };

    if args.json {
        let json = serde_json::to_string_pretty(&listing).context("Failed to serialize listing")?;
        println!("{json}");
        return Ok(());
    }

    ui::header(&format!("Packages ({})", listing.packages.len()));
    for entry in &listing.packages {
        let version = entry.version.map(|v| format!(" {v}")).unwrap_or_default();
        let provides = entry
            .provides
            .map(|v| format!(" provides {v}").dimmed().to_string())
            .unwrap_or_default();
        println!("  {}{}{}", entry.name.bold(), version, provides);
        if let Some(description) = entry.description {
            ui::dim(&format!("  {description}"));
        }
        if !entry.requires.is_empty() {
            ui::kv("  requires", &entry.requires.join(", "));
        }
    }

    if !listing.virtual_packages.is_empty() {
        ui::section("Virtual packages");
        for (name, providers) in &listing.virtual_packages {
            ui::kv(name, &providers.join(", "));
        }
    }

    ui::section("Policies");
    for policy in &listing.policies {
        println!(
            "  {} {} {}",
            policy.name.bold(),
            format!("[{}]", policy.roles.join(", ")).cyan(),
            policy.packages.join(", ")
        );
    }

    Ok(())
}
