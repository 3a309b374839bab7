//! Turn declaration scripts and package directories into a registry

use crate::paths;
use crate::schema::{Action, InstallSpec, PackageFile, PackageSpec, Script, VerifySpec};
use anyhow::{Context, Result};
use provision::paths::{excludable_file, prefix_config_dir};
use provision::{Declaration, PackageBuilder, Policy, Registry};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A fully loaded script
pub struct Loaded {
    /// Every declared and generated package
    pub registry: Registry,
    /// Policies in file order
    pub policies: Vec<Policy>,
    /// The script itself, with its packages moved into the registry
    pub script: Script,
    /// Resolved prefix for relative local files
    pub config_dir: Option<PathBuf>,
}

/// Load a script plus every package file under its `packages_dirs`
///
/// A `config_dir` passed on the command line wins over `[settings].config_dir`,
/// which is resolved relative to the script.
pub fn load(path: &Path, cli_config_dir: Option<&Path>) -> Result<Loaded> {
    let mut script = Script::load(path)?;
    let base = path.parent().unwrap_or(Path::new(".")).to_path_buf();

    let config_dir = match (cli_config_dir, &script.settings.config_dir) {
        (Some(dir), _) => Some(dir.to_path_buf()),
        (None, Some(dir)) => Some(paths::relative_to(&base, dir)),
        (None, None) => None,
    };
    log::debug!("Config dir: {:?}", config_dir);

    let mut specs: Vec<(String, PackageSpec, PathBuf)> = std::mem::take(&mut script.packages)
        .into_iter()
        .map(|(name, spec)| (name, spec, path.to_path_buf()))
        .collect();

    for dir in &script.settings.packages_dirs {
        let dir = paths::relative_to(&base, dir);
        for file in package_files(&dir)? {
            log::debug!("Loading package file: {}", file.display());
            let loaded = PackageFile::load(&file)?;
            specs.extend(
                loaded
                    .packages
                    .into_iter()
                    .map(|(name, spec)| (name, spec, file.clone())),
            );
        }
    }

    let defaults = &script.defaults;
    if defaults.all.auto_verify.is_some() || defaults.kinds.values().any(|o| o.auto_verify.is_some()) {
        let err = provision::Error::Config("auto_verify can only be set on a push_text step".into());
        return Err(anyhow::Error::new(err).context(format!("Invalid [defaults] in {}", path.display())));
    }

    let mut registry = Registry::new();
    for (name, spec, origin) in &specs {
        let declaration = declare(name, spec, config_dir.as_deref())
            .with_context(|| format!("Invalid package '{}' in {}", name, origin.display()))?;
        registry
            .register_declaration(declaration)
            .with_context(|| format!("Could not register package '{}' from {}", name, origin.display()))?;
    }
    log::info!("Loaded {} packages", registry.len());

    let mut policies = Vec::with_capacity(script.policies.len());
    for p in &script.policies {
        if p.roles.is_empty() {
            let err = provision::Error::Config(format!("policy '{}' targets no roles", p.name));
            return Err(anyhow::Error::new(err).context(format!("Invalid policy in {}", path.display())));
        }
        policies.push(Policy::new(p.name.clone(), p.roles.clone(), p.packages.clone()));
    }

    Ok(Loaded {
        registry,
        policies,
        script,
        config_dir,
    })
}

/// Every `.toml` file below `dir`, sorted, skipping excludable names
fn package_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        anyhow::bail!("Packages directory not found: {}", dir.display());
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !excludable_file(&e.file_name().to_string_lossy()));

    for entry in walker {
        let entry = entry.with_context(|| format!("Could not walk {}", dir.display()))?;
        if entry.file_type().is_file() && entry.path().extension().is_some_and(|ext| ext == "toml") {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Build one package declaration from its TOML form
pub fn declare(
    name: &str,
    spec: &PackageSpec,
    config_dir: Option<&Path>,
) -> provision::Result<Declaration> {
    let mut builder = PackageBuilder::new(name)?;
    builder
        .with_config_dir(config_dir.map(Path::to_path_buf))
        .requires(spec.requires.iter().cloned())
        .recommends(spec.recommends.iter().cloned())
        .optional(spec.optional.iter().cloned())
        .vars(spec.vars.clone())
        .require_apt(spec.require_apt.iter().cloned())
        .require_gem(spec.require_gem.iter().cloned());

    if let Some(provides) = &spec.provides {
        builder.provides(provides.clone());
    }
    if let Some(description) = &spec.description {
        builder.description(description.clone());
    }
    if let Some(version) = &spec.version {
        builder.version(version.clone());
    }

    for step in &spec.install {
        add_step(&mut builder, step, config_dir)?;
    }
    for verify in &spec.verify {
        add_verifier(&mut builder, verify, config_dir)?;
    }

    Ok(builder.build())
}

fn add_step(
    builder: &mut PackageBuilder,
    step: &InstallSpec,
    config_dir: Option<&Path>,
) -> provision::Result<()> {
    let options = step.options.clone();

    if let Some((manager, packages)) = step.action.package_manager() {
        builder.package_manager(manager, packages.iter().cloned(), options);
        return Ok(());
    }

    match &step.action {
        Action::Transfer {
            source,
            destination,
        } => {
            builder.transfer(
                prefix_config_dir(source, config_dir),
                destination.clone(),
                options,
            );
        }
        Action::Template(source) => {
            builder.template(source, options);
        }
        Action::PushText { text, path } => {
            builder.push_text(text.clone(), path.clone(), options);
        }
        Action::Source(url) => {
            builder.source(url.clone(), options);
        }
        Action::Binary(url) => {
            builder.binary(url.clone(), options);
        }
        Action::Task(tasks) => {
            builder.task(tasks.iter().cloned(), options);
        }
        Action::Configuration(files) | Action::Files(files) => {
            builder.configuration(files, &options)?;
        }
        Action::ConfigDir(dirs) => {
            builder.config_dir(dirs, &options)?;
        }
        Action::Noop(true) => {
            builder.noop(options);
        }
        Action::Noop(false) => {
            log::debug!("{}: skipping disabled noop step", builder.name());
        }
        _ => {
            return Err(provision::Error::Config(format!(
                "{}: unsupported install step {:?}",
                builder.name(),
                step.action
            )));
        }
    }
    Ok(())
}

fn add_verifier(
    builder: &mut PackageBuilder,
    spec: &VerifySpec,
    config_dir: Option<&Path>,
) -> provision::Result<()> {
    let description = if spec.description.is_empty() {
        "verification".to_string()
    } else {
        spec.description.clone()
    };
    let verifier = builder.verify(description);

    for path in &spec.has_file {
        verifier.has_file(path.clone());
    }
    for path in &spec.has_directory {
        verifier.has_directory(path.clone());
    }
    for link in &spec.has_symlink {
        verifier.has_symlink(link.path.clone(), link.target.clone());
    }
    for contains in &spec.file_contains {
        verifier.file_contains(contains.path.clone(), contains.text.clone());
    }
    for checksum in &spec.checksum_match {
        let source = prefix_config_dir(&checksum.source, config_dir);
        verifier.checksum_match(Path::new(&source), checksum.destination.clone())?;
    }
    for path in &spec.has_executable {
        verifier.has_executable(path.clone());
    }
    for package in &spec.has_apt {
        verifier.has_apt(package.clone());
    }
    for package in &spec.has_rpm {
        verifier.has_rpm(package.clone());
    }
    for gem in &spec.has_gem {
        verifier.has_gem(gem.name.clone(), gem.version.clone());
    }
    if !spec.ruby_can_load.is_empty() {
        verifier.ruby_can_load(spec.ruby_can_load.clone());
    }
    for name in &spec.has_process {
        verifier.has_process(name.clone());
    }
    for command in &spec.command {
        verifier.command(command.clone());
    }
    Ok(())
}
