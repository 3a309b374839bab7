//! Installers turn one package-level declaration into remote commands
//!
//! Every installer follows the same protocol in [`Installer::process`]:
//! pre-commands (user hooks plus structural prerequisites) are submitted as
//! one joined string, then the primary step(s), then post-commands (user
//! hooks plus ownership adjustments). Installers never touch package state.

mod package_manager;
mod push_text;
mod source;
mod transfer;

pub use package_manager::PackageManager;

use crate::context::InstallContext;
use crate::error::{Error, Result};
use crate::shell::{join, quote};
use crate::types::{InstallerDefaults, InstallerOptions};
use std::path::PathBuf;
use tempfile::NamedTempFile;

/// The closed set of installer variants
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallerKind {
    /// OS or language package manager
    PackageManager {
        manager: PackageManager,
        packages: Vec<String>,
    },
    /// Upload a local file or directory
    Transfer { source: String, destination: String },
    /// Append text to a remote file
    PushText { text: String, path: String },
    /// Download, configure, build and install a source archive
    Source { url: String },
    /// Download a prebuilt archive and extract it into the prefix
    Binary { url: String },
    /// Run tasks with a task runner
    Task { tasks: Vec<String> },
    /// Only user pre/post hooks
    Noop,
}

impl InstallerKind {
    /// Name used for per-kind defaults and logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::PackageManager { manager, .. } => manager.name(),
            Self::Transfer { .. } => "transfer",
            Self::PushText { .. } => "push_text",
            Self::Source { .. } => "source",
            Self::Binary { .. } => "binary",
            Self::Task { .. } => "task",
            Self::Noop => "noop",
        }
    }
}

/// One primary action of an installer
enum Step {
    Run(String),
    Transfer {
        source: PathBuf,
        destination: String,
        recursive: bool,
        // Keeps a rendered template on disk until the transfer is done
        _rendered: Option<NamedTempFile>,
    },
}

/// An installer bound to its parent package
#[derive(Debug, Clone, PartialEq)]
pub struct Installer {
    package: String,
    kind: InstallerKind,
    options: InstallerOptions,
}

impl Installer {
    pub fn new(package: impl Into<String>, kind: InstallerKind, options: InstallerOptions) -> Self {
        Self {
            package: package.into(),
            kind,
            options,
        }
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn kind(&self) -> &InstallerKind {
        &self.kind
    }

    pub fn options(&self) -> &InstallerOptions {
        &self.options
    }

    pub fn kind_name(&self) -> &'static str {
        self.kind.name()
    }

    /// Copy of this installer with deployment defaults filled in
    ///
    /// Own options win over per-kind defaults, which win over global ones.
    pub fn configured(&self, defaults: &InstallerDefaults) -> Self {
        let mut configured = self.clone();
        configured
            .options
            .inherit(&defaults.for_kind(self.kind_name()));
        configured
    }

    /// Policy roles narrowed by this installer's `roles` option
    pub fn target_roles(&self, roles: &[String]) -> Vec<String> {
        match &self.options.roles {
            Some(only) => roles.iter().filter(|r| only.contains(r)).cloned().collect(),
            None => roles.to_vec(),
        }
    }

    /// User pre hooks followed by structural prerequisites
    pub fn pre_commands(&self) -> Result<Vec<String>> {
        let mut commands = self.options.pre.clone();
        let sudo = self.options.sudo_prefix();
        match &self.kind {
            InstallerKind::Transfer { destination, .. } if self.options.mkdir() => {
                commands.push(transfer::mkdir_command(destination, sudo));
            }
            InstallerKind::Source { url } => {
                commands.extend(source::Source::new(url, &self.options)?.prepare_commands(sudo));
            }
            InstallerKind::Binary { url } => {
                commands.extend(source::Binary::new(url, &self.options)?.prepare_commands(sudo));
            }
            _ => {}
        }
        Ok(commands)
    }

    /// Primary shell commands; transfers are not included
    pub fn install_commands(&self) -> Result<Vec<String>> {
        let sudo = self.options.sudo_prefix();
        let commands = match &self.kind {
            InstallerKind::PackageManager { manager, packages } => {
                manager.install_commands(packages, &self.options)
            }
            InstallerKind::PushText { text, path } => {
                vec![push_text::append_command(text, path, sudo)]
            }
            InstallerKind::Source { url } => {
                source::Source::new(url, &self.options)?.install_commands(sudo)?
            }
            InstallerKind::Binary { url } => {
                source::Binary::new(url, &self.options)?.install_commands(sudo)?
            }
            InstallerKind::Task { tasks } => {
                let file = self
                    .options
                    .file
                    .as_deref()
                    .map(|f| format!("-f {} ", quote(f)))
                    .unwrap_or_default();
                vec![format!("{sudo}rake {file}{}", tasks.join(" "))]
            }
            InstallerKind::Transfer { .. } | InstallerKind::Noop => Vec::new(),
        };
        Ok(commands)
    }

    /// User post hooks followed by ownership and permission adjustments
    pub fn post_commands(&self) -> Vec<String> {
        let mut commands = self.options.post.clone();
        let target = match &self.kind {
            InstallerKind::Transfer { destination, .. } => Some(destination),
            InstallerKind::PushText { path, .. } => Some(path),
            _ => None,
        };
        if let Some(target) = target {
            commands.extend(self.ownership_commands(target));
        }
        commands
    }

    fn ownership_commands(&self, target: &str) -> Vec<String> {
        let sudo = self.options.sudo_prefix();
        let verbose = if self.options.verbose() { "-v " } else { "" };
        let target = quote(target);

        let adjustments = [
            ("chown", self.options.owner.clone()),
            ("chgrp", self.options.group.clone()),
            ("chmod", self.options.mode.as_ref().map(crate::types::Mode::to_arg)),
        ];

        adjustments
            .into_iter()
            .filter_map(|(cmd, value)| {
                value.map(|value| format!("{sudo}{cmd} {verbose}{value} {target}"))
            })
            .collect()
    }

    fn steps(&self, ctx: &InstallContext<'_>) -> Result<Vec<Step>> {
        if let InstallerKind::Transfer {
            source,
            destination,
        } = &self.kind
        {
            let source_path = PathBuf::from(source);
            let step = if self.options.render() {
                let rendered = crate::template::render_to_tempfile(
                    ctx.renderer,
                    &source_path,
                    ctx.vars,
                    &self.package,
                )?;
                log::info!(
                    "Rendering template {source} to temporary file {}",
                    rendered.path().display()
                );
                Step::Transfer {
                    source: rendered.path().to_path_buf(),
                    destination: destination.clone(),
                    recursive: false,
                    _rendered: Some(rendered),
                }
            } else {
                Step::Transfer {
                    source: source_path,
                    destination: destination.clone(),
                    recursive: self.options.recursive(),
                    _rendered: None,
                }
            };
            return Ok(vec![step]);
        }

        Ok(self
            .install_commands()?
            .into_iter()
            .map(Step::Run)
            .collect())
    }

    /// Submit this installer's commands for `roles`
    ///
    /// In testing mode nothing is delivered; commands are only logged.
    pub fn process(&self, ctx: &InstallContext<'_>, roles: &[String]) -> Result<()> {
        let roles = self.target_roles(roles);
        if roles.is_empty() {
            log::debug!(
                "{} {} installer skipped: no matching roles",
                self.package,
                self.kind_name()
            );
            return Ok(());
        }

        let pre = self.pre_commands()?;
        let steps = self.steps(ctx)?;
        let post = self.post_commands();

        if ctx.testing() {
            self.log_simulated(&pre, &steps, &post, &roles);
            return Ok(());
        }

        if !pre.is_empty() {
            let sequence = join(&pre);
            log::info!(
                "{} pre-{} commands: {sequence} for roles: {roles:?}",
                self.package,
                self.kind_name()
            );
            self.run(ctx, &sequence, &roles)?;
        }

        for step in &steps {
            match step {
                Step::Run(command) => {
                    log::info!("--> {} {}: {command}", self.package, self.kind_name());
                    self.run(ctx, command, &roles)?;
                }
                Step::Transfer {
                    source,
                    destination,
                    recursive,
                    ..
                } => {
                    log::info!(
                        "--> Transferring {} to {destination} for roles: {roles:?}",
                        source.display()
                    );
                    ctx.delivery
                        .transfer(&self.package, source, destination, &roles, *recursive)
                        .map_err(|e| Error::delivery(&self.package, &roles, e))?;
                }
            }
        }

        if !post.is_empty() {
            let sequence = join(&post);
            log::info!(
                "{} post-{} commands: {sequence} for roles: {roles:?}",
                self.package,
                self.kind_name()
            );
            self.run(ctx, &sequence, &roles)?;
        }

        Ok(())
    }

    fn run(&self, ctx: &InstallContext<'_>, commands: &str, roles: &[String]) -> Result<()> {
        ctx.delivery
            .run(&self.package, commands, roles)
            .map_err(|e| Error::delivery(&self.package, roles, e))
    }

    fn log_simulated(&self, pre: &[String], steps: &[Step], post: &[String], roles: &[String]) {
        if !pre.is_empty() {
            log::info!("{} [testing] pre: {}", self.package, join(pre));
        }
        for step in steps {
            match step {
                Step::Run(command) => log::info!("{} [testing] {command}", self.package),
                Step::Transfer {
                    source,
                    destination,
                    ..
                } => log::info!(
                    "{} [testing] transfer {} -> {destination}",
                    self.package,
                    source.display()
                ),
            }
        }
        if !post.is_empty() {
            log::info!("{} [testing] post: {}", self.package, join(post));
        }
        log::debug!("{} [testing] roles: {roles:?}", self.package);
    }
}
