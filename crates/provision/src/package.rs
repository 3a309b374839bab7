//! Packages and their declaration builder

use crate::error::{Error, Result};
use crate::installer::{Installer, InstallerKind, PackageManager};
use crate::paths::{excludable_file, extract_destination, prefix_config_dir};
use crate::types::{InstallerOptions, Vars};
use crate::verifier::Verifier;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A named unit of installable software
///
/// Built once by [`PackageBuilder`] and immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    name: String,
    provides: Option<String>,
    description: Option<String>,
    version: Option<String>,
    dependencies: Vec<String>,
    recommends: Vec<String>,
    optional: Vec<String>,
    installers: Vec<Installer>,
    verifications: Vec<Verifier>,
    vars: Vars,
}

impl Package {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Virtual name this package satisfies
    pub fn provides(&self) -> Option<&str> {
        self.provides.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Hard dependencies, in declaration order
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn recommends(&self) -> &[String] {
        &self.recommends
    }

    pub fn optional(&self) -> &[String] {
        &self.optional
    }

    pub fn installers(&self) -> &[Installer] {
        &self.installers
    }

    pub fn verifications(&self) -> &[Verifier] {
        &self.verifications
    }

    /// Variables available to templates rendered for this package
    pub fn vars(&self) -> &Vars {
        &self.vars
    }

    /// A package without installers only groups its dependencies
    pub fn is_meta(&self) -> bool {
        self.installers.is_empty()
    }
}

/// Output of a builder: the package plus packages it declared implicitly
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub package: Package,
    /// Packages created by `require_apt` / `require_gem`
    pub generated: Vec<Package>,
}

/// Builder for [`Package`] declarations
pub struct PackageBuilder {
    package: Package,
    generated: Vec<Package>,
    config_dir: Option<PathBuf>,
}

impl PackageBuilder {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::Config("no package name supplied".to_string()));
        }
        Ok(Self::named(name))
    }

    fn named(name: String) -> Self {
        Self {
            package: Package {
                name,
                provides: None,
                description: None,
                version: None,
                dependencies: Vec::new(),
                recommends: Vec::new(),
                optional: Vec::new(),
                installers: Vec::new(),
                verifications: Vec::new(),
                vars: Vars::new(),
            },
            generated: Vec::new(),
            config_dir: None,
        }
    }

    /// Directory that relative local paths are resolved against
    pub fn with_config_dir(&mut self, dir: Option<PathBuf>) -> &mut Self {
        self.config_dir = dir;
        self
    }

    pub fn name(&self) -> &str {
        &self.package.name
    }

    pub fn provides(&mut self, virtual_name: impl Into<String>) -> &mut Self {
        self.package.provides = Some(virtual_name.into());
        self
    }

    pub fn description(&mut self, description: impl Into<String>) -> &mut Self {
        self.package.description = Some(description.into());
        self
    }

    pub fn version(&mut self, version: impl Into<String>) -> &mut Self {
        self.package.version = Some(version.into());
        self
    }

    pub fn requires<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.package
            .dependencies
            .extend(names.into_iter().map(Into::into));
        self
    }

    pub fn recommends<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.package
            .recommends
            .extend(names.into_iter().map(Into::into));
        self
    }

    pub fn optional<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.package
            .optional
            .extend(names.into_iter().map(Into::into));
        self
    }

    pub fn var(&mut self, key: impl Into<String>, value: serde_json::Value) -> &mut Self {
        self.package.vars.insert(key.into(), value);
        self
    }

    pub fn vars(&mut self, vars: Vars) -> &mut Self {
        self.package.vars.extend(vars);
        self
    }

    /// Append an installer of any kind
    pub fn installer(&mut self, kind: InstallerKind, options: InstallerOptions) -> &mut Self {
        self.package
            .installers
            .push(Installer::new(self.package.name.clone(), kind, options));
        self
    }

    /// Install with a package manager; gems also recommend `rubygems`
    pub fn package_manager<I, S>(
        &mut self,
        manager: PackageManager,
        packages: I,
        options: InstallerOptions,
    ) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if manager == PackageManager::Gem {
            self.recommend_once("rubygems");
        }
        let packages = packages.into_iter().map(Into::into).collect();
        self.installer(InstallerKind::PackageManager { manager, packages }, options)
    }

    pub fn apt<I, S>(&mut self, packages: I, options: InstallerOptions) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.package_manager(PackageManager::Apt, packages, options)
    }

    pub fn gem(&mut self, name: impl Into<String>, options: InstallerOptions) -> &mut Self {
        self.package_manager(PackageManager::Gem, [name.into()], options)
    }

    /// Build from a source archive; recommends `build_essential`
    pub fn source(&mut self, url: impl Into<String>, options: InstallerOptions) -> &mut Self {
        self.recommend_once("build_essential");
        self.installer(InstallerKind::Source { url: url.into() }, options)
    }

    pub fn binary(&mut self, url: impl Into<String>, options: InstallerOptions) -> &mut Self {
        self.installer(InstallerKind::Binary { url: url.into() }, options)
    }

    pub fn task<I, S>(&mut self, tasks: I, options: InstallerOptions) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tasks = tasks.into_iter().map(Into::into).collect();
        self.installer(InstallerKind::Task { tasks }, options)
    }

    pub fn noop(&mut self, options: InstallerOptions) -> &mut Self {
        self.installer(InstallerKind::Noop, options)
    }

    /// Append text to a remote file; `auto_verify` adds a matching check
    pub fn push_text(
        &mut self,
        text: impl Into<String>,
        path: impl Into<String>,
        options: InstallerOptions,
    ) -> &mut Self {
        let text = text.into();
        let path = path.into();
        if options.auto_verify() {
            self.verify(format!("push_text {path}"))
                .file_contains(path.clone(), text.clone());
        }
        self.installer(InstallerKind::PushText { text, path }, options)
    }

    pub fn transfer(
        &mut self,
        source: impl Into<String>,
        destination: impl Into<String>,
        options: InstallerOptions,
    ) -> &mut Self {
        self.installer(
            InstallerKind::Transfer {
                source: source.into(),
                destination: destination.into(),
            },
            options,
        )
    }

    /// Render a local template to the destination encoded in its path
    ///
    /// `nginx/./etc/nginx/nginx.conf` is rendered from the config dir and
    /// uploaded to `/etc/nginx/nginx.conf`, creating parent directories.
    pub fn template(&mut self, source: &str, mut options: InstallerOptions) -> &mut Self {
        let destination = extract_destination(source);
        let source = prefix_config_dir(source, self.config_dir.as_deref());
        options.render = Some(true);
        options.recursive = Some(false);
        options.mkdir = Some(true);
        self.transfer(source, destination, options)
    }

    /// Start a new verifier; checks are added to the returned value
    pub fn verify(&mut self, description: impl Into<String>) -> &mut Verifier {
        let verifier = Verifier::new(self.package.name.clone(), description);
        self.package.verifications.push(verifier);
        let last = self.package.verifications.len() - 1;
        &mut self.package.verifications[last]
    }

    /// Upload files and verify their checksums
    ///
    /// Each file is transferred to the destination encoded in its path and
    /// checked against the md5 of the local bytes as they are now.
    pub fn configuration<I, S>(&mut self, files: I, options: &InstallerOptions) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for file in files {
            let file = file.as_ref();
            let source = prefix_config_dir(file, self.config_dir.as_deref());
            let destination = extract_destination(file);

            let mut transfer_options = options.clone();
            transfer_options.mkdir = Some(true);
            self.transfer(source.clone(), destination.clone(), transfer_options);

            self.verify(format!("File exists/checksum {destination}"))
                .checksum_match(Path::new(&source), destination)?;
        }
        Ok(self)
    }

    /// Alias of [`PackageBuilder::configuration`]
    pub fn files<I, S>(&mut self, files: I, options: &InstallerOptions) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.configuration(files, options)
    }

    /// Upload every regular file below the given directories
    pub fn config_dir<I, S>(&mut self, paths: I, options: &InstallerOptions) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let config_dir = self.config_dir.clone();
        let mut files = Vec::new();

        for path in paths {
            let root = prefix_config_dir(path.as_ref(), config_dir.as_deref());
            let walker = WalkDir::new(&root)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| e.depth() == 0 || !excludable_file(&e.file_name().to_string_lossy()));

            for entry in walker {
                let entry = entry.map_err(|e| {
                    let path = e.path().map_or_else(|| PathBuf::from(&root), Path::to_path_buf);
                    Error::Io {
                        path,
                        source: e.into(),
                    }
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let full = entry.path().to_string_lossy().into_owned();
                let relative = match &config_dir {
                    Some(dir) => {
                        let dir = dir.to_string_lossy();
                        full.strip_prefix(dir.as_ref())
                            .map(|rest| rest.trim_start_matches('/').to_string())
                            .unwrap_or_else(|| full.clone())
                    }
                    None => full,
                };
                files.push(relative);
            }
        }

        log::debug!("{} config_dir found {} files", self.package.name, files.len());
        self.configuration(files, options)
    }

    /// Require apt packages without declaring them by hand
    pub fn require_apt<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.require_generated("apt_package", PackageManager::Apt, names)
    }

    /// Require gems without declaring them by hand
    pub fn require_gem<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.require_generated("gem_package", PackageManager::Gem, names)
    }

    fn require_generated<I, S>(&mut self, prefix: &str, manager: PackageManager, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            let package_name = format!("{prefix}_{}", word_chars(&name));

            let mut builder = PackageBuilder::named(package_name.clone());
            builder.package_manager(manager, [name], InstallerOptions::default());
            self.generated.push(builder.package);

            self.package.dependencies.push(package_name);
        }
        self
    }

    fn recommend_once(&mut self, name: &str) {
        if !self.package.recommends.iter().any(|r| r == name) {
            self.package.recommends.push(name.to_string());
        }
    }

    pub fn build(self) -> Declaration {
        Declaration {
            package: self.package,
            generated: self.generated,
        }
    }
}

/// Replace every non-word character with `_`
fn word_chars(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}
