use anyhow::{Context, Result};
use provision::{InstallerDefaults, InstallerOptions, PackageManager, Vars};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ============================================================================
// Script Schema
// ============================================================================

/// A declaration script: settings, transport, roles, packages and policies
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Script {
    pub settings: Settings,
    pub delivery: DeliveryConfig,
    /// Role name to host list
    pub roles: BTreeMap<String, Vec<String>>,
    /// Installer defaults for every package processed by the script
    pub defaults: InstallerDefaults,
    /// Pre-supplied answers for ambiguous virtual packages
    pub choices: BTreeMap<String, String>,
    pub packages: BTreeMap<String, PackageSpec>,
    /// Policies, processed in file order
    pub policies: Vec<PolicySpec>,
}

impl Script {
    /// Load a script from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read script: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid script: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid TOML format in declaration script")
    }
}

/// `[settings]`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Prefix for relative template and configuration files
    pub config_dir: Option<String>,
    /// Directories whose `.toml` files declare more packages
    pub packages_dirs: Vec<String>,
    /// Variables shared by every template
    pub vars: Vars,
}

/// Transport used to reach the roles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryKind {
    /// Run everything on this machine
    #[default]
    Local,
    /// Run over ssh on the hosts of each role
    Ssh,
}

/// `[delivery]`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    pub kind: DeliveryKind,
    /// Remote login user
    pub user: Option<String>,
    pub port: Option<u16>,
    /// Extra `-o` options passed to ssh and scp
    pub ssh_options: Vec<String>,
}

/// `[[policies]]`
#[derive(Debug, Clone, Deserialize)]
pub struct PolicySpec {
    pub name: String,
    pub roles: Vec<String>,
    #[serde(default)]
    pub packages: Vec<String>,
}

// ============================================================================
// Package Schema
// ============================================================================

/// A package directory file: only `[packages.*]` tables
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PackageFile {
    pub packages: BTreeMap<String, PackageSpec>,
}

impl PackageFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read package file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Invalid TOML format in package file: {}", path.display()))
    }
}

/// `[packages.<name>]`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PackageSpec {
    /// Virtual name this package satisfies
    pub provides: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    pub requires: Vec<String>,
    pub recommends: Vec<String>,
    pub optional: Vec<String>,
    pub vars: Vars,
    /// apt packages declared and required on the fly
    pub require_apt: Vec<String>,
    /// gems declared and required on the fly
    pub require_gem: Vec<String>,
    pub install: Vec<InstallSpec>,
    pub verify: Vec<VerifySpec>,
}

/// One `[[packages.<name>.install]]` step: an action plus its options
#[derive(Debug, Clone, Deserialize)]
pub struct InstallSpec {
    #[serde(flatten)]
    pub action: Action,
    #[serde(flatten)]
    pub options: InstallerOptions,
}

/// What an install step does; exactly one action key per step
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Apt(Vec<String>),
    Yum(Vec<String>),
    Rpm(Vec<String>),
    Deb(Vec<String>),
    Gem(Vec<String>),
    FreebsdPkg(Vec<String>),
    OpenbsdPkg(Vec<String>),
    OpensolarisPkg(Vec<String>),
    MacPort(Vec<String>),
    BsdPort(Vec<String>),
    FreebsdPortinstall(Vec<String>),
    Transfer { source: String, destination: String },
    /// Template path whose destination is encoded after `/./`
    Template(String),
    PushText { text: String, path: String },
    /// Source archive URL
    Source(String),
    /// Prebuilt archive URL
    Binary(String),
    Task(Vec<String>),
    /// Upload files and verify their checksums
    Configuration(Vec<String>),
    /// Same as `configuration`
    Files(Vec<String>),
    /// Upload every file below the given directories
    ConfigDir(Vec<String>),
    /// Run only the pre/post hooks
    Noop(bool),
}

impl Action {
    /// The package manager and package list, for package manager actions
    pub fn package_manager(&self) -> Option<(PackageManager, &[String])> {
        let (manager, packages) = match self {
            Self::Apt(p) => (PackageManager::Apt, p),
            Self::Yum(p) => (PackageManager::Yum, p),
            Self::Rpm(p) => (PackageManager::Rpm, p),
            Self::Deb(p) => (PackageManager::Deb, p),
            Self::Gem(p) => (PackageManager::Gem, p),
            Self::FreebsdPkg(p) => (PackageManager::FreebsdPkg, p),
            Self::OpenbsdPkg(p) => (PackageManager::OpenbsdPkg, p),
            Self::OpensolarisPkg(p) => (PackageManager::OpensolarisPkg, p),
            Self::MacPort(p) => (PackageManager::MacPort, p),
            Self::BsdPort(p) => (PackageManager::BsdPort, p),
            Self::FreebsdPortinstall(p) => (PackageManager::FreebsdPortinstall, p),
            _ => return None,
        };
        Some((manager, packages.as_slice()))
    }
}

/// One `[[packages.<name>.verify]]` block; every listed check must pass
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VerifySpec {
    pub description: String,
    pub has_file: Vec<String>,
    pub has_directory: Vec<String>,
    pub has_symlink: Vec<SymlinkSpec>,
    pub file_contains: Vec<FileContainsSpec>,
    pub checksum_match: Vec<ChecksumSpec>,
    pub has_executable: Vec<String>,
    pub has_apt: Vec<String>,
    pub has_rpm: Vec<String>,
    pub has_gem: Vec<GemSpec>,
    pub ruby_can_load: Vec<String>,
    pub has_process: Vec<String>,
    /// Raw shell tests
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SymlinkSpec {
    pub path: String,
    pub target: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileContainsSpec {
    pub path: String,
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChecksumSpec {
    /// Local file whose digest is expected
    pub source: String,
    pub destination: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GemSpec {
    pub name: String,
    pub version: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================
