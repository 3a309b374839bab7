//! Core types for provisioning runs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Declaration-time variables available to templates
pub type Vars = BTreeMap<String, serde_json::Value>;

/// File access mode for transferred or appended files
///
/// Numeric modes are rendered as canonical four-digit octal, so a TOML
/// `mode = 0o644` (or the decimal `420`) becomes `0644`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Mode {
    /// Numeric mode bits
    Numeric(u32),
    /// Symbolic or pre-formatted mode (e.g. `u+x`, `0755`)
    Symbolic(String),
}

impl Mode {
    /// Render the mode as a `chmod` argument
    pub fn to_arg(&self) -> String {
        match self {
            Self::Numeric(bits) => format!("{bits:04o}"),
            Self::Symbolic(s) => s.clone(),
        }
    }
}

/// Options recognized by installers
///
/// Every `Option` field except `auto_verify` takes part in default
/// inheritance: a value set on the installer wins over the per-kind
/// deployment default, which wins over the global deployment default. Hooks
/// and flag lists belong to the installer that declares them and are never
/// inherited.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerOptions {
    /// Prefix generated commands with `sudo`
    pub sudo: Option<bool>,
    /// Restrict this installer to a subset of the policy's roles
    pub roles: Option<Vec<String>>,
    /// Render the transfer source as a template before uploading
    pub render: Option<bool>,
    /// Transfer directories recursively (default true, forced off by `render`)
    pub recursive: Option<bool>,
    /// Create the destination's parent directory before transfer
    pub mkdir: Option<bool>,
    /// Owner applied to the destination after install
    pub owner: Option<String>,
    /// Group applied to the destination after install
    pub group: Option<String>,
    /// Access mode applied to the destination after install
    pub mode: Option<Mode>,
    /// Pass `-v` to ownership/permission commands
    pub verbose: Option<bool>,
    /// Register a matching verification automatically (text append)
    ///
    /// Read when the step is declared, so it only has effect on the step itself.
    pub auto_verify: Option<bool>,

    /// Installation prefix (source and binary installers)
    pub prefix: Option<String>,
    /// Where downloaded archives are kept
    pub archives: Option<String>,
    /// Where archives are extracted and built
    pub builds: Option<String>,
    /// Directory name inside `builds` when it differs from the archive name
    pub custom_dir: Option<String>,
    /// Package version (gem)
    pub version: Option<String>,
    /// Alternate package source (gem)
    pub gem_source: Option<String>,
    /// Install directory (gem)
    pub install_dir: Option<String>,
    /// Extra build flags passed after `--` (gem)
    pub build_flags: Option<String>,
    /// Task file (task runner)
    pub file: Option<String>,

    /// Commands run before the main install step
    pub pre: Vec<String>,
    /// Commands run after the main install step
    pub post: Vec<String>,
    /// `--enable-*` configure flags (source)
    pub enable: Vec<String>,
    /// `--with-*` configure flags (source)
    pub with: Vec<String>,
    /// Raw configure flags (source)
    pub configure_flags: Vec<String>,
    /// Replace configure/make/make install (source)
    pub custom_install: Vec<String>,
}

impl InstallerOptions {
    /// Fill every unset inheritable option from `defaults`
    pub fn inherit(&mut self, defaults: &InstallerOptions) {
        fn fill<T: Clone>(own: &mut Option<T>, default: &Option<T>) {
            if own.is_none() {
                own.clone_from(default);
            }
        }

        fill(&mut self.sudo, &defaults.sudo);
        fill(&mut self.roles, &defaults.roles);
        fill(&mut self.render, &defaults.render);
        fill(&mut self.recursive, &defaults.recursive);
        fill(&mut self.mkdir, &defaults.mkdir);
        fill(&mut self.owner, &defaults.owner);
        fill(&mut self.group, &defaults.group);
        fill(&mut self.mode, &defaults.mode);
        fill(&mut self.verbose, &defaults.verbose);
        fill(&mut self.prefix, &defaults.prefix);
        fill(&mut self.archives, &defaults.archives);
        fill(&mut self.builds, &defaults.builds);
        fill(&mut self.custom_dir, &defaults.custom_dir);
        fill(&mut self.version, &defaults.version);
        fill(&mut self.gem_source, &defaults.gem_source);
        fill(&mut self.install_dir, &defaults.install_dir);
        fill(&mut self.build_flags, &defaults.build_flags);
        fill(&mut self.file, &defaults.file);
    }

    /// Whether privilege escalation is requested
    pub fn sudo(&self) -> bool {
        self.sudo.unwrap_or(false)
    }

    /// `"sudo "` when privilege escalation is requested, else empty
    pub fn sudo_prefix(&self) -> &'static str {
        if self.sudo() { "sudo " } else { "" }
    }

    pub fn render(&self) -> bool {
        self.render.unwrap_or(false)
    }

    pub fn mkdir(&self) -> bool {
        self.mkdir.unwrap_or(false)
    }

    pub fn verbose(&self) -> bool {
        self.verbose.unwrap_or(false)
    }

    pub fn auto_verify(&self) -> bool {
        self.auto_verify.unwrap_or(false)
    }

    /// Recursive transfer flag; rendering always targets a single file
    pub fn recursive(&self) -> bool {
        !self.render() && self.recursive.unwrap_or(true)
    }
}

/// Deployment-scoped installer defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerDefaults {
    /// Defaults applied to every installer
    #[serde(flatten)]
    pub all: InstallerOptions,
    /// Defaults applied to one installer kind (`apt`, `source`, `transfer`, ...)
    pub kinds: BTreeMap<String, InstallerOptions>,
}

impl InstallerDefaults {
    /// Effective defaults for an installer kind: per-kind over global
    pub fn for_kind(&self, kind: &str) -> InstallerOptions {
        let mut options = self.kinds.get(kind).cloned().unwrap_or_default();
        options.inherit(&self.all);
        options
    }
}

/// Global run options
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Suppress every side-effecting delivery call (dry validation)
    pub testing: bool,
    /// Skip pre-checks and always run installers
    pub force: bool,
}

/// Terminal state of one package in a policy run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackageOutcome {
    /// Pre-check passed; installers were not run
    AlreadySatisfied,
    /// Installers ran and the post-check passed
    Installed,
    /// No installers; satisfied once its dependencies processed
    Meta,
    /// Testing mode; commands were generated but not delivered
    Simulated,
}

/// Summary of a deployment run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub installed: usize,
    pub already_satisfied: usize,
    pub meta: usize,
    pub simulated: usize,
}

impl RunSummary {
    /// Total number of packages processed
    pub fn total(&self) -> usize {
        self.installed + self.already_satisfied + self.meta + self.simulated
    }

    /// Merge another summary into this one
    pub fn merge(&mut self, other: &RunSummary) {
        self.installed += other.installed;
        self.already_satisfied += other.already_satisfied;
        self.meta += other.meta;
        self.simulated += other.simulated;
    }

    /// Add an outcome to the summary
    pub fn add_outcome(&mut self, outcome: PackageOutcome) {
        match outcome {
            PackageOutcome::AlreadySatisfied => self.already_satisfied += 1,
            PackageOutcome::Installed => self.installed += 1,
            PackageOutcome::Meta => self.meta += 1,
            PackageOutcome::Simulated => self.simulated += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_octal_normalization() {
        assert_eq!(Mode::Numeric(0o644).to_arg(), "0644");
        assert_eq!(Mode::Numeric(420).to_arg(), "0644");
        assert_eq!(Mode::Numeric(0o4755).to_arg(), "4755");
        assert_eq!(Mode::Numeric(0o7).to_arg(), "0007");
        assert_eq!(Mode::Symbolic("u+x".into()).to_arg(), "u+x");
    }

    #[test]
    fn test_inherit_keeps_own_values() {
        let mut own = InstallerOptions {
            sudo: Some(false),
            pre: vec!["echo own".into()],
            ..Default::default()
        };
        let defaults = InstallerOptions {
            sudo: Some(true),
            auto_verify: Some(true),
            owner: Some("root".into()),
            pre: vec!["echo default".into()],
            ..Default::default()
        };

        own.inherit(&defaults);

        assert_eq!(own.sudo, Some(false));
        assert_eq!(own.auto_verify, None);
        assert_eq!(own.owner.as_deref(), Some("root"));
        assert_eq!(own.pre, vec!["echo own".to_string()]);
    }

    #[test]
    fn test_defaults_for_kind_precedence() {
        let mut defaults = InstallerDefaults {
            all: InstallerOptions {
                sudo: Some(true),
                prefix: Some("/usr/local".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        defaults.kinds.insert(
            "source".into(),
            InstallerOptions {
                prefix: Some("/opt".into()),
                ..Default::default()
            },
        );

        let source = defaults.for_kind("source");
        assert_eq!(source.prefix.as_deref(), Some("/opt"));
        assert_eq!(source.sudo, Some(true));

        let apt = defaults.for_kind("apt");
        assert_eq!(apt.prefix.as_deref(), Some("/usr/local"));
    }

    #[test]
    fn test_recursive_disabled_by_render() {
        let opts = InstallerOptions::default();
        assert!(opts.recursive());

        let opts = InstallerOptions {
            render: Some(true),
            recursive: Some(true),
            ..Default::default()
        };
        assert!(!opts.recursive());
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = RunSummary::default();
        summary.add_outcome(PackageOutcome::Installed);
        summary.add_outcome(PackageOutcome::AlreadySatisfied);
        summary.add_outcome(PackageOutcome::Meta);

        let mut other = RunSummary::default();
        other.add_outcome(PackageOutcome::Installed);
        summary.merge(&other);

        assert_eq!(summary.installed, 2);
        assert_eq!(summary.total(), 4);
    }
}
