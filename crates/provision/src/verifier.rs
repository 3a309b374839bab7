//! Post-install checks
//!
//! A [`Verifier`] accumulates boolean shell checks. It is evaluated twice
//! per package: as a probe before installing (a failure only means "not
//! installed yet") and as a gate afterwards (a failure aborts the run).

use crate::context::InstallContext;
use crate::error::{Error, Result};
use crate::shell::quote;
use md5::{Digest, Md5};
use std::fmt::Write as _;
use std::path::Path;

/// A single boolean check evaluated on the target hosts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    /// Regular file exists
    HasFile(String),
    /// Directory exists
    HasDirectory(String),
    /// Symlink exists, optionally pointing at `target`
    HasSymlink {
        path: String,
        target: Option<String>,
    },
    /// File contains the text
    FileContains { path: String, text: String },
    /// Remote file has the given md5 digest
    ChecksumMatch { destination: String, digest: String },
    /// Executable exists (a path is tested, a bare name is looked up)
    HasExecutable(String),
    /// Debian package installed
    HasApt(String),
    /// RPM package installed
    HasRpm(String),
    /// Ruby gem installed, optionally a specific version
    HasGem {
        name: String,
        version: Option<String>,
    },
    /// Ruby library loadable
    RubyCanLoad(Vec<String>),
    /// A process with the name is running
    HasProcess(String),
    /// Raw shell test
    Command(String),
}

impl Check {
    /// Build a checksum check from the current bytes of a local file
    ///
    /// The digest is computed now, not when the check runs.
    pub fn checksum_match(source: &Path, destination: impl Into<String>) -> Result<Self> {
        let bytes = std::fs::read(source).map_err(|e| Error::io(source, e))?;
        Ok(Self::ChecksumMatch {
            destination: destination.into(),
            digest: md5_hex(&bytes),
        })
    }

    /// The shell command that exits zero when the check passes
    pub fn command(&self) -> String {
        match self {
            Self::HasFile(path) => format!("test -f {}", quote(path)),
            Self::HasDirectory(path) => format!("test -d {}", quote(path)),
            Self::HasSymlink { path, target: None } => format!("test -L {}", quote(path)),
            Self::HasSymlink {
                path,
                target: Some(target),
            } => format!(
                "test -L {path} && test {target} = \"$(readlink {path})\"",
                path = quote(path),
                target = quote(target)
            ),
            Self::FileContains { path, text } => {
                let mut lines: Vec<&str> = text.lines().collect();
                if lines.is_empty() {
                    lines.push(text);
                }
                let greps: Vec<String> = lines
                    .into_iter()
                    .map(|line| format!("grep -qF -- {} {}", quote(line), quote(path)))
                    .collect();
                greps.join(" && ")
            }
            Self::ChecksumMatch {
                destination,
                digest,
            } => format!(
                "test -f {} && (echo {} | md5sum -c --quiet --status -)",
                quote(destination),
                quote(&format!("{digest}  {destination}"))
            ),
            Self::HasExecutable(path) if path.contains('/') => format!("test -x {}", quote(path)),
            Self::HasExecutable(name) => format!("which {}", quote(name)),
            Self::HasApt(package) => format!(
                "test \"$(dpkg-query -W -f='${{Status}}' {} 2> /dev/null)\" = 'install ok installed'",
                quote(package)
            ),
            Self::HasRpm(package) => format!("rpm -q {}", quote(package)),
            Self::HasGem { name, version } => {
                let mut query = format!("gem query -q -l -i -n {}", quote(name));
                if let Some(version) = version {
                    let _ = write!(query, " --version {}", quote(version));
                }
                format!("expr match $({query}) true > /dev/null")
            }
            Self::RubyCanLoad(files) => {
                let requires: Vec<String> = std::iter::once("rubygems")
                    .chain(files.iter().map(String::as_str))
                    .map(|f| format!("require {f:?}"))
                    .collect();
                format!("ruby -e {}", quote(&requires.join(";")))
            }
            Self::HasProcess(name) => {
                format!("ps aux | grep {} | grep -v grep", quote(name))
            }
            Self::Command(command) => command.clone(),
        }
    }
}

fn md5_hex(bytes: &[u8]) -> String {
    let digest = Md5::digest(bytes);
    digest.iter().fold(String::with_capacity(32), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

/// Result of evaluating a verifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Every check passed
    Satisfied,
    /// The named check failed
    NotSatisfied { check: String },
}

/// Ordered set of checks belonging to one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verifier {
    package: String,
    description: String,
    checks: Vec<Check>,
}

impl Verifier {
    pub fn new(package: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            description: description.into(),
            checks: Vec::new(),
        }
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Append any check
    pub fn check(&mut self, check: Check) -> &mut Self {
        self.checks.push(check);
        self
    }

    pub fn has_file(&mut self, path: impl Into<String>) -> &mut Self {
        self.check(Check::HasFile(path.into()))
    }

    pub fn has_directory(&mut self, path: impl Into<String>) -> &mut Self {
        self.check(Check::HasDirectory(path.into()))
    }

    pub fn has_symlink(&mut self, path: impl Into<String>, target: Option<String>) -> &mut Self {
        self.check(Check::HasSymlink {
            path: path.into(),
            target,
        })
    }

    pub fn file_contains(&mut self, path: impl Into<String>, text: impl Into<String>) -> &mut Self {
        self.check(Check::FileContains {
            path: path.into(),
            text: text.into(),
        })
    }

    /// Compare a remote file against the md5 of a local file, read now
    pub fn checksum_match(
        &mut self,
        source: &Path,
        destination: impl Into<String>,
    ) -> Result<&mut Self> {
        let check = Check::checksum_match(source, destination)?;
        Ok(self.check(check))
    }

    pub fn has_executable(&mut self, path: impl Into<String>) -> &mut Self {
        self.check(Check::HasExecutable(path.into()))
    }

    pub fn has_apt(&mut self, package: impl Into<String>) -> &mut Self {
        self.check(Check::HasApt(package.into()))
    }

    pub fn has_rpm(&mut self, package: impl Into<String>) -> &mut Self {
        self.check(Check::HasRpm(package.into()))
    }

    pub fn has_gem(&mut self, name: impl Into<String>, version: Option<String>) -> &mut Self {
        self.check(Check::HasGem {
            name: name.into(),
            version,
        })
    }

    pub fn ruby_can_load(&mut self, files: Vec<String>) -> &mut Self {
        self.check(Check::RubyCanLoad(files))
    }

    pub fn has_process(&mut self, name: impl Into<String>) -> &mut Self {
        self.check(Check::HasProcess(name.into()))
    }

    pub fn command(&mut self, command: impl Into<String>) -> &mut Self {
        self.check(Check::Command(command.into()))
    }

    /// Probe every check on `roles`, stopping at the first failure
    ///
    /// Transport failures are errors; a check that merely does not pass is
    /// reported as [`VerifyOutcome::NotSatisfied`].
    pub fn verify(&self, ctx: &InstallContext<'_>, roles: &[String]) -> Result<VerifyOutcome> {
        for check in &self.checks {
            let command = check.command();
            log::debug!(
                "{} verify '{}': {command} for roles: {roles:?}",
                self.package,
                self.description
            );
            let passed = ctx
                .delivery
                .probe(&self.package, &command, roles)
                .map_err(|e| Error::delivery(&self.package, roles, e))?;
            if !passed {
                return Ok(VerifyOutcome::NotSatisfied { check: command });
            }
        }
        Ok(VerifyOutcome::Satisfied)
    }

    /// Evaluate as a hard gate: a failing check is an error
    pub fn gate(&self, ctx: &InstallContext<'_>, roles: &[String]) -> Result<()> {
        match self.verify(ctx, roles)? {
            VerifyOutcome::Satisfied => Ok(()),
            VerifyOutcome::NotSatisfied { check } => Err(Error::VerificationFailed {
                package: self.package.clone(),
                description: self.description.clone(),
                check,
                roles: roles.to_vec(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Verbatim;
    use crate::testing::RecordingDelivery;
    use crate::types::{RunOptions, Vars};
    use std::io::Write;

    #[test]
    fn test_check_commands() {
        assert_eq!(Check::HasFile("/etc/motd".into()).command(), "test -f '/etc/motd'");
        assert_eq!(
            Check::FileContains {
                path: "/etc/hosts".into(),
                text: "db1".into()
            }
            .command(),
            "grep -qF -- 'db1' '/etc/hosts'"
        );
        assert_eq!(
            Check::FileContains {
                path: "/etc/app.conf".into(),
                text: "first\nsecond".into()
            }
            .command(),
            "grep -qF -- 'first' '/etc/app.conf' && grep -qF -- 'second' '/etc/app.conf'"
        );
        assert_eq!(
            Check::HasApt("nginx".into()).command(),
            "test \"$(dpkg-query -W -f='${Status}' 'nginx' 2> /dev/null)\" = 'install ok installed'"
        );
        assert_eq!(
            Check::HasGem {
                name: "rails".into(),
                version: Some("2.3.5".into())
            }
            .command(),
            "expr match $(gem query -q -l -i -n 'rails' --version '2.3.5') true > /dev/null"
        );
        assert_eq!(
            Check::RubyCanLoad(vec!["json".into()]).command(),
            r#"ruby -e 'require "rubygems";require "json"'"#
        );
        assert_eq!(Check::HasExecutable("nginx".into()).command(), "which 'nginx'");
        assert_eq!(
            Check::HasExecutable("/usr/sbin/nginx".into()).command(),
            "test -x '/usr/sbin/nginx'"
        );
    }

    /// Evaluate a check with `sh` against local files
    fn passes_locally(check: &Check) -> bool {
        std::process::Command::new("sh")
            .arg("-c")
            .arg(check.command())
            .status()
            .unwrap()
            .success()
    }

    fn file_contains(path: &Path, text: &str) -> Check {
        Check::FileContains {
            path: path.to_string_lossy().into_owned(),
            text: text.into(),
        }
    }

    #[test]
    fn test_file_contains_matches_literal_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.conf");
        std::fs::write(&path, "JAVA_OPTS=-Xmx512m\nlisten 8080\nfirst\n").unwrap();

        assert!(passes_locally(&file_contains(&path, "-Xmx512m")));
        assert!(passes_locally(&file_contains(&path, "listen 8080")));
        assert!(!passes_locally(&file_contains(&path, "listen 80.0")));
        assert!(!passes_locally(&file_contains(&path, "[lf]isten")));
    }

    #[test]
    fn test_file_contains_requires_every_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.conf");
        std::fs::write(&path, "first\n").unwrap();

        assert!(!passes_locally(&file_contains(&path, "first\nsecond")));

        std::fs::write(&path, "first\nsecond\n").unwrap();
        assert!(passes_locally(&file_contains(&path, "first\nsecond")));
    }

    #[test]
    fn test_file_contains_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!passes_locally(&file_contains(&dir.path().join("absent"), "x")));
    }

    #[test]
    fn test_checksum_taken_at_construction() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello").unwrap();

        let check = Check::checksum_match(file.path(), "/etc/greeting").unwrap();

        // Later edits to the local file do not change the digest
        file.write_all(b" world").unwrap();

        assert_eq!(
            check,
            Check::ChecksumMatch {
                destination: "/etc/greeting".into(),
                digest: "5d41402abc4b2a76b9719d911017c592".into()
            }
        );
        assert_eq!(
            check.command(),
            "test -f '/etc/greeting' && (echo '5d41402abc4b2a76b9719d911017c592  /etc/greeting' | md5sum -c --quiet --status -)"
        );
    }

    #[test]
    fn test_checksum_missing_source() {
        let err = Check::checksum_match(Path::new("/nonexistent/file"), "/x").unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_verify_stops_at_first_failure() {
        let delivery = RecordingDelivery::default();
        delivery.fail_probe("test -f '/b'");
        let options = RunOptions::default();
        let vars = Vars::new();
        let ctx = InstallContext::new(&delivery, &Verbatim, &options, &vars);

        let mut verifier = Verifier::new("app", "files");
        verifier.has_file("/a").has_file("/b").has_file("/c");

        let outcome = verifier.verify(&ctx, &["web".to_string()]).unwrap();
        assert_eq!(
            outcome,
            VerifyOutcome::NotSatisfied {
                check: "test -f '/b'".into()
            }
        );
        assert_eq!(delivery.probes().len(), 2);
    }

    #[test]
    fn test_gate_reports_failure() {
        let delivery = RecordingDelivery::default();
        delivery.fail_probe("which 'nginx'");
        let options = RunOptions::default();
        let vars = Vars::new();
        let ctx = InstallContext::new(&delivery, &Verbatim, &options, &vars);

        let mut verifier = Verifier::new("nginx", "binary");
        verifier.has_executable("nginx");

        let err = verifier.gate(&ctx, &["web".to_string()]).unwrap_err();
        match err {
            Error::VerificationFailed {
                package,
                description,
                roles,
                ..
            } => {
                assert_eq!(package, "nginx");
                assert_eq!(description, "binary");
                assert_eq!(roles, vec!["web".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
