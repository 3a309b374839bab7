//! Error types for provisioning runs.
//!
//! Errors are categorized so the caller can tell a broken declaration
//! apart from a host that refused a command. Every fatal condition in a
//! run surfaces as one of these variants; the only soft outcomes (missing
//! recommendations, failed pre-check probes) never become errors.

use crate::template::TemplateError;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for provisioning operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of provisioning errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A package reference could not be resolved
    Resolution,
    /// A post-install verification did not pass
    Verification,
    /// A template failed to render
    Template,
    /// The delivery transport reported a failure
    Transport,
    /// The declarations themselves are malformed
    Configuration,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Resolution => "Unresolvable dependency",
            Self::Verification => "Verification failed",
            Self::Template => "Template rendering failed",
            Self::Transport => "Remote command failed",
            Self::Configuration => "Invalid declarations",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Resolution => "Declare the missing package or fix the name in `requires`",
            Self::Verification => {
                "Inspect the failing check on the target hosts; later packages were not processed"
            }
            Self::Template => "Fix the template near the listed line and run again",
            Self::Transport => "Check connectivity and privileges on the target roles",
            Self::Configuration => "Fix the package or policy declaration and run again",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Failure reported by a delivery transport.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// A command exited non-zero on a host
    #[error("command failed on {host} (exit {}): {stderr}", code.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    CommandFailed {
        /// Host (or `localhost`) the command ran on
        host: String,
        /// Exit code, if the process exited normally
        code: Option<i32>,
        /// Captured standard error
        stderr: String,
    },

    /// A role has no hosts configured
    #[error("no hosts configured for role '{0}'")]
    UnknownRole(String),

    /// The targeted roles resolved to no hosts at all
    #[error("no hosts to target for roles {0:?}")]
    NoHosts(Vec<String>),

    /// The transport program could not be started
    #[error("failed to execute {program}: {source}")]
    Spawn {
        /// Program that failed to start
        program: String,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// Other transport failure
    #[error("{0}")]
    Other(String),
}

/// Errors that can occur while resolving, installing or verifying packages.
#[derive(Debug, Error)]
pub enum Error {
    /// A hard dependency names no registered package or provider
    #[error("package definition not found for key: {dependency} (required by {package})")]
    UnresolvableDependency {
        /// Package declaring the dependency
        package: String,
        /// The missing name
        dependency: String,
    },

    /// A policy references a package that does not exist
    #[error("package definition not found for key: {0}")]
    UnknownPackage(String),

    /// The dependency graph loops back on itself
    #[error("dependency cycle detected: {}", cycle.join(" -> "))]
    DependencyCycle {
        /// Package names along the cycle, first and last equal
        cycle: Vec<String>,
    },

    /// The chooser picked a package outside the offered candidates
    #[error(
        "'{choice}' is not a candidate for virtual package {virtual_name} (candidates: {})",
        candidates.join(", ")
    )]
    InvalidChoice {
        /// Virtual package being resolved
        virtual_name: String,
        /// What the chooser returned
        choice: String,
        /// What was offered
        candidates: Vec<String>,
    },

    /// Two declarations share a package name
    #[error("package '{0}' is declared more than once")]
    DuplicatePackage(String),

    /// A verification gate did not pass after installation
    #[error("{package} failed verification '{description}' for roles {roles:?}: {check}")]
    VerificationFailed {
        /// Package being verified
        package: String,
        /// Verifier description
        description: String,
        /// First failing check
        check: String,
        /// Roles the check ran against
        roles: Vec<String>,
    },

    /// A template failed to render
    #[error(transparent)]
    Template(#[from] Box<TemplateError>),

    /// The delivery transport failed
    #[error("delivery failed for {package} on roles {roles:?}: {source}")]
    Delivery {
        /// Package whose commands failed
        package: String,
        /// Roles targeted
        roles: Vec<String>,
        /// Transport failure
        #[source]
        source: DeliveryError,
    },

    /// Malformed declaration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// IO error while reading local sources
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path involved in the error
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::UnresolvableDependency { .. } | Error::UnknownPackage(_) => {
                ErrorCategory::Resolution
            }
            Error::VerificationFailed { .. } => ErrorCategory::Verification,
            Error::Template(_) => ErrorCategory::Template,
            Error::Delivery { .. } => ErrorCategory::Transport,
            Error::DependencyCycle { .. }
            | Error::InvalidChoice { .. }
            | Error::DuplicatePackage(_)
            | Error::Config(_)
            | Error::Io { .. } => ErrorCategory::Configuration,
        }
    }

    /// Create an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn delivery(package: &str, roles: &[String], source: DeliveryError) -> Self {
        Error::Delivery {
            package: package.to_string(),
            roles: roles.to_vec(),
            source,
        }
    }
}

impl From<TemplateError> for Error {
    fn from(err: TemplateError) -> Self {
        Error::Template(Box::new(err))
    }
}
