//! Install context and provider traits
//!
//! These traits let the engine run without depending on a specific
//! transport, user-interaction mechanism or progress display.

use crate::error::{DeliveryError, Error, Result};
use crate::package::Package;
use crate::template::Renderer;
use crate::types::{PackageOutcome, RunOptions, Vars};
use std::collections::HashMap;
use std::path::Path;

/// Transport that executes commands and copies files on target roles
///
/// Implementations may fan a call out to many hosts concurrently, but a
/// call only succeeds when every targeted host succeeded.
pub trait Delivery: Send + Sync {
    /// Run a shell command string on every host of `roles`
    fn run(&self, package: &str, commands: &str, roles: &[String])
    -> std::result::Result<(), DeliveryError>;

    /// Copy a local file or directory to `destination` on every host of `roles`
    fn transfer(
        &self,
        package: &str,
        source: &Path,
        destination: &str,
        roles: &[String],
        recursive: bool,
    ) -> std::result::Result<(), DeliveryError>;

    /// Run a boolean check; a non-zero exit yields `Ok(false)`
    ///
    /// Errors are reserved for transport breakage (unreachable host,
    /// unknown role), never for a check that simply did not pass.
    fn probe(&self, package: &str, command: &str, roles: &[String])
    -> std::result::Result<bool, DeliveryError>;
}

/// Picks one concrete package for an ambiguous virtual package
pub trait Chooser {
    /// Choose one of `candidates` for `virtual_name`
    ///
    /// Called once per ambiguous occurrence during resolution. The returned
    /// name must be one of the candidates.
    fn choose(&mut self, virtual_name: &str, candidates: &[&str]) -> Result<String>;
}

/// Chooser that always takes the first candidate (name order)
pub struct FirstCandidate;

impl Chooser for FirstCandidate {
    fn choose(&mut self, virtual_name: &str, candidates: &[&str]) -> Result<String> {
        candidates
            .first()
            .map(|c| (*c).to_string())
            .ok_or_else(|| Error::UnknownPackage(virtual_name.to_string()))
    }
}

/// Chooser backed by pre-supplied answers, falling back to another chooser
pub struct Answers<C> {
    answers: HashMap<String, String>,
    fallback: C,
}

impl<C: Chooser> Answers<C> {
    pub fn new(answers: HashMap<String, String>, fallback: C) -> Self {
        Self { answers, fallback }
    }
}

impl<C: Chooser> Chooser for Answers<C> {
    fn choose(&mut self, virtual_name: &str, candidates: &[&str]) -> Result<String> {
        match self.answers.get(virtual_name) {
            Some(answer) => Ok(answer.clone()),
            None => self.fallback.choose(virtual_name, candidates),
        }
    }
}

/// Receives (dependent, dependency, depth) edges while a tree is resolved
pub trait ResolveObserver {
    fn on_dependency(&mut self, dependent: &Package, dependency: &Package, depth: usize);
}

/// No-op resolve observer
pub struct NoObserver;

impl ResolveObserver for NoObserver {
    fn on_dependency(&mut self, _dependent: &Package, _dependency: &Package, _depth: usize) {}
}

/// Progress callback for deployment runs
pub trait ProgressCallback {
    /// Called when a policy starts processing its resolved packages
    fn on_policy_start(&mut self, policy: &str, packages: usize);

    /// Called when a package starts processing
    fn on_package_start(&mut self, package: &str, roles: &[String]);

    /// Called when a package reaches a terminal state
    fn on_package_complete(&mut self, package: &str, outcome: PackageOutcome);

    /// Called when every package of a policy is done
    fn on_policy_complete(&mut self, policy: &str);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_policy_start(&mut self, _policy: &str, _packages: usize) {}
    fn on_package_start(&mut self, _package: &str, _roles: &[String]) {}
    fn on_package_complete(&mut self, _package: &str, _outcome: PackageOutcome) {}
    fn on_policy_complete(&mut self, _policy: &str) {}
}

/// Context passed to installer and verifier operations
pub struct InstallContext<'a> {
    /// Transport for commands and transfers
    pub delivery: &'a dyn Delivery,
    /// Template renderer for `render` transfers
    pub renderer: &'a dyn Renderer,
    /// Global run options (testing and force)
    pub options: &'a RunOptions,
    /// Template variables for the package being processed
    pub vars: &'a Vars,
}

impl<'a> InstallContext<'a> {
    pub fn new(
        delivery: &'a dyn Delivery,
        renderer: &'a dyn Renderer,
        options: &'a RunOptions,
        vars: &'a Vars,
    ) -> Self {
        Self {
            delivery,
            renderer,
            options,
            vars,
        }
    }

    /// Whether side-effecting delivery calls are suppressed
    pub fn testing(&self) -> bool {
        self.options.testing
    }
}
