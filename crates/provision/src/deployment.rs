//! Policies and the deployment run
//!
//! A [`Deployment`] binds policies to a registry, a delivery transport and
//! installer defaults. Every policy is resolved before anything is
//! installed, so a missing dependency or a cycle aborts the run before it
//! touches a host. Packages are then processed one by one:
//!
//! 1. Meta-packages are satisfied immediately.
//! 2. Unless forced, all verifiers probe the roles; if every one passes the
//!    package is already installed.
//! 3. Installers run in declaration order with defaults applied.
//! 4. All verifiers run again as a gate; a failure aborts the whole run.

use crate::context::{
    Chooser, Delivery, InstallContext, NoObserver, ProgressCallback, ResolveObserver,
};
use crate::error::Result;
use crate::package::Package;
use crate::registry::{Registry, Resolver};
use crate::template::Renderer;
use crate::types::{InstallerDefaults, PackageOutcome, RunOptions, RunSummary, Vars};
use crate::verifier::VerifyOutcome;
use serde::Serialize;

/// Packages to install on a set of roles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    name: String,
    roles: Vec<String>,
    packages: Vec<String>,
}

impl Policy {
    pub fn new<R, P>(
        name: impl Into<String>,
        roles: impl IntoIterator<Item = R>,
        packages: impl IntoIterator<Item = P>,
    ) -> Self
    where
        R: Into<String>,
        P: Into<String>,
    {
        Self {
            name: name.into(),
            roles: roles.into_iter().map(Into::into).collect(),
            packages: packages.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    /// Package references; may be virtual names
    pub fn packages(&self) -> &[String] {
        &self.packages
    }
}

/// A policy with its resolved install order
#[derive(Debug)]
pub struct PlannedPolicy<'a> {
    pub policy: &'a Policy,
    pub packages: Vec<&'a Package>,
}

/// Resolved install orders for every policy of a deployment
#[derive(Debug)]
pub struct Plan<'a> {
    pub policies: Vec<PlannedPolicy<'a>>,
}

impl Plan<'_> {
    /// Number of package runs across all policies
    pub fn total(&self) -> usize {
        self.policies.iter().map(|p| p.packages.len()).sum()
    }
}

/// Outcome of one policy
#[derive(Debug, Clone, Serialize)]
pub struct PolicyReport {
    pub name: String,
    pub roles: Vec<String>,
    pub packages: Vec<(String, PackageOutcome)>,
    pub summary: RunSummary,
}

/// Outcome of a deployment run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub policies: Vec<PolicyReport>,
    pub summary: RunSummary,
}

/// State of one package as seen by a probe-only check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PackageStatus {
    /// No installers
    Meta,
    /// No verifications to probe
    Unverified,
    /// Every verifier passed
    Satisfied,
    /// The named verifier failed at `check`
    Missing { verifier: String, check: String },
}

/// Probe results for one policy
#[derive(Debug, Clone, Serialize)]
pub struct PolicyCheck {
    pub name: String,
    pub roles: Vec<String>,
    pub packages: Vec<(String, PackageStatus)>,
}

/// Binds policies to a registry, transport and defaults
pub struct Deployment<'a> {
    registry: &'a Registry,
    delivery: &'a dyn Delivery,
    renderer: &'a dyn Renderer,
    policies: Vec<Policy>,
    defaults: InstallerDefaults,
    vars: Vars,
    options: RunOptions,
}

impl<'a> Deployment<'a> {
    pub fn new(
        registry: &'a Registry,
        delivery: &'a dyn Delivery,
        renderer: &'a dyn Renderer,
    ) -> Self {
        Self {
            registry,
            delivery,
            renderer,
            policies: Vec::new(),
            defaults: InstallerDefaults::default(),
            vars: Vars::new(),
            options: RunOptions::default(),
        }
    }

    pub fn policy(mut self, policy: Policy) -> Self {
        self.policies.push(policy);
        self
    }

    pub fn policies(mut self, policies: impl IntoIterator<Item = Policy>) -> Self {
        self.policies.extend(policies);
        self
    }

    pub fn defaults(mut self, defaults: InstallerDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Deployment-wide template variables; package vars override them
    pub fn vars(mut self, vars: Vars) -> Self {
        self.vars = vars;
        self
    }

    pub fn options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Resolve every policy without touching any host
    pub fn plan(
        &self,
        chooser: &mut dyn Chooser,
        observer: &mut dyn ResolveObserver,
    ) -> Result<Plan<'_>> {
        let resolver = Resolver::new(self.registry);
        let mut policies = Vec::with_capacity(self.policies.len());

        for policy in &self.policies {
            log::debug!("resolving policy {} for roles {:?}", policy.name(), policy.roles());
            let packages = resolver.resolve_policy(policy, chooser, observer)?;
            policies.push(PlannedPolicy { policy, packages });
        }

        Ok(Plan { policies })
    }

    /// Resolve, then install and verify every policy in order
    ///
    /// The first fatal error stops the run; nothing after it is processed.
    pub fn process(
        &self,
        chooser: &mut dyn Chooser,
        progress: &mut dyn ProgressCallback,
    ) -> Result<RunReport> {
        let plan = self.plan(chooser, &mut NoObserver)?;
        let mut report = RunReport::default();

        for planned in &plan.policies {
            let policy = planned.policy;
            log::info!(
                "--> Processing policy {} for roles: {:?}",
                policy.name(),
                policy.roles()
            );
            progress.on_policy_start(policy.name(), planned.packages.len());

            let mut policy_report = PolicyReport {
                name: policy.name().to_string(),
                roles: policy.roles().to_vec(),
                packages: Vec::with_capacity(planned.packages.len()),
                summary: RunSummary::default(),
            };

            for package in &planned.packages {
                progress.on_package_start(package.name(), policy.roles());
                let outcome = self.process_package(package, policy.roles())?;
                progress.on_package_complete(package.name(), outcome);

                policy_report.summary.add_outcome(outcome);
                policy_report
                    .packages
                    .push((package.name().to_string(), outcome));
            }

            progress.on_policy_complete(policy.name());
            report.summary.merge(&policy_report.summary);
            report.policies.push(policy_report);
        }

        Ok(report)
    }

    /// Run the check/install/verify sequence for one package
    pub fn process_package(&self, package: &Package, roles: &[String]) -> Result<PackageOutcome> {
        if package.is_meta() {
            log::debug!("{} is a meta-package", package.name());
            return Ok(PackageOutcome::Meta);
        }

        let vars = self.package_vars(package);
        let ctx = InstallContext::new(self.delivery, self.renderer, &self.options, &vars);

        if self.options.testing {
            log::info!("--> {} [testing] for roles: {roles:?}", package.name());
            self.install(package, &ctx, roles)?;
            return Ok(PackageOutcome::Simulated);
        }

        if !package.verifications().is_empty() && !self.options.force {
            let mut satisfied = true;
            for verifier in package.verifications() {
                if let VerifyOutcome::NotSatisfied { check } = verifier.verify(&ctx, roles)? {
                    log::debug!(
                        "{} pre-check '{}' not satisfied: {check}",
                        package.name(),
                        verifier.description()
                    );
                    satisfied = false;
                    break;
                }
            }
            if satisfied {
                log::info!("--> {} already installed for roles: {roles:?}", package.name());
                return Ok(PackageOutcome::AlreadySatisfied);
            }
        }

        log::info!("--> Installing {} for roles: {roles:?}", package.name());
        self.install(package, &ctx, roles)?;

        for verifier in package.verifications() {
            verifier.gate(&ctx, roles)?;
        }
        if !package.verifications().is_empty() {
            log::info!("--> Verified {} for roles: {roles:?}", package.name());
        }

        Ok(PackageOutcome::Installed)
    }

    /// Probe every package of every policy without installing anything
    pub fn check(&self, chooser: &mut dyn Chooser) -> Result<Vec<PolicyCheck>> {
        let plan = self.plan(chooser, &mut NoObserver)?;
        let mut checks = Vec::with_capacity(plan.policies.len());

        for planned in &plan.policies {
            let roles = planned.policy.roles();
            let mut packages = Vec::with_capacity(planned.packages.len());

            for package in &planned.packages {
                let status = self.probe_package(package, roles)?;
                packages.push((package.name().to_string(), status));
            }

            checks.push(PolicyCheck {
                name: planned.policy.name().to_string(),
                roles: roles.to_vec(),
                packages,
            });
        }

        Ok(checks)
    }

    fn probe_package(&self, package: &Package, roles: &[String]) -> Result<PackageStatus> {
        if package.is_meta() {
            return Ok(PackageStatus::Meta);
        }
        if package.verifications().is_empty() {
            return Ok(PackageStatus::Unverified);
        }

        let vars = self.package_vars(package);
        let ctx = InstallContext::new(self.delivery, self.renderer, &self.options, &vars);
        for verifier in package.verifications() {
            if let VerifyOutcome::NotSatisfied { check } = verifier.verify(&ctx, roles)? {
                return Ok(PackageStatus::Missing {
                    verifier: verifier.description().to_string(),
                    check,
                });
            }
        }
        Ok(PackageStatus::Satisfied)
    }

    fn install(&self, package: &Package, ctx: &InstallContext<'_>, roles: &[String]) -> Result<()> {
        for installer in package.installers() {
            installer.configured(&self.defaults).process(ctx, roles)?;
        }
        Ok(())
    }

    fn package_vars(&self, package: &Package) -> Vars {
        let mut vars = self.vars.clone();
        vars.extend(package.vars().clone());
        vars
    }
}
