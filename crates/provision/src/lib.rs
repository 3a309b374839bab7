//! # Provision
//!
//! A declarative provisioning engine.
//!
//! Packages declare what they depend on, how they are installed and how to
//! tell whether they already are. Policies bind packages to host roles. A
//! deployment resolves an install order for every policy, skips packages
//! that already verify, installs the rest through a delivery transport and
//! confirms each installation before moving on.
//!
//! ## Core Concepts
//!
//! - **Package**: named unit with dependencies, installers and verifiers
//! - **Registry**: name to package map plus virtual-name providers
//! - **Resolver**: computes install orders and disambiguates virtual names
//! - **Installer**: turns a declaration into pre/install/post commands
//! - **Verifier**: boolean shell checks, used as probe and as gate
//! - **Deployment**: drives resolve, check, install and verify per policy
//!
//! ## Example
//!
//! ```ignore
//! use provision::{
//!     Deployment, FirstCandidate, InstallerOptions, NoProgress, PackageBuilder,
//!     Policy, Registry, Verbatim,
//! };
//!
//! let mut registry = Registry::new();
//!
//! let mut nginx = PackageBuilder::new("nginx")?;
//! nginx.apt(["nginx"], InstallerOptions::default());
//! nginx.verify("binary").has_executable("/usr/sbin/nginx");
//! registry.register_declaration(nginx.build())?;
//!
//! let deployment = Deployment::new(&registry, &my_delivery, &Verbatim)
//!     .policy(Policy::new("web", ["web"], ["nginx"]));
//!
//! let report = deployment.process(&mut FirstCandidate, &mut NoProgress)?;
//! println!("{} installed", report.summary.installed);
//! ```
//!
//! ## Provider Traits
//!
//! The crate uses traits for dependency injection:
//!
//! - [`Delivery`]: runs commands, transfers files and probes checks on roles
//! - [`Renderer`]: renders templates for `render` transfers
//! - [`Chooser`]: picks a provider for an ambiguous virtual package
//! - [`ResolveObserver`]: sees every dependency edge while resolving
//! - [`ProgressCallback`]: receives progress updates
//!
//! This keeps the engine free of any transport, template language or UI.

pub mod context;
pub mod deployment;
pub mod error;
pub mod installer;
pub mod package;
pub mod paths;
pub mod registry;
pub mod shell;
pub mod template;
pub mod types;
pub mod verifier;

#[cfg(test)]
pub(crate) mod testing;

pub use context::{
    Answers, Chooser, Delivery, FirstCandidate, InstallContext, NoObserver, NoProgress,
    ProgressCallback, ResolveObserver,
};
pub use deployment::{
    Deployment, PackageStatus, Plan, PlannedPolicy, Policy, PolicyCheck, PolicyReport, RunReport,
};
pub use error::{DeliveryError, Error, ErrorCategory, Result};
pub use installer::{Installer, InstallerKind, PackageManager};
pub use package::{Declaration, Package, PackageBuilder};
pub use registry::{Lookup, Registry, Resolver};
pub use template::{RenderFailure, Renderer, TemplateError, Verbatim};
pub use types::{
    InstallerDefaults, InstallerOptions, Mode, PackageOutcome, RunOptions, RunSummary, Vars,
};
pub use verifier::{Check, Verifier, VerifyOutcome};
