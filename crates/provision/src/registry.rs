//! Package registry and dependency resolution
//!
//! The [`Registry`] is populated once while declarations load and is only
//! read afterwards. The [`Resolver`] walks it to produce install orders:
//! recommendations first, then hard dependencies, then the package itself,
//! then optional entries.

use crate::context::{Chooser, ResolveObserver};
use crate::deployment::Policy;
use crate::error::{Error, Result};
use crate::package::{Declaration, Package};
use std::collections::{BTreeMap, HashSet};

/// Result of looking a name up in the registry
#[derive(Debug)]
pub enum Lookup<'r> {
    /// A package with this exact name
    Concrete(&'r Package),
    /// Packages providing this virtual name, sorted by name
    Virtual(Vec<&'r Package>),
    /// Nothing matches
    Missing,
}

/// Name to package map plus virtual name to providers map
#[derive(Debug, Default)]
pub struct Registry {
    packages: BTreeMap<String, Package>,
    providers: BTreeMap<String, Vec<String>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a package; names must be unique
    pub fn register(&mut self, package: Package) -> Result<()> {
        if self.packages.contains_key(package.name()) {
            return Err(Error::DuplicatePackage(package.name().to_string()));
        }
        if let Some(virtual_name) = package.provides() {
            let providers = self.providers.entry(virtual_name.to_string()).or_default();
            providers.push(package.name().to_string());
            providers.sort();
        }
        log::trace!("registered package {}", package.name());
        self.packages.insert(package.name().to_string(), package);
        Ok(())
    }

    /// Register a declaration and the packages it generated
    ///
    /// Generated packages may be declared by several packages (two packages
    /// both calling `require_apt("curl")`); identical repeats are ignored.
    pub fn register_declaration(&mut self, declaration: Declaration) -> Result<()> {
        self.register(declaration.package)?;
        for generated in declaration.generated {
            match self.packages.get(generated.name()) {
                Some(existing) if *existing == generated => {}
                Some(_) => return Err(Error::DuplicatePackage(generated.name().to_string())),
                None => self.register(generated)?,
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Package> {
        self.packages.get(name)
    }

    /// Packages providing `virtual_name`, sorted by name
    pub fn providers(&self, virtual_name: &str) -> Vec<&Package> {
        self.providers
            .get(virtual_name)
            .map(|names| names.iter().filter_map(|n| self.packages.get(n)).collect())
            .unwrap_or_default()
    }

    /// Concrete names take precedence over virtual ones
    pub fn lookup(&self, name: &str) -> Lookup<'_> {
        if let Some(package) = self.packages.get(name) {
            return Lookup::Concrete(package);
        }
        let providers = self.providers(name);
        if providers.is_empty() {
            Lookup::Missing
        } else {
            Lookup::Virtual(providers)
        }
    }

    /// All packages in name order
    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    /// Virtual names and their provider names
    pub fn virtual_names(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.providers
            .iter()
            .map(|(name, providers)| (name.as_str(), providers.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// Computes install orders over a registry
pub struct Resolver<'r> {
    registry: &'r Registry,
}

impl<'r> Resolver<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Install order for `root`, the root itself included
    ///
    /// The chooser is consulted for every occurrence of an ambiguous
    /// virtual name; nothing is cached between occurrences.
    pub fn tree(
        &self,
        root: &str,
        chooser: &mut dyn Chooser,
        observer: &mut dyn ResolveObserver,
    ) -> Result<Vec<&'r Package>> {
        let package = self
            .select(root, chooser)?
            .ok_or_else(|| Error::UnknownPackage(root.to_string()))?;

        let mut order = Vec::new();
        let mut path = Vec::new();
        self.visit(package, 1, chooser, observer, &mut path, &mut order)?;
        Ok(dedupe(order))
    }

    /// Install order for every entry of a policy, concatenated
    pub fn resolve_policy(
        &self,
        policy: &Policy,
        chooser: &mut dyn Chooser,
        observer: &mut dyn ResolveObserver,
    ) -> Result<Vec<&'r Package>> {
        let mut order = Vec::new();
        for entry in policy.packages() {
            order.extend(self.tree(entry, chooser, observer)?);
        }
        Ok(dedupe(order))
    }

    fn visit(
        &self,
        package: &'r Package,
        depth: usize,
        chooser: &mut dyn Chooser,
        observer: &mut dyn ResolveObserver,
        path: &mut Vec<String>,
        order: &mut Vec<&'r Package>,
    ) -> Result<()> {
        if let Some(start) = path.iter().position(|p| p == package.name()) {
            let mut cycle = path[start..].to_vec();
            cycle.push(package.name().to_string());
            return Err(Error::DependencyCycle { cycle });
        }
        path.push(package.name().to_string());

        for name in package.recommends() {
            if let Some(dependency) = self.select(name, chooser)? {
                observer.on_dependency(package, dependency, depth);
                self.visit(dependency, depth + 1, chooser, observer, path, order)?;
            } else {
                log::debug!("{}: recommended package {name} not found, skipping", package.name());
            }
        }

        for name in package.dependencies() {
            let dependency = self.select(name, chooser)?.ok_or_else(|| {
                Error::UnresolvableDependency {
                    package: package.name().to_string(),
                    dependency: name.clone(),
                }
            })?;
            observer.on_dependency(package, dependency, depth);
            self.visit(dependency, depth + 1, chooser, observer, path, order)?;
        }

        order.push(package);

        for name in package.optional() {
            if let Some(dependency) = self.select(name, chooser)? {
                observer.on_dependency(package, dependency, depth);
                self.visit(dependency, depth + 1, chooser, observer, path, order)?;
            } else {
                log::debug!("{}: optional package {name} not found, skipping", package.name());
            }
        }

        path.pop();
        Ok(())
    }

    /// Resolve a reference to one concrete package
    fn select(&self, name: &str, chooser: &mut dyn Chooser) -> Result<Option<&'r Package>> {
        match self.registry.lookup(name) {
            Lookup::Concrete(package) => Ok(Some(package)),
            Lookup::Missing => Ok(None),
            Lookup::Virtual(candidates) => {
                let selected = if let [only] = candidates.as_slice() {
                    *only
                } else {
                    let names: Vec<&str> = candidates.iter().map(|p| p.name()).collect();
                    let choice = chooser.choose(name, &names)?;
                    candidates
                        .iter()
                        .copied()
                        .find(|p| p.name() == choice)
                        .ok_or_else(|| Error::InvalidChoice {
                            virtual_name: name.to_string(),
                            choice,
                            candidates: names.iter().map(|n| (*n).to_string()).collect(),
                        })?
                };
                log::info!("Selecting {} for virtual package {name}", selected.name());
                Ok(Some(selected))
            }
        }
    }
}

/// Keep the first occurrence of every package
fn dedupe(order: Vec<&Package>) -> Vec<&Package> {
    let mut seen = HashSet::new();
    order
        .into_iter()
        .filter(|p| seen.insert(p.name().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{FirstCandidate, NoObserver};
    use crate::package::PackageBuilder;
    use crate::types::InstallerOptions;

    /// Chooser that records what it was asked
    #[derive(Default)]
    struct Recording {
        asked: Vec<(String, Vec<String>)>,
        answer: Option<String>,
    }

    impl Chooser for Recording {
        fn choose(&mut self, virtual_name: &str, candidates: &[&str]) -> Result<String> {
            self.asked.push((
                virtual_name.to_string(),
                candidates.iter().map(|c| (*c).to_string()).collect(),
            ));
            Ok(self
                .answer
                .clone()
                .unwrap_or_else(|| candidates[candidates.len() - 1].to_string()))
        }
    }

    #[derive(Default)]
    struct Edges(Vec<(String, String, usize)>);

    impl ResolveObserver for Edges {
        fn on_dependency(&mut self, dependent: &Package, dependency: &Package, depth: usize) {
            self.0
                .push((dependent.name().into(), dependency.name().into(), depth));
        }
    }

    fn package(name: &str, build: impl FnOnce(&mut PackageBuilder)) -> Package {
        let mut builder = PackageBuilder::new(name).unwrap();
        builder.noop(InstallerOptions::default());
        build(&mut builder);
        builder.build().package
    }

    fn registry(packages: Vec<Package>) -> Registry {
        let mut registry = Registry::new();
        for p in packages {
            registry.register(p).unwrap();
        }
        registry
    }

    fn names(order: &[&Package]) -> Vec<String> {
        order.iter().map(|p| p.name().to_string()).collect()
    }

    #[test]
    fn test_order_recommends_requires_self_optional() {
        let registry = registry(vec![
            package("app", |b| {
                b.recommends(["tools"]).requires(["ruby"]).optional(["docs"]);
            }),
            package("ruby", |b| {
                b.requires(["libc"]);
            }),
            package("libc", |_| {}),
            package("tools", |_| {}),
            package("docs", |_| {}),
        ]);

        let order = Resolver::new(&registry)
            .tree("app", &mut FirstCandidate, &mut NoObserver)
            .unwrap();
        assert_eq!(names(&order), ["tools", "libc", "ruby", "app", "docs"]);
    }

    #[test]
    fn test_missing_recommends_and_optional_skipped() {
        let registry = registry(vec![package("app", |b| {
            b.recommends(["ghost"]).optional(["phantom"]);
        })]);

        let order = Resolver::new(&registry)
            .tree("app", &mut FirstCandidate, &mut NoObserver)
            .unwrap();
        assert_eq!(names(&order), ["app"]);
    }

    #[test]
    fn test_missing_dependency_fails() {
        let registry = registry(vec![package("app", |b| {
            b.requires(["ruby"]);
        })]);

        let err = Resolver::new(&registry)
            .tree("app", &mut FirstCandidate, &mut NoObserver)
            .unwrap_err();
        match err {
            Error::UnresolvableDependency {
                package,
                dependency,
            } => {
                assert_eq!(package, "app");
                assert_eq!(dependency, "ruby");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_root() {
        let registry = Registry::new();
        let err = Resolver::new(&registry)
            .tree("nothing", &mut FirstCandidate, &mut NoObserver)
            .unwrap_err();
        assert!(matches!(err, Error::UnknownPackage(name) if name == "nothing"));
    }

    #[test]
    fn test_single_candidate_never_asks() {
        let registry = registry(vec![
            package("app", |b| {
                b.requires(["db"]);
            }),
            package("postgres", |b| {
                b.provides("db");
            }),
        ]);

        let mut chooser = Recording::default();
        let order = Resolver::new(&registry)
            .tree("app", &mut chooser, &mut NoObserver)
            .unwrap();
        assert_eq!(names(&order), ["postgres", "app"]);
        assert!(chooser.asked.is_empty());
    }

    #[test]
    fn test_virtual_db_asks_once_per_occurrence() {
        let registry = registry(vec![
            package("app", |b| {
                b.requires(["db", "worker"]);
            }),
            package("worker", |b| {
                b.requires(["db"]);
            }),
            package("mysql", |b| {
                b.provides("db");
            }),
            package("postgres", |b| {
                b.provides("db");
            }),
        ]);

        let mut chooser = Recording {
            answer: Some("postgres".into()),
            ..Default::default()
        };
        let order = Resolver::new(&registry)
            .tree("app", &mut chooser, &mut NoObserver)
            .unwrap();

        assert_eq!(names(&order), ["postgres", "worker", "app"]);
        assert_eq!(chooser.asked.len(), 2);
        for (virtual_name, candidates) in &chooser.asked {
            assert_eq!(virtual_name, "db");
            assert_eq!(candidates, &["mysql".to_string(), "postgres".to_string()]);
        }
    }

    #[test]
    fn test_invalid_choice_rejected() {
        let registry = registry(vec![
            package("app", |b| {
                b.requires(["db"]);
            }),
            package("mysql", |b| {
                b.provides("db");
            }),
            package("postgres", |b| {
                b.provides("db");
            }),
        ]);

        let mut chooser = Recording {
            answer: Some("sqlite".into()),
            ..Default::default()
        };
        let err = Resolver::new(&registry)
            .tree("app", &mut chooser, &mut NoObserver)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidChoice { choice, .. } if choice == "sqlite"));
    }

    #[test]
    fn test_concrete_name_wins_over_virtual() {
        let registry = registry(vec![
            package("db", |_| {}),
            package("mysql", |b| {
                b.provides("db");
            }),
        ]);

        let order = Resolver::new(&registry)
            .tree("db", &mut FirstCandidate, &mut NoObserver)
            .unwrap();
        assert_eq!(names(&order), ["db"]);
    }

    #[test]
    fn test_cycle_detected() {
        let registry = registry(vec![
            package("a", |b| {
                b.requires(["b"]);
            }),
            package("b", |b| {
                b.recommends(["a"]);
            }),
        ]);

        let err = Resolver::new(&registry)
            .tree("a", &mut FirstCandidate, &mut NoObserver)
            .unwrap_err();
        match err {
            Error::DependencyCycle { cycle } => assert_eq!(cycle, ["a", "b", "a"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_shared_dependency_deduped_and_observed() {
        let registry = registry(vec![
            package("app", |b| {
                b.requires(["ruby", "rails"]);
            }),
            package("rails", |b| {
                b.requires(["ruby"]);
            }),
            package("ruby", |_| {}),
        ]);

        let mut edges = Edges::default();
        let order = Resolver::new(&registry)
            .tree("app", &mut FirstCandidate, &mut edges)
            .unwrap();

        assert_eq!(names(&order), ["ruby", "rails", "app"]);
        assert_eq!(
            edges.0,
            [
                ("app".to_string(), "ruby".to_string(), 1),
                ("app".to_string(), "rails".to_string(), 1),
                ("rails".to_string(), "ruby".to_string(), 2),
            ]
        );
    }

    #[test]
    fn test_duplicate_registration() {
        let mut registry = Registry::new();
        registry.register(package("nginx", |_| {})).unwrap();
        let err = registry.register(package("nginx", |_| {})).unwrap_err();
        assert!(matches!(err, Error::DuplicatePackage(name) if name == "nginx"));
    }

    #[test]
    fn test_generated_packages_shared() {
        let mut registry = Registry::new();

        let mut app = PackageBuilder::new("app").unwrap();
        app.require_apt(["curl"]);
        registry.register_declaration(app.build()).unwrap();

        let mut worker = PackageBuilder::new("worker").unwrap();
        worker.require_apt(["curl"]);
        registry.register_declaration(worker.build()).unwrap();

        assert_eq!(registry.len(), 3);
        assert!(registry.get("apt_package_curl").is_some());
    }

    #[test]
    fn test_resolve_policy_concatenates() {
        let registry = registry(vec![
            package("nginx", |_| {}),
            package("app", |b| {
                b.requires(["nginx"]);
            }),
        ]);
        let policy = Policy::new("web", ["web"], ["nginx", "app"]);

        let order = Resolver::new(&registry)
            .resolve_policy(&policy, &mut FirstCandidate, &mut NoObserver)
            .unwrap();
        assert_eq!(names(&order), ["nginx", "app"]);
    }
}
