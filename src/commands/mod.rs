pub mod apply;
pub mod check;
pub mod list;
pub mod plan;

use crate::chooser::{self, PromptChooser};
use crate::cli::RunArgs;
use crate::delivery;
use crate::loader::{self, Loaded};
use crate::paths;
use crate::render::MiniJinjaRenderer;
use anyhow::Result;
use provision::{Answers, Delivery, Deployment, Policy, RunOptions};

/// Everything a run needs: the loaded script, transport and renderer
pub struct Session {
    pub loaded: Loaded,
    pub delivery: Box<dyn Delivery>,
    pub renderer: MiniJinjaRenderer,
    pub options: RunOptions,
    policies: Vec<Policy>,
}

impl Session {
    pub fn open(args: &RunArgs) -> Result<Self> {
        let script = paths::resolve_script(&args.script)?;
        let loaded = loader::load(&script, args.config_dir.as_deref())?;
        let policies = select_policies(&loaded.policies, &args.policies)?;

        let delivery = delivery::from_config(&loaded.script.delivery, &loaded.script.roles);
        let options = RunOptions {
            testing: args.testing,
            force: args.force,
        };

        Ok(Self {
            loaded,
            delivery,
            renderer: MiniJinjaRenderer::new(),
            options,
            policies,
        })
    }

    /// Deployment over the selected policies
    pub fn deployment(&self) -> Deployment<'_> {
        Deployment::new(&self.loaded.registry, self.delivery.as_ref(), &self.renderer)
            .policies(self.policies.iter().cloned())
            .defaults(self.loaded.script.defaults.clone())
            .vars(self.loaded.script.settings.vars.clone())
            .options(self.options.clone())
    }

    /// Script choices and `--answer` flags in front of the prompt
    pub fn chooser(&self, args: &RunArgs) -> Answers<PromptChooser> {
        chooser::for_run(&self.loaded.script.choices, &args.answers, args.yes)
    }
}

/// Keep only the named policies, in script order; unknown names are errors
fn select_policies(all: &[Policy], names: &[String]) -> Result<Vec<Policy>> {
    if names.is_empty() {
        return Ok(all.to_vec());
    }

    for name in names {
        if !all.iter().any(|p| p.name() == name) {
            let known: Vec<&str> = all.iter().map(Policy::name).collect();
            anyhow::bail!(
                "Unknown policy '{}'. Available: {}",
                name,
                known.join(", ")
            );
        }
    }

    Ok(all
        .iter()
        .filter(|p| names.iter().any(|n| n == p.name()))
        .cloned()
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policies() -> Vec<Policy> {
        vec![
            Policy::new("web", ["web"], ["nginx"]),
            Policy::new("db", ["db"], ["postgres"]),
            Policy::new("cache", ["cache"], ["redis"]),
        ]
    }

    #[test]
    fn test_select_all_by_default() {
        assert_eq!(select_policies(&policies(), &[]).unwrap().len(), 3);
    }

    #[test]
    fn test_select_keeps_script_order() {
        let selected =
            select_policies(&policies(), &["cache".to_string(), "web".to_string()]).unwrap();
        let names: Vec<_> = selected.iter().map(Policy::name).collect();
        assert_eq!(names, vec!["web", "cache"]);
    }

    #[test]
    fn test_select_unknown_policy() {
        let err = select_policies(&policies(), &["mail".to_string()]).unwrap_err();
        assert!(err.to_string().contains("Unknown policy 'mail'"));
    }
}
