//! Jinja-style template rendering for `render` transfers

use minijinja::{Environment, UndefinedBehavior};
use provision::{RenderFailure, Renderer, Vars};

/// Renders templates with minijinja; undefined variables are errors
pub struct MiniJinjaRenderer {
    env: Environment<'static>,
}

impl MiniJinjaRenderer {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);
        Self { env }
    }
}

impl Default for MiniJinjaRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for MiniJinjaRenderer {
    fn render(&self, name: &str, template: &str, vars: &Vars) -> Result<String, RenderFailure> {
        self.env
            .render_named_str(name, template, vars)
            .map_err(|err| RenderFailure {
                message: err.to_string(),
                line: err.line(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars() -> Vars {
        let mut vars = Vars::new();
        vars.insert("server_name".into(), json!("example.org"));
        vars.insert("workers".into(), json!(4));
        vars
    }

    #[test]
    fn test_render_variables() {
        let renderer = MiniJinjaRenderer::new();
        let out = renderer
            .render(
                "nginx.conf",
                "server_name {{ server_name }};\nworkers {{ workers }};\n",
                &vars(),
            )
            .unwrap();
        assert_eq!(out, "server_name example.org;\nworkers 4;\n");
    }

    #[test]
    fn test_undefined_variable_reports_line() {
        let renderer = MiniJinjaRenderer::new();
        let failure = renderer
            .render("app.conf", "a\nb\n{{ missing }}\nd\n", &vars())
            .unwrap_err();
        assert_eq!(failure.line, Some(3));
        assert!(!failure.message.is_empty());
    }

    #[test]
    fn test_syntax_error() {
        let renderer = MiniJinjaRenderer::new();
        let failure = renderer
            .render("broken.conf", "{% if %}", &vars())
            .unwrap_err();
        assert_eq!(failure.line, Some(1));
    }

    #[test]
    fn test_loops_over_lists() {
        let mut vars = Vars::new();
        vars.insert("hosts".into(), json!(["a", "b"]));
        let renderer = MiniJinjaRenderer::new();
        let out = renderer
            .render("hosts", "{% for h in hosts %}{{ h }} {% endfor %}", &vars)
            .unwrap();
        assert_eq!(out, "a b ");
    }
}
