//! Template rendering for file transfers
//!
//! The engine does not depend on a template language. A [`Renderer`] turns
//! template text plus the package variables into the final file content;
//! failures are wrapped in a [`TemplateError`] that points at the offending
//! line of the template.

use crate::error::{Error, Result};
use crate::types::Vars;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Number of lines shown on each side of a failing template line
pub const SOURCE_CONTEXT_WINDOW: usize = 2;

/// Failure reported by a renderer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderFailure {
    /// Renderer's error message
    pub message: String,
    /// 1-based line of the failure, when the renderer knows it
    pub line: Option<usize>,
}

/// Template engine used for `render` transfers
pub trait Renderer: Send + Sync {
    /// Render `template` (read from `name`) with `vars`
    fn render(
        &self,
        name: &str,
        template: &str,
        vars: &Vars,
    ) -> std::result::Result<String, RenderFailure>;
}

/// Renderer that returns the template text unchanged
pub struct Verbatim;

impl Renderer for Verbatim {
    fn render(
        &self,
        _name: &str,
        template: &str,
        _vars: &Vars,
    ) -> std::result::Result<String, RenderFailure> {
        Ok(template.to_string())
    }
}

/// A template that failed to render, with source context
#[derive(Debug, Clone)]
pub struct TemplateError {
    path: PathBuf,
    message: String,
    template: String,
    line: Option<usize>,
}

impl TemplateError {
    pub fn new(path: impl Into<PathBuf>, template: impl Into<String>, failure: RenderFailure) -> Self {
        Self {
            path: path.into(),
            message: failure.message,
            template: template.into(),
            line: failure.line,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// 1-based line of the failure, if known
    pub fn line_number(&self) -> Option<usize> {
        self.line
    }

    /// Human-readable location, e.g. `on line #3`
    pub fn source_location(&self) -> String {
        match self.line {
            Some(line) => format!("on line #{line}"),
            None => "at an unknown line".to_string(),
        }
    }

    /// Numbered template lines around the failure
    ///
    /// Returns `None` when the renderer did not report a line.
    pub fn source_listing(&self) -> Option<String> {
        let line = self.line?;
        let index = line.saturating_sub(1);
        let begin = index.saturating_sub(SOURCE_CONTEXT_WINDOW);
        let size = SOURCE_CONTEXT_WINDOW * 2 + 1;

        let listing: Vec<String> = self
            .template
            .lines()
            .enumerate()
            .skip(begin)
            .take(size)
            .map(|(i, text)| format!("{:>3}: {text}", i + 1))
            .collect();

        Some(listing.join("\n"))
    }
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "template {} failed to render ({}) {}",
            self.path.display(),
            self.message,
            self.source_location()
        )?;
        if let Some(listing) = self.source_listing() {
            write!(f, ":\n\n{listing}")?;
        }
        Ok(())
    }
}

impl std::error::Error for TemplateError {}

/// Render a local template file into a temporary file
///
/// The temporary file is removed when the returned handle is dropped, so the
/// caller must keep it alive until the transfer completes.
pub fn render_to_tempfile(
    renderer: &dyn Renderer,
    path: &Path,
    vars: &Vars,
    package: &str,
) -> Result<NamedTempFile> {
    let template = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let name = path.to_string_lossy();

    let output = renderer
        .render(&name, &template, vars)
        .map_err(|failure| TemplateError::new(path, template.as_str(), failure))?;

    let mut file = tempfile::Builder::new()
        .prefix(package)
        .tempfile()
        .map_err(|e| Error::io(std::env::temp_dir(), e))?;
    file.write_all(output.as_bytes())
        .map_err(|e| Error::io(file.path(), e))?;
    file.flush().map_err(|e| Error::io(file.path(), e))?;

    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing(Option<usize>);

    impl Renderer for Failing {
        fn render(
            &self,
            _name: &str,
            _template: &str,
            _vars: &Vars,
        ) -> std::result::Result<String, RenderFailure> {
            Err(RenderFailure {
                message: "undefined value".into(),
                line: self.0,
            })
        }
    }

    const TEMPLATE: &str = "one\ntwo\nthree\nfour\nfive\nsix\nseven";

    fn error_at(line: Option<usize>) -> TemplateError {
        TemplateError::new(
            "site.conf",
            TEMPLATE,
            RenderFailure {
                message: "undefined value".into(),
                line,
            },
        )
    }

    #[test]
    fn test_source_listing_window() {
        let err = error_at(Some(4));
        assert_eq!(err.source_location(), "on line #4");
        assert_eq!(
            err.source_listing().unwrap(),
            "  2: two\n  3: three\n  4: four\n  5: five\n  6: six"
        );
    }

    #[test]
    fn test_source_listing_at_start() {
        let err = error_at(Some(1));
        assert_eq!(
            err.source_listing().unwrap(),
            "  1: one\n  2: two\n  3: three\n  4: four\n  5: five"
        );
    }

    #[test]
    fn test_source_listing_at_end() {
        let err = error_at(Some(7));
        assert_eq!(
            err.source_listing().unwrap(),
            "  5: five\n  6: six\n  7: seven"
        );
    }

    #[test]
    fn test_unknown_line() {
        let err = error_at(None);
        assert!(err.source_listing().is_none());
        assert!(err.to_string().contains("undefined value"));
    }

    #[test]
    fn test_render_to_tempfile() {
        let mut source = tempfile::NamedTempFile::new().unwrap();
        source.write_all(b"listen 80;\n").unwrap();

        let rendered = render_to_tempfile(&Verbatim, source.path(), &Vars::new(), "nginx").unwrap();
        let content = std::fs::read_to_string(rendered.path()).unwrap();
        assert_eq!(content, "listen 80;\n");
    }

    #[test]
    fn test_render_failure_wrapped() {
        let mut source = tempfile::NamedTempFile::new().unwrap();
        source.write_all(TEMPLATE.as_bytes()).unwrap();

        let err = render_to_tempfile(&Failing(Some(3)), source.path(), &Vars::new(), "app")
            .unwrap_err();
        match err {
            Error::Template(t) => {
                assert_eq!(t.line_number(), Some(3));
                assert!(t.source_listing().unwrap().contains("  3: three"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
