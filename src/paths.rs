//! Path resolution for sprig
//!
//! # Environment Variables
//!
//! - `SPRIG_CONFIG_DIR` - Override config directory (e.g., `~/dotfiles/sprig`)
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `SPRIG_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/sprig` (if set)
//! 3. `~/.config/sprig`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "SPRIG_CONFIG_DIR";

/// Get the sprig config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand_path(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join("sprig");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join("sprig");
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Expand `~` and environment variables in a path
pub fn expand_path(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| shellexpand::tilde(path).into_owned());
    PathBuf::from(expanded)
}

/// Resolve `path` relative to `base` unless it is absolute
pub fn relative_to(base: &Path, path: &str) -> PathBuf {
    let expanded = expand_path(path);
    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}

/// Locate a script: as given, or inside the config directory
pub fn resolve_script(script: &Path) -> Result<PathBuf> {
    if script.exists() {
        return Ok(script.to_path_buf());
    }

    if script.is_relative() {
        let candidate = config_dir()?.join(script);
        if candidate.exists() {
            log::debug!("Found script in config dir: {}", candidate.display());
            return Ok(candidate);
        }
    }

    anyhow::bail!("Script not found: {}", script.display())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_tilde() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_path("~/sprig"), home.join("sprig"));
        }
    }

    #[test]
    fn test_relative_to() {
        let base = Path::new("/srv/site");
        assert_eq!(relative_to(base, "files"), PathBuf::from("/srv/site/files"));
        assert_eq!(relative_to(base, "/etc/files"), PathBuf::from("/etc/files"));
    }

    #[test]
    fn test_resolve_existing_script() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("site.toml");
        std::fs::write(&script, "").unwrap();
        assert_eq!(resolve_script(&script).unwrap(), script);
    }

    #[test]
    fn test_resolve_missing_script() {
        let err = resolve_script(Path::new("/nonexistent/site.toml")).unwrap_err();
        assert!(err.to_string().contains("Script not found"));
    }
}
