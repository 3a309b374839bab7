//! Structural commands for file transfers

use crate::shell::quote;
use std::path::Path;

/// Create the destination's parent directory unless it exists
pub(super) fn mkdir_command(destination: &str, sudo: &str) -> String {
    let dir = Path::new(destination)
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| ".".to_string());
    let dir = quote(&dir);
    format!("test -d {dir} || {sudo}mkdir -p {dir}")
}
