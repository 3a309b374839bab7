//! Shell quoting for generated commands

/// Wrap a string in single quotes for a POSIX shell
pub fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Join commands into one shell string
pub fn join(commands: &[String]) -> String {
    commands.join("; ")
}
