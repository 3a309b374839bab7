//! Local path helpers for declaration files

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Names ignored by `rsync -C`, plus editor swap files
const EXCLUDED_PATTERNS: &[&str] = &[
    "RCS",
    "SCCS",
    "CVS",
    "CVS.adm",
    "RCSLOG",
    "cvslog.*",
    "tags",
    "TAGS",
    ".make.state",
    ".nse_depinfo",
    "*~",
    "#*",
    ".#*",
    ",*",
    "_$*",
    "*$",
    "*.old",
    "*.bak",
    "*.BAK",
    "*.orig",
    "*.rej",
    ".del-*",
    "*.a",
    "*.olb",
    "*.o",
    "*.obj",
    "*.so",
    "*.exe",
    "*.Z",
    "*.elc",
    "*.ln",
    "core",
    ".svn",
    ".git",
    ".bzr",
    ".swp",
];

static EXCLUDED: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    EXCLUDED_PATTERNS
        .iter()
        .filter_map(|pattern| Regex::new(&glob_to_regex(pattern)).ok())
        .collect()
});

static DESTINATION: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"/\.(/.+)").ok());

/// Translate a shell glob (only `*` and `?`) into an anchored regex
fn glob_to_regex(glob: &str) -> String {
    let mut out = String::from("^");
    for c in glob.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    out
}

/// Prefix a relative local path with the config directory
///
/// Paths already under the config directory are returned unchanged.
pub fn prefix_config_dir(path: &str, config_dir: Option<&Path>) -> String {
    match config_dir {
        Some(dir) if !path.starts_with(&*dir.to_string_lossy()) => {
            dir.join(path).to_string_lossy().into_owned()
        }
        _ => path.to_string(),
    }
}

/// Derive the remote destination from a local path containing `/./`
///
/// `mysql/./etc/mysql/my.cnf` becomes `/etc/mysql/my.cnf`. Paths without
/// the marker are returned unchanged.
pub fn extract_destination(path: &str) -> String {
    DESTINATION
        .as_ref()
        .and_then(|re| re.captures(path))
        .and_then(|caps| caps.get(1))
        .map_or_else(|| path.to_string(), |m| m.as_str().to_string())
}

/// Check whether a file name should be skipped when walking directories
///
/// Matches the directory aliases `.` and `..` and everything `rsync -C`
/// would ignore. Only the final path component is considered.
pub fn excludable_file(name: &str) -> bool {
    let base = Path::new(name)
        .file_name()
        .map_or_else(|| name.to_string(), |n| n.to_string_lossy().into_owned());

    if name == "." || name == ".." || base == "." || base == ".." {
        return true;
    }

    EXCLUDED.iter().any(|re| re.is_match(&base))
}
