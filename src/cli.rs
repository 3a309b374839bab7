use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sprig")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative provisioning for packages, policies and roles", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Install every policy of a script on its roles
    Apply(RunArgs),

    /// Show the resolved install order without touching any host
    Plan(RunArgs),

    /// Probe which packages are already installed
    Check(RunArgs),

    /// List declared packages, virtual packages and policies
    List(ListArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Run Arguments
// ============================================================================

#[derive(Args, Clone)]
pub struct RunArgs {
    /// Declaration script (TOML); relative names are also looked up in the config dir
    pub script: PathBuf,

    /// Only process these policies
    #[arg(short, long = "policy")]
    pub policies: Vec<String>,

    /// Generate commands without running them on any host
    #[arg(short, long)]
    pub testing: bool,

    /// Skip pre-checks and always run installers
    #[arg(short, long)]
    pub force: bool,

    /// Prefix for relative local files (templates, configuration)
    #[arg(short, long, env = "SPRIG_FILES_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Answer a virtual package choice up front (VIRTUAL=PACKAGE)
    #[arg(long = "answer", value_parser = parse_answer)]
    pub answers: Vec<(String, String)>,

    /// Never prompt; pick the first candidate for unanswered choices
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args)]
pub struct ListArgs {
    /// Declaration script (TOML)
    pub script: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Parse `VIRTUAL=PACKAGE`
fn parse_answer(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((virtual_name, package)) if !virtual_name.is_empty() && !package.is_empty() => {
            Ok((virtual_name.to_string(), package.to_string()))
        }
        _ => Err(format!("expected VIRTUAL=PACKAGE, got '{s}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_apply_flags() {
        let cli = Cli::try_parse_from([
            "sprig", "-vv", "apply", "site.toml", "-t", "-f", "-p", "web", "--answer", "db=postgres",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Apply(args) => {
                assert!(args.testing);
                assert!(args.force);
                assert_eq!(args.policies, vec!["web".to_string()]);
                assert_eq!(args.answers, vec![("db".to_string(), "postgres".to_string())]);
            }
            _ => panic!("expected apply"),
        }
    }

    #[test]
    fn test_parse_answer() {
        assert_eq!(
            parse_answer("db=mysql").unwrap(),
            ("db".to_string(), "mysql".to_string())
        );
        assert!(parse_answer("db").is_err());
        assert!(parse_answer("=mysql").is_err());
    }
}
