mod chooser;
mod cli;
mod commands;
mod delivery;
mod loader;
mod paths;
mod progress;
mod render;
mod schema;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    if let Err(err) = dispatch(&ctx, cli.command) {
        report(&err);
        std::process::exit(1);
    }
}

fn dispatch(ctx: &Context, command: Command) -> Result<()> {
    match command {
        Command::Apply(args) => commands::apply::run(ctx, args),
        Command::Plan(args) => commands::plan::run(ctx, args),
        Command::Check(args) => commands::check::run(ctx, args),
        Command::List(args) => commands::list::run(ctx, args),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "sprig", &mut io::stdout());
            Ok(())
        }
    }
}

/// Print an error with its category and, for templates, the failing source
fn report(err: &anyhow::Error) {
    ui::error(&format!("{err:#}"));

    let Some(provision_err) = err
        .chain()
        .find_map(|e| e.downcast_ref::<provision::Error>())
    else {
        return;
    };

    if let provision::Error::Template(template) = provision_err {
        eprintln!("  {}", template.source_location());
        if let Some(listing) = template.source_listing() {
            eprintln!("{listing}");
        }
    }

    let category = provision_err.category();
    eprintln!("  {}: {}", category.description(), category.advice());
}
