//! Flotilla CLI - module federation for independently built containers

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::GlobalArgs;
use flotilla::federation::FederationError;
use flotilla::util::diagnostic::{emit, DuplicateContainerError, UndefinedModuleError};

fn main() {
    let cli = Cli::parse();
    let color = !cli.no_color;

    if let Err(e) = run(cli) {
        report(e, color);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("flotilla=debug")
    } else {
        EnvFilter::new("flotilla=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!cli.no_color)
        .with_target(false)
        .without_time()
        .init();

    let global = GlobalArgs {
        manifest_path: cli.manifest_path,
        verbose: cli.verbose,
        color: !cli.no_color,
    };

    // Execute command
    match cli.command {
        Commands::Build(args) => commands::build::execute(args, &global),
        Commands::Resolve(args) => commands::resolve::execute(args, &global),
        Commands::Import(args) => commands::import::execute(args, &global),
        Commands::Graph(args) => commands::graph::execute(args, &global),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}

/// Print `err` the richest way its type allows.
fn report(err: anyhow::Error, color: bool) {
    if !color {
        let _ = miette::set_hook(Box::new(|_| {
            Box::new(miette::MietteHandlerOpts::new().color(false).build())
        }));
    }

    let err = match err.downcast::<DuplicateContainerError>() {
        Ok(dup) => return eprintln!("{:?}", miette::Report::new(dup)),
        Err(err) => err,
    };
    let err = match err.downcast::<UndefinedModuleError>() {
        Ok(undefined) => return eprintln!("{:?}", miette::Report::new(undefined)),
        Err(err) => err,
    };
    match err.downcast_ref::<FederationError>() {
        Some(federation) => emit(&federation.to_diagnostic(), color),
        None => eprintln!("error: {:#}", err),
    }
}
