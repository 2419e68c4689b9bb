//! mcbuild CLI - build driver for CMake and Meson projects

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use mcbuild::errors::Result;

fn main() {
    if let Err(e) = run() {
        let code = e.exit_code();
        eprintln!("{:?}", miette::Report::new(e));
        std::process::exit(code);
    }
}

fn run() -> Result<()> {
    // Parse CLI
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("mcbuild=debug")
    } else {
        EnvFilter::new("mcbuild=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    // Execute command
    match cli.command {
        Commands::Build(args) => commands::build::execute(args),
        Commands::Status(args) => commands::status::execute(args),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
