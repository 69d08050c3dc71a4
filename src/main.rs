mod cli;
mod error;
mod manifest;
mod registry;
mod update;
mod version;
mod workflow;

use clap::Parser;
use cli::{Cli, Commands};
use colored::Colorize;
use std::process;

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        unsafe {
            std::env::set_var("PKGUP_VERBOSE", "1");
        }
    }

    let result = match cli.command {
        Commands::Update {
            packages,
            all,
            next,
            force,
            migrate_only,
            from,
            to,
            registry,
        } => workflow::execute_update(
            &cli.path,
            workflow::UpdateOptions {
                packages,
                all,
                next,
                force,
                migrate_only,
                from,
                to,
                registry,
            },
        ),
        Commands::Check { next, registry } => workflow::execute_check(&cli.path, next, registry),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}
