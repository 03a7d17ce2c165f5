//! Sluice Migration CLI Tool
//!
//! Command-line interface for reconciling a database with its migration
//! scripts. Suitable for manual use and CI/CD pipelines: any failure exits
//! with status 1.

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use sluice::MigrationConfig;
use sluice_migrate::cli::Cli;
use sluice_migrate::commands;
use std::io;
use std::process;

fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_filter())).init();

    match run(&cli) {
        Ok(()) => {
            if !cli.quiet {
                println!("{}", "✅ Success".green());
            }
        }
        Err(e) => {
            eprintln!("{} {:#}", "❌ Error:".red().bold(), e);
            process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = MigrationConfig::load().context("Failed to load configuration")?;
    let config = cli.apply_overrides(config);
    log::debug!("Using {} backend", config.backend);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    commands::execute(&config, &cli.command, &mut out)
}
