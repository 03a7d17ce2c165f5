//! Command-line arguments

use clap::{Parser, Subcommand};
use sluice::{Backend, MigrationConfig};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sluice-migrate")]
#[command(about = "Schema migration tool for Sluice")]
#[command(version = "0.1.0")]
pub struct Cli {
    /// PostgreSQL connection URL (selects the postgres backend unless --backend is given)
    #[arg(long)]
    pub database_url: Option<String>,

    /// SQLite database file
    #[arg(long)]
    pub sqlite_path: Option<PathBuf>,

    /// Migrations directory path
    #[arg(long)]
    pub migrations_dir: Option<PathBuf>,

    /// Database backend: sqlite or postgres
    #[arg(long)]
    pub backend: Option<Backend>,

    /// Name of the ledger table
    #[arg(long)]
    pub ledger_table: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Show migration status (applied, pending and surplus)
    Status,

    /// Check applied history against the catalog and fail if anything is out of date
    Verify,

    /// Reconcile the database with the migrations directory
    Up {
        /// Dry run - show what would be executed without running
        #[arg(long)]
        dry_run: bool,
    },
}

impl Cli {
    /// Default `env_logger` filter for the verbosity flags
    pub fn log_filter(&self) -> &'static str {
        if self.quiet {
            "error"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        }
    }

    /// Layer the command-line flags over the loaded configuration
    pub fn apply_overrides(&self, mut config: MigrationConfig) -> MigrationConfig {
        if let Some(url) = &self.database_url {
            config.database_url = url.clone();
            config.backend = Backend::Postgres;
        }
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(path) = &self.sqlite_path {
            config.sqlite_path = path.clone();
        }
        if let Some(dir) = &self.migrations_dir {
            config.migrations_dir = dir.clone();
        }
        if let Some(table) = &self.ledger_table {
            config.ledger_table = table.clone();
        }
        config
    }
}
