//! Command handlers
//!
//! Handlers are generic over the connection so the same code drives SQLite,
//! PostgreSQL and the tests. Output goes to the writer passed in.

use crate::cli::Commands;
use crate::render;
use anyhow::{bail, Context, Result};
use sluice::backend::postgres::PostgresConnection;
use sluice::backend::sqlite::SqliteConnection;
use sluice::migration::DirectorySource;
use sluice::{Backend, MigrationConfig, MigrationConnection, Migrator};
use std::io::Write;

/// Connect to the configured database and run `command`
pub fn execute(config: &MigrationConfig, command: &Commands, out: &mut impl Write) -> Result<()> {
    let table = config.validate()?;
    let source = DirectorySource::new(&config.migrations_dir);
    let migrator = Migrator::from_source(&source)?.with_ledger_table(table);
    log::debug!(
        "Loaded {} migration(s) from {}",
        migrator.catalog().len(),
        source.dir().display()
    );

    match config.backend {
        Backend::Sqlite => {
            let mut conn = SqliteConnection::open(&config.sqlite_path, config.sqlite_busy_timeout_ms)
                .with_context(|| format!("Failed to open SQLite database {}", config.sqlite_path.display()))?;
            run(&migrator, &mut conn, command, out)
        }
        Backend::Postgres => {
            let mut conn = PostgresConnection::connect(&config.database_url)
                .context("Failed to connect to PostgreSQL")?;
            run(&migrator, &mut conn, command, out)
        }
    }
}

/// Run a database command with an open connection
pub fn run<C: MigrationConnection>(
    migrator: &Migrator,
    conn: &mut C,
    command: &Commands,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        Commands::Status => {
            let status = migrator.status(conn)?;
            write!(out, "{}", render::status(&status))?;
        }
        Commands::Verify => {
            let status = migrator.status(conn)?;
            if !status.is_up_to_date() {
                bail!(
                    "Database is not up to date: {} pending, {} to roll back",
                    status.pending.len(),
                    status.surplus.len()
                );
            }
            writeln!(out, "All {} applied migration(s) verified", status.applied.len())?;
        }
        Commands::Up { dry_run: true } => {
            let status = migrator.status(conn)?;
            write!(out, "{}", render::plan(&status))?;
        }
        Commands::Up { dry_run: false } => {
            let report = migrator.reconcile(conn)?;
            write!(out, "{}", render::report(&report))?;
        }
    }
    Ok(())
}
