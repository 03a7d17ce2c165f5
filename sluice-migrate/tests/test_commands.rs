//! Tests for the CLI command handlers against in-memory SQLite

use clap::Parser;
use sluice::backend::sqlite::SqliteConnection;
use sluice::migration::{MemorySource, Migrator};
use sluice::{Backend, MigrationConfig};
use sluice_migrate::cli::{Cli, Commands};
use sluice_migrate::commands::{execute, run};
use std::fs;

fn migrator(source: &MemorySource) -> Migrator {
    Migrator::from_source(source).unwrap()
}

fn two_tables() -> MemorySource {
    MemorySource::new()
        .with_migration("m1", "CREATE TABLE a (id INTEGER);", "DROP TABLE a;")
        .with_migration("m2", "CREATE TABLE b (id INTEGER);", "DROP TABLE b;")
}

fn output(migrator: &Migrator, conn: &mut SqliteConnection, command: Commands) -> String {
    colored::control::set_override(false);
    let mut out = Vec::new();
    run(migrator, conn, &command, &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn test_status_lists_pending() {
    let mut conn = SqliteConnection::open_in_memory().unwrap();
    let text = output(&migrator(&two_tables()), &mut conn, Commands::Status);

    assert!(text.contains("Applied Migrations: None"), "{text}");
    assert!(text.contains("Pending Migrations (2)"), "{text}");
    assert!(text.contains("m1 (pending)"), "{text}");
    assert!(text.contains("0 applied, 2 pending, 0 to roll back (2 defined)"), "{text}");
}

#[test]
fn test_up_dry_run_does_not_apply() {
    let mut conn = SqliteConnection::open_in_memory().unwrap();
    let migrator = migrator(&two_tables());

    let text = output(&migrator, &mut conn, Commands::Up { dry_run: true });
    assert!(text.contains("Would apply 2 migration(s)"), "{text}");
    assert!(text.contains("1. m1"), "{text}");

    let status = migrator.status(&mut conn).unwrap();
    assert_eq!(status.pending, vec!["m1", "m2"]);
}

#[test]
fn test_up_then_verify() {
    let mut conn = SqliteConnection::open_in_memory().unwrap();
    let migrator = migrator(&two_tables());

    let text = output(&migrator, &mut conn, Commands::Up { dry_run: false });
    assert!(text.contains("Successfully applied 2 migration(s): m1, m2"), "{text}");

    let text = output(&migrator, &mut conn, Commands::Verify);
    assert!(text.contains("All 2 applied migration(s) verified"), "{text}");

    let text = output(&migrator, &mut conn, Commands::Up { dry_run: true });
    assert!(text.contains("No pending migrations"), "{text}");
}

#[test]
fn test_verify_fails_when_pending() {
    let mut conn = SqliteConnection::open_in_memory().unwrap();
    let mut out = Vec::new();
    let err = run(&migrator(&two_tables()), &mut conn, &Commands::Verify, &mut out).unwrap_err();
    assert!(err.to_string().contains("2 pending"), "{err}");
}

#[test]
fn test_dry_run_shows_rollback() {
    let mut conn = SqliteConnection::open_in_memory().unwrap();
    output(&migrator(&two_tables()), &mut conn, Commands::Up { dry_run: false });

    let reduced = migrator(&MemorySource::new().with_migration(
        "m1",
        "CREATE TABLE a (id INTEGER);",
        "DROP TABLE a;",
    ));
    let text = output(&reduced, &mut conn, Commands::Up { dry_run: true });
    assert!(text.contains("Would roll back 1 migration(s)"), "{text}");

    let text = output(&reduced, &mut conn, Commands::Status);
    assert!(text.contains("m2 (no longer defined)"), "{text}");
}

#[test]
fn test_execute_against_sqlite_file() {
    let dir = tempfile::tempdir().unwrap();
    let migrations = dir.path().join("migrations");
    fs::create_dir_all(&migrations).unwrap();
    fs::write(migrations.join("1_a.up.sql"), "CREATE TABLE a (id INTEGER);").unwrap();
    fs::write(migrations.join("1_a.down.sql"), "DROP TABLE a;").unwrap();

    let config = MigrationConfig {
        backend: Backend::Sqlite,
        sqlite_path: dir.path().join("db/test.db"),
        migrations_dir: migrations,
        ..MigrationConfig::default()
    };

    colored::control::set_override(false);
    let mut out = Vec::new();
    execute(&config, &Commands::Up { dry_run: false }, &mut out).unwrap();
    assert!(String::from_utf8(out).unwrap().contains("applied 1 migration(s): 1_a"));

    let mut out = Vec::new();
    execute(&config, &Commands::Verify, &mut out).unwrap();
}

#[test]
fn test_cli_overrides() {
    let cli = Cli::try_parse_from([
        "sluice-migrate",
        "--database-url",
        "postgres://localhost/app",
        "--ledger-table",
        "schema_history",
        "-v",
        "up",
        "--dry-run",
    ])
    .unwrap();

    assert_eq!(cli.command, Commands::Up { dry_run: true });
    assert_eq!(cli.log_filter(), "debug");

    let config = cli.apply_overrides(MigrationConfig::default());
    assert_eq!(config.backend, Backend::Postgres);
    assert_eq!(config.database_url, "postgres://localhost/app");
    assert_eq!(config.ledger_table, "schema_history");
}

#[test]
fn test_cli_explicit_backend_wins() {
    let cli = Cli::try_parse_from([
        "sluice-migrate",
        "--backend",
        "sqlite",
        "--database-url",
        "postgres://localhost/app",
        "--sqlite-path",
        "tmp/app.db",
        "status",
    ])
    .unwrap();

    let config = cli.apply_overrides(MigrationConfig::default());
    assert_eq!(config.backend, Backend::Sqlite);
    assert_eq!(config.sqlite_path, std::path::PathBuf::from("tmp/app.db"));
    assert!(Cli::try_parse_from(["sluice-migrate", "--backend", "mysql", "status"]).is_err());
    assert!(Cli::try_parse_from(["sluice-migrate", "-v", "-q", "status"]).is_err());
}
