//! In-process migration execution helpers

use crate::config::MigrationConfig;
use crate::executor::MigrationConnection;
use crate::migration::{DirectorySource, MigrationError, Migrator, ReconcileReport};

/// Run migrations on application startup
///
/// This function is designed to be called once during application initialization,
/// before serving traffic. It handles:
/// - Catalog discovery (from `config.migrations_dir`)
/// - History verification (applied scripts must not have been edited)
/// - Migration execution (applies new migrations or rolls back removed ones)
/// - Error handling (fails fast; the caller should not start on error)
///
/// Runs are not coordinated between processes. Deployments that start several
/// instances at once must serialize this call externally.
///
/// # Example
///
/// ```rust,no_run
/// use sluice::backend::sqlite::SqliteConnection;
/// use sluice::config::MigrationConfig;
/// use sluice::migration::startup_migrations;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = MigrationConfig::load()?;
///     let mut conn = SqliteConnection::open(&config.sqlite_path, config.sqlite_busy_timeout_ms)?;
///
///     // Run migrations on startup
///     startup_migrations(&mut conn, &config)?;
///
///     // Continue with application startup...
///     Ok(())
/// }
/// ```
pub fn startup_migrations<C: MigrationConnection>(
    conn: &mut C,
    config: &MigrationConfig,
) -> Result<ReconcileReport, MigrationError> {
    let table = config.validate()?;
    let source = DirectorySource::new(&config.migrations_dir);
    let migrator = Migrator::from_source(&source)?.with_ledger_table(table);

    let report = migrator.reconcile(conn)?;

    if report.is_noop() {
        log::debug!("No pending migrations to apply");
    } else {
        log::info!(
            "Startup migrations: {} applied, {} rolled back",
            report.applied.len(),
            report.rolled_back.len()
        );
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryDatabase;
    use crate::migration::LedgerTable;
    use std::fs;

    #[test]
    fn test_startup_migrations_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("1700000000000_users.up.sql"), "CREATE TABLE users").unwrap();
        fs::write(dir.path().join("1700000000000_users.down.sql"), "DROP TABLE users").unwrap();
        fs::write(dir.path().join(".gitkeep"), "").unwrap();

        let config = MigrationConfig {
            migrations_dir: dir.path().to_path_buf(),
            ledger_table: "schema_history".to_string(),
            ..MigrationConfig::default()
        };
        let mut db = MemoryDatabase::new();

        let report = startup_migrations(&mut db, &config).unwrap();
        assert_eq!(report.applied, vec!["1700000000000_users"]);
        assert_eq!(db.tables(), vec!["users"]);
        assert_eq!(db.ledger(&LedgerTable::new("schema_history").unwrap()).len(), 1);

        let again = startup_migrations(&mut db, &config).unwrap();
        assert!(again.is_noop());
    }

    #[test]
    fn test_startup_migrations_rejects_bad_config() {
        let config = MigrationConfig {
            ledger_table: "not valid".to_string(),
            ..MigrationConfig::default()
        };
        let mut db = MemoryDatabase::new();
        assert!(matches!(
            startup_migrations(&mut db, &config),
            Err(MigrationError::Config(_))
        ));
        assert_eq!(db.begins(), 0);
    }
}
