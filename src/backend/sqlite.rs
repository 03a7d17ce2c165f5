//! SQLite backend using `rusqlite`

use crate::executor::{DbError, MigrationConnection, MigrationTransaction};
use crate::migration::ledger::{LedgerTable, SqlDialect};
use crate::migration::record::LedgerRecord;
use rusqlite::{params_from_iter, Connection, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

/// SQLite connection the migration engine can run against
///
/// Opened databases use WAL journaling, enforce foreign keys and wait up to
/// the configured busy timeout for locks held by other connections.
#[derive(Debug)]
pub struct SqliteConnection {
    conn: Connection,
}

impl SqliteConnection {
    /// Open (or create) the database file at `path`
    ///
    /// Missing parent directories are created first.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the directory cannot be created, the file cannot be
    /// opened, or a pragma is rejected.
    pub fn open(path: impl AsRef<Path>, busy_timeout_ms: u64) -> Result<Self, DbError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DbError::Other(format!("Failed to create directory {}: {}", parent.display(), e))
            })?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_millis(busy_timeout_ms))?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.pragma_update(None, "foreign_keys", true)?;
        log::debug!("Opened SQLite database {} (journal_mode={})", path.display(), mode);

        Ok(Self { conn })
    }

    /// Open a private in-memory database
    ///
    /// # Errors
    ///
    /// Returns `DbError` if SQLite cannot allocate the database.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(Self { conn })
    }

    /// Wrap an already configured connection
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// The underlying `rusqlite` connection
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl MigrationConnection for SqliteConnection {
    type Transaction<'c> = SqliteTransaction<'c>;

    fn begin(&mut self) -> Result<SqliteTransaction<'_>, DbError> {
        // IMMEDIATE takes the write lock up front so the ledger read and the
        // writes that follow it see the same state.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(SqliteTransaction { tx })
    }
}

/// Open SQLite transaction; rolled back on drop unless committed
#[derive(Debug)]
pub struct SqliteTransaction<'c> {
    tx: Transaction<'c>,
}

impl MigrationTransaction for SqliteTransaction<'_> {
    fn run_script(&mut self, script: &str) -> Result<(), DbError> {
        self.tx.execute_batch(script)?;
        Ok(())
    }

    fn ensure_ledger(&mut self, table: &LedgerTable) -> Result<(), DbError> {
        self.tx.execute_batch(&table.create_sql(SqlDialect::Sqlite))?;
        Ok(())
    }

    fn load_ledger(&mut self, table: &LedgerTable) -> Result<Vec<LedgerRecord>, DbError> {
        let sql = table.select_sql(SqlDialect::Sqlite);
        let mut stmt = self.tx.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, up, down, executed_at)| LedgerRecord::from_columns(id, up, down, &executed_at))
            .collect()
    }

    fn insert_record(&mut self, table: &LedgerTable, record: &LedgerRecord) -> Result<u64, DbError> {
        let stmt = table.insert_statement(SqlDialect::Sqlite, record)?;
        let affected = self.tx.execute(&stmt.sql, params_from_iter(stmt.params.iter()))?;
        Ok(affected as u64)
    }

    fn delete_record(&mut self, table: &LedgerTable, id: &str) -> Result<u64, DbError> {
        let stmt = table.delete_statement(SqlDialect::Sqlite, id)?;
        let affected = self.tx.execute(&stmt.sql, params_from_iter(stmt.params.iter()))?;
        Ok(affected as u64)
    }

    fn commit(self) -> Result<(), DbError> {
        self.tx.commit()?;
        Ok(())
    }

    fn rollback(self) -> Result<(), DbError> {
        self.tx.rollback()?;
        Ok(())
    }
}
