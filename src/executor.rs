//! Executor Module
//!
//! Provides the driver-neutral traits the migration engine runs against.
//!
//! A [`MigrationConnection`] opens exactly one [`MigrationTransaction`]. Every
//! statement the engine issues during a reconciliation run (ledger DDL, ledger
//! reads and writes, and the migration scripts themselves) goes through that one
//! transaction, so the whole run is committed or rolled back as a unit.

use crate::migration::ledger::LedgerTable;
use crate::migration::record::LedgerRecord;
use thiserror::Error;

/// Database error type shared by all backends
#[derive(Debug, Error)]
pub enum DbError {
    /// `PostgreSQL` error from `may_postgres`
    #[cfg(feature = "postgres")]
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] may_postgres::Error),
    /// SQLite error from `rusqlite`
    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Statement execution error
    #[error("Query error: {0}")]
    Query(String),
    /// Row parsing/conversion error
    #[error("Decode error: {0}")]
    Decode(String),
    /// Transaction already committed or rolled back
    #[error("Transaction has already been committed or rolled back")]
    TransactionClosed,
    /// Other execution errors
    #[error("Execution error: {0}")]
    Other(String),
}

/// A connection that can open the single transaction a reconciliation run uses
///
/// # Examples
///
/// ```no_run
/// use sluice::backend::sqlite::SqliteConnection;
/// use sluice::executor::{MigrationConnection, MigrationTransaction};
///
/// # fn main() -> Result<(), sluice::DbError> {
/// let mut conn = SqliteConnection::open_in_memory()?;
/// let mut tx = conn.begin()?;
/// tx.run_script("CREATE TABLE users (id INTEGER PRIMARY KEY)")?;
/// tx.commit()?;
/// # Ok(())
/// # }
/// ```
pub trait MigrationConnection {
    /// Transaction handle borrowed from this connection
    type Transaction<'c>: MigrationTransaction
    where
        Self: 'c;

    /// Begin a new transaction
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the backend refuses to start a transaction.
    fn begin(&mut self) -> Result<Self::Transaction<'_>, DbError>;
}

/// Operations available inside one open transaction
///
/// Implementations must roll back when dropped without an explicit
/// [`commit`](MigrationTransaction::commit) or
/// [`rollback`](MigrationTransaction::rollback).
pub trait MigrationTransaction {
    /// Execute a migration script, which may hold several statements
    fn run_script(&mut self, script: &str) -> Result<(), DbError>;

    /// Create the ledger table if it does not exist yet
    fn ensure_ledger(&mut self, table: &LedgerTable) -> Result<(), DbError>;

    /// Load every ledger record ordered ascending by id
    fn load_ledger(&mut self, table: &LedgerTable) -> Result<Vec<LedgerRecord>, DbError>;

    /// Insert one ledger record, returning the number of rows affected
    fn insert_record(&mut self, table: &LedgerTable, record: &LedgerRecord) -> Result<u64, DbError>;

    /// Delete the ledger record with `id`, returning the number of rows affected
    fn delete_record(&mut self, table: &LedgerTable, id: &str) -> Result<u64, DbError>;

    /// Commit the transaction
    fn commit(self) -> Result<(), DbError>
    where
        Self: Sized;

    /// Roll the transaction back, discarding every change made inside it
    fn rollback(self) -> Result<(), DbError>
    where
        Self: Sized;
}
