//! Migration system for Sluice
//!
//! This module reconciles a database schema with an ordered set of SQL
//! migration scripts, including:
//! - Catalog discovery (`<id>.up.sql` / `<id>.down.sql` pairs)
//! - Ledger tracking of applied migrations
//! - History verification (applied scripts must not change)
//! - Forward application and reverse-order rollback in one transaction
//!
//! # Example
//!
//! ```rust,no_run
//! use sluice::backend::sqlite::SqliteConnection;
//! use sluice::migration::{reconcile, MemorySource};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let source = MemorySource::new()
//!     .with_migration(
//!         "1700000000000_create_users",
//!         "CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT NOT NULL UNIQUE);",
//!         "DROP TABLE users;",
//!     );
//!
//! let mut conn = SqliteConnection::open_in_memory()?;
//! let report = reconcile(&source, &mut conn)?;
//! assert_eq!(report.applied, vec!["1700000000000_create_users"]);
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod checksum;
pub mod error;
pub mod ledger;
pub mod migration;
pub mod migrator;
pub mod plan;
pub mod record;
pub mod source;
pub mod startup;
pub mod status;

pub use catalog::Catalog;
pub use error::{CatalogError, Divergence, DivergentField, LedgerWriteError, MigrationError};
pub use ledger::{LedgerTable, SqlDialect};
pub use migration::{MigrationDefinition, ScriptDirection};
pub use migrator::{reconcile, CancelFlag, Migrator, ReconcileReport, Stage};
pub use plan::{Action, Plan, Step};
pub use record::LedgerRecord;
pub use source::{DirectorySource, EntryKind, MemorySource, ScriptEntry, ScriptSource};
pub use startup::startup_migrations;
pub use status::{AppliedMigration, MigrationStatus};
