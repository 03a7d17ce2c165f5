//! # Sluice
//!
//! Transactional schema migration reconciliation for PostgreSQL and SQLite.
//!
//! Migrations are pairs of SQL scripts (`<id>.up.sql` / `<id>.down.sql`).
//! Every applied migration is recorded in a ledger table together with the
//! exact scripts that ran. On each run the ledger is verified against the
//! current catalog, then the missing migrations are applied or the surplus ones
//! rolled back, all inside a single transaction.
//!
//! See [`migration`] for the engine and [`backend`] for the database drivers.

pub mod backend;
pub mod config;
pub mod executor;
pub mod metrics;
pub mod migration;

pub use config::{Backend, MigrationConfig};
pub use executor::{DbError, MigrationConnection, MigrationTransaction};
pub use migration::{reconcile, MigrationError, Migrator, ReconcileReport};
