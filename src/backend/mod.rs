//! Database backends
//!
//! Each backend implements [`MigrationConnection`](crate::executor::MigrationConnection)
//! for one driver. The ledger SQL is shared through
//! [`LedgerTable`](crate::migration::LedgerTable); backends only choose the dialect.

#[cfg(any(test, feature = "mock"))]
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;
