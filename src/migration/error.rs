//! Migration-specific error types

use crate::executor::DbError;
use crate::migration::checksum::short_checksum;
use crate::migration::migration::ScriptDirection;
use crate::migration::migrator::Stage;
use std::fmt;
use thiserror::Error;

/// Errors raised while building the catalog from a script source
///
/// All of them are fatal: no transaction is opened when the catalog is invalid.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The script source could not be enumerated
    #[error("Failed to list migration scripts in {location}: {source}")]
    List {
        location: String,
        #[source]
        source: std::io::Error,
    },
    /// A script could not be read
    #[error("Failed to read migration script {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },
    /// Only one half of a migration pair exists
    #[error(
        "Migration '{id}' is missing its {missing} script\n\
         Suggestion: add {id}{suffix} next to the existing script",
        suffix = .missing.suffix()
    )]
    IncompletePair {
        id: String,
        missing: ScriptDirection,
    },
    /// The same half of a migration pair was found twice
    #[error("Migration '{id}' has more than one {direction} script")]
    DuplicateScript {
        id: String,
        direction: ScriptDirection,
    },
}

/// Which part of an overlapping migration disagrees
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DivergentField {
    Id,
    UpScript,
    DownScript,
}

impl fmt::Display for DivergentField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DivergentField::Id => f.write_str("id"),
            DivergentField::UpScript => f.write_str("up script"),
            DivergentField::DownScript => f.write_str("down script"),
        }
    }
}

/// Both sides of the first mismatch between ledger and catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Divergence {
    /// Position in both ordered sequences
    pub index: usize,
    /// First field that differs
    pub field: DivergentField,
    /// Id recorded in the ledger
    pub applied_id: String,
    /// Id defined by the catalog
    pub defined_id: String,
    /// Script recorded in the ledger for `field` (empty when `field` is `Id`)
    pub applied_script: String,
    /// Script defined by the catalog for `field` (empty when `field` is `Id`)
    pub defined_script: String,
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.field {
            DivergentField::Id => write!(
                f,
                "Migration history diverged at index {}: applied migration '{}' does not match \
                 defined migration '{}'.\n\
                 Scripts were renamed, removed or inserted before an applied migration.",
                self.index, self.applied_id, self.defined_id
            ),
            field => write!(
                f,
                "Migration '{}' (index {}) has been modified after being applied: {} differs.\n\
                 Applied checksum: {}\n\
                 Current checksum: {}\n\
                 Restore the original script; applied history is never rewritten automatically.",
                self.applied_id,
                self.index,
                field,
                short_checksum(&self.applied_script),
                short_checksum(&self.defined_script)
            ),
        }
    }
}

/// Failure to write a ledger row after its script ran
#[derive(Debug, Error)]
pub enum LedgerWriteError {
    #[error(transparent)]
    Database(#[from] DbError),
    #[error("expected to affect {expected} row, affected {actual} rows")]
    RowCount { expected: u64, actual: u64 },
}

/// Errors returned by a reconciliation run
///
/// Any of these means the run was aborted and its transaction rolled back,
/// except `Commit`, after which the schema state is unknown.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Invalid migration catalog: {0}")]
    Catalog(#[from] CatalogError),
    #[error("Failed to begin migration transaction: {0}")]
    Begin(#[source] DbError),
    /// Ensuring or loading the ledger failed
    #[error("Failed to prepare migration ledger ({stage}): {source}")]
    Ledger {
        stage: Stage,
        #[source]
        source: DbError,
    },
    #[error("{0}")]
    Divergence(Box<Divergence>),
    /// A migration script failed against the schema
    #[error("Migration '{id}' failed while running its {direction} script: {source}")]
    Execution {
        id: String,
        direction: ScriptDirection,
        #[source]
        source: DbError,
    },
    /// The ledger row for a migration could not be written
    #[error("Failed to {action} ledger record for migration '{id}': {source}", action = ledger_action(.direction))]
    LedgerWrite {
        id: String,
        direction: ScriptDirection,
        #[source]
        source: LedgerWriteError,
    },
    #[error(
        "Failed to commit migration transaction: {0}\n\
         The schema state is unknown; inspect the database before retrying."
    )]
    Commit(#[source] DbError),
    #[error("Migration run cancelled during {stage}")]
    Cancelled { stage: Stage },
    #[error("Invalid migration configuration: {0}")]
    Config(String),
}

fn ledger_action(direction: &ScriptDirection) -> &'static str {
    match direction {
        ScriptDirection::Up => "insert",
        ScriptDirection::Down => "delete",
    }
}

impl From<Divergence> for MigrationError {
    fn from(divergence: Divergence) -> Self {
        MigrationError::Divergence(Box::new(divergence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incomplete_pair_names_missing_file() {
        let err = CatalogError::IncompletePair {
            id: "1700000000000_init".to_string(),
            missing: ScriptDirection::Down,
        };
        let msg = err.to_string();
        assert!(msg.contains("missing its down script"), "{msg}");
        assert!(msg.contains("1700000000000_init.down.sql"), "{msg}");
    }

    #[test]
    fn test_divergence_display_shows_checksums() {
        let divergence = Divergence {
            index: 0,
            field: DivergentField::UpScript,
            applied_id: "1700000000_init".to_string(),
            defined_id: "1700000000_init".to_string(),
            applied_script: "CREATE TABLE t".to_string(),
            defined_script: "CREATE TABLE t2".to_string(),
        };
        let msg = MigrationError::from(divergence).to_string();
        assert!(msg.contains("1700000000_init"), "{msg}");
        assert!(msg.contains("up script differs"), "{msg}");
        assert!(msg.contains(&short_checksum("CREATE TABLE t2")), "{msg}");
    }

    #[test]
    fn test_divergence_display_for_id_mismatch() {
        let divergence = Divergence {
            index: 1,
            field: DivergentField::Id,
            applied_id: "2_b".to_string(),
            defined_id: "2_c".to_string(),
            applied_script: String::new(),
            defined_script: String::new(),
        };
        let msg = divergence.to_string();
        assert!(msg.contains("index 1"), "{msg}");
        assert!(msg.contains("'2_b'") && msg.contains("'2_c'"), "{msg}");
    }

    #[test]
    fn test_ledger_write_error_display() {
        let err = MigrationError::LedgerWrite {
            id: "m2".to_string(),
            direction: ScriptDirection::Down,
            source: LedgerWriteError::RowCount { expected: 1, actual: 0 },
        };
        let msg = err.to_string();
        assert!(msg.contains("delete ledger record"), "{msg}");
        assert!(msg.contains("affected 0 rows"), "{msg}");
    }
}
