//! Migrator - Core migration reconciliation engine

use crate::executor::{MigrationConnection, MigrationTransaction};
use crate::migration::catalog::Catalog;
use crate::migration::ledger::LedgerTable;
use crate::migration::migration::ScriptDirection;
use crate::migration::plan::{Action, Plan, Step};
use crate::migration::record::LedgerRecord;
use crate::migration::source::ScriptSource;
use crate::migration::status::MigrationStatus;
use crate::migration::{LedgerWriteError, MigrationError};
use chrono::Utc;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Stages of one reconciliation run
///
/// `Start → TableEnsured → LedgerLoaded → Verified → {Applying | RollingBack} → Committed`.
/// `Aborted` can follow any stage before `Committed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    TableEnsured,
    LedgerLoaded,
    Verified,
    Applying,
    RollingBack,
    Committed,
    Aborted,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::TableEnsured => "table ensured",
            Stage::LedgerLoaded => "ledger loaded",
            Stage::Verified => "verified",
            Stage::Applying => "applying",
            Stage::RollingBack => "rolling back",
            Stage::Committed => "committed",
            Stage::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Cooperative cancellation for a running reconciliation
///
/// Checked before every step and before commit. Cancelling aborts the run and
/// rolls its transaction back; it never produces a partial commit.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of a committed reconciliation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub action: Action,
    /// Number of already-applied migrations verified against the catalog
    pub verified: usize,
    /// Ids applied, in execution order
    pub applied: Vec<String>,
    /// Ids rolled back, in execution order (newest first)
    pub rolled_back: Vec<String>,
}

impl ReconcileReport {
    /// Whether the run changed the schema
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty() && self.rolled_back.is_empty()
    }

    /// Stage the run is in once every step has executed
    fn stage(&self) -> Stage {
        match self.action {
            Action::Verify => Stage::Verified,
            Action::Forward => Stage::Applying,
            Action::Rollback => Stage::RollingBack,
        }
    }
}

/// Core migration reconciliation engine
///
/// The `Migrator` owns the catalog and the ledger table configuration. Each call
/// to [`reconcile`](Migrator::reconcile) runs in a single transaction: the
/// ledger is read, verified against the catalog, and the missing migrations are
/// applied (or surplus ones rolled back) before one commit.
///
/// # Example
///
/// ```rust,no_run
/// use sluice::backend::sqlite::SqliteConnection;
/// use sluice::migration::{DirectorySource, Migrator};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut conn = SqliteConnection::open("data/live/db/live.db", 30_000)?;
/// let migrator = Migrator::from_source(&DirectorySource::new("migrations"))?;
/// let report = migrator.reconcile(&mut conn)?;
/// println!("applied {} migration(s)", report.applied.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Migrator {
    catalog: Catalog,
    table: LedgerTable,
    cancel: Option<CancelFlag>,
}

impl Migrator {
    /// Create a `Migrator` for an already built catalog using the default ledger table
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            table: LedgerTable::default(),
            cancel: None,
        }
    }

    /// Build the catalog from `source` and create a `Migrator` for it
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Catalog` if the source does not hold a valid catalog.
    pub fn from_source(source: &dyn ScriptSource) -> Result<Self, MigrationError> {
        Ok(Self::new(Catalog::build(source)?))
    }

    /// Use `table` as the ledger table
    #[must_use]
    pub fn with_ledger_table(mut self, table: LedgerTable) -> Self {
        self.table = table;
        self
    }

    /// Abort the run when `flag` is cancelled
    #[must_use]
    pub fn with_cancellation(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn ledger_table(&self) -> &LedgerTable {
        &self.table
    }

    /// Bring the schema in line with the catalog
    ///
    /// # Returns
    ///
    /// Returns a report of what was verified, applied and rolled back. On any
    /// error the transaction is rolled back and the schema and ledger are left as
    /// they were, except after a `MigrationError::Commit`, when the outcome is unknown.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError` if the transaction cannot be opened, the ledger
    /// cannot be read, the history diverged, a script or ledger write fails, the
    /// run is cancelled, or the commit fails.
    pub fn reconcile<C: MigrationConnection>(
        &self,
        conn: &mut C,
    ) -> Result<ReconcileReport, MigrationError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::reconcile_span(self.table.name()).entered();

        let start = Instant::now();
        let mut tx = {
            #[cfg(feature = "tracing")]
            let _span = tracing_helpers::begin_span().entered();

            conn.begin().map_err(MigrationError::Begin)?
        };

        let outcome = self.run(&mut tx).and_then(|report| {
            self.check_cancelled(report.stage())?;
            Ok(report)
        });
        let report = match outcome {
            Ok(report) => report,
            Err(e) => return Err(abort(tx_rollback(tx), e)),
        };

        {
            #[cfg(feature = "tracing")]
            let _span = tracing_helpers::commit_span().entered();

            tx.commit().map_err(MigrationError::Commit)?;
        }
        log::debug!("Migration stage: {}", Stage::Committed);
        log_summary(&report, start);
        Ok(report)
    }

    /// Compute what [`reconcile`](Migrator::reconcile) would do without doing it
    ///
    /// The ledger table is ensured and read inside a transaction that is always
    /// rolled back, so this never changes the database.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError` if the ledger cannot be read or the history diverged.
    pub fn status<C: MigrationConnection>(&self, conn: &mut C) -> Result<MigrationStatus, MigrationError> {
        let mut tx = conn.begin().map_err(MigrationError::Begin)?;

        let result = self.load(&mut tx).and_then(|ledger| {
            let plan = Plan::compute(&self.catalog, &ledger)?;
            Ok(MigrationStatus::from_plan(&self.catalog, &ledger, &plan))
        });

        if let Err(e) = tx.rollback() {
            log::warn!("Failed to roll back status transaction: {e}");
        }
        result
    }

    /// Ensure the ledger table, load it, verify and execute the plan
    fn run<T: MigrationTransaction>(&self, tx: &mut T) -> Result<ReconcileReport, MigrationError> {
        let ledger = self.load(tx)?;

        match ledger.len().cmp(&self.catalog.len()) {
            std::cmp::Ordering::Greater => log::debug!("Going to rollback applied migrations"),
            std::cmp::Ordering::Less => log::debug!("Going to apply new migrations"),
            std::cmp::Ordering::Equal => log::debug!("Going to verify existing migrations"),
        }

        let plan = Plan::compute(&self.catalog, &ledger)?;
        log::debug!("Migration stage: {}", Stage::Verified);

        let mut report = ReconcileReport {
            action: plan.action(),
            verified: plan.verified(),
            applied: Vec::new(),
            rolled_back: Vec::new(),
        };

        if plan.action() == Action::Verify {
            return Ok(report);
        }
        let stage = report.stage();
        log::debug!("Migration stage: {stage}");

        for step in plan.steps() {
            self.check_cancelled(stage)?;
            self.execute_step(tx, step)?;
            match step.direction {
                ScriptDirection::Up => report.applied.push(step.id.to_string()),
                ScriptDirection::Down => report.rolled_back.push(step.id.to_string()),
            }
        }

        Ok(report)
    }

    fn load<T: MigrationTransaction>(&self, tx: &mut T) -> Result<Vec<LedgerRecord>, MigrationError> {
        self.check_cancelled(Stage::Start)?;
        tx.ensure_ledger(&self.table)
            .map_err(|source| MigrationError::Ledger {
                stage: Stage::Start,
                source,
            })?;
        log::debug!("Migration stage: {}", Stage::TableEnsured);

        let mut ledger = tx
            .load_ledger(&self.table)
            .map_err(|source| MigrationError::Ledger {
                stage: Stage::TableEnsured,
                source,
            })?;
        // Byte order, matching the catalog, whatever the database collation
        ledger.sort_by(|a, b| a.id.cmp(&b.id));
        log::debug!(
            "Migration stage: {} ({} applied migration(s))",
            Stage::LedgerLoaded,
            ledger.len()
        );
        Ok(ledger)
    }

    /// Run one script and record its effect in the ledger
    fn execute_step<T: MigrationTransaction>(&self, tx: &mut T, step: &Step<'_>) -> Result<(), MigrationError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::step_span(step.id, step.direction).entered();

        match step.direction {
            ScriptDirection::Up => log::info!("Applying migration: {}", step.id),
            ScriptDirection::Down => log::info!("Rolling back migration: {}", step.id),
        }

        tx.run_script(step.script)
            .map_err(|source| MigrationError::Execution {
                id: step.id.to_string(),
                direction: step.direction,
                source,
            })?;

        let affected = match step.direction {
            ScriptDirection::Up => {
                let record = LedgerRecord::new(step.id, step.script, step.down_script, Utc::now());
                tx.insert_record(&self.table, &record)
            }
            ScriptDirection::Down => tx.delete_record(&self.table, step.id),
        };

        let ledger_error = |source: LedgerWriteError| MigrationError::LedgerWrite {
            id: step.id.to_string(),
            direction: step.direction,
            source,
        };
        match affected {
            Ok(1) => Ok(()),
            Ok(actual) => Err(ledger_error(LedgerWriteError::RowCount { expected: 1, actual })),
            Err(e) => Err(ledger_error(LedgerWriteError::Database(e))),
        }
    }

    fn check_cancelled(&self, stage: Stage) -> Result<(), MigrationError> {
        match &self.cancel {
            Some(flag) if flag.is_cancelled() => Err(MigrationError::Cancelled { stage }),
            _ => Ok(()),
        }
    }
}

/// Reconcile `conn` against the scripts in `source` using the default ledger table
///
/// # Errors
///
/// See [`Migrator::reconcile`]; catalog problems are reported before any
/// transaction is opened.
pub fn reconcile<C: MigrationConnection>(
    source: &dyn ScriptSource,
    conn: &mut C,
) -> Result<ReconcileReport, MigrationError> {
    Migrator::from_source(source)?.reconcile(conn)
}

fn tx_rollback<T: MigrationTransaction>(tx: T) -> Result<(), crate::DbError> {
    #[cfg(feature = "tracing")]
    let _span = tracing_helpers::rollback_span().entered();

    tx.rollback()
}

/// Log the abort and hand back the error that caused it
fn abort(rollback: Result<(), crate::DbError>, error: MigrationError) -> MigrationError {
    log::debug!("Migration stage: {}", Stage::Aborted);
    if let Err(e) = rollback {
        log::warn!("Failed to roll back migration transaction after error: {e}");
    }
    error
}

fn log_summary(report: &ReconcileReport, start: Instant) {
    let elapsed = start.elapsed().as_millis();
    match report.action {
        Action::Forward => log::info!(
            "Applied {} migration(s) in {}ms",
            report.applied.len(),
            elapsed
        ),
        Action::Rollback => log::info!(
            "Rolled back {} migration(s) in {}ms",
            report.rolled_back.len(),
            elapsed
        ),
        Action::Verify => log::debug!("Verified {} migration(s), nothing to apply", report.verified),
    }
}
