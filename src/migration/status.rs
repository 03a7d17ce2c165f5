//! Migration status tracking

use crate::migration::catalog::Catalog;
use crate::migration::plan::{Action, Plan};
use crate::migration::record::LedgerRecord;
use chrono::{DateTime, Utc};

/// One applied migration as shown by `status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    pub id: String,
    pub executed_at: DateTime<Utc>,
}

/// Migration status information
///
/// Produced by `Migrator::status` from a verified plan, so a status only
/// exists when applied history and catalog agree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    /// What a reconciliation would do
    pub action: Action,

    /// Applied migrations that are still defined (from the ledger)
    pub applied: Vec<AppliedMigration>,

    /// Defined migrations not yet applied, in apply order
    pub pending: Vec<String>,

    /// Applied migrations no longer defined, in rollback order
    pub surplus: Vec<String>,

    /// Number of migrations in the catalog
    pub defined_count: usize,
}

impl MigrationStatus {
    pub(crate) fn from_plan(catalog: &Catalog, ledger: &[LedgerRecord], plan: &Plan<'_>) -> Self {
        let applied = ledger
            .iter()
            .take(plan.verified())
            .map(|r| AppliedMigration {
                id: r.id.clone(),
                executed_at: r.executed_at,
            })
            .collect();

        let step_ids = plan.steps().iter().map(|s| s.id.to_string()).collect();
        let (pending, surplus) = match plan.action() {
            Action::Forward => (step_ids, Vec::new()),
            Action::Rollback => (Vec::new(), step_ids),
            Action::Verify => (Vec::new(), Vec::new()),
        };

        Self {
            action: plan.action(),
            applied,
            pending,
            surplus,
            defined_count: catalog.len(),
        }
    }

    /// Check if the schema already matches the catalog
    #[must_use]
    pub fn is_up_to_date(&self) -> bool {
        self.action == Action::Verify
    }

    /// Get the latest applied migration id
    #[must_use]
    pub fn latest_applied(&self) -> Option<&str> {
        self.applied.last().map(|m| m.id.as_str())
    }

    /// Get the next pending migration id
    #[must_use]
    pub fn next_pending(&self) -> Option<&str> {
        self.pending.first().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::migration::MigrationDefinition;

    fn record(id: &str) -> LedgerRecord {
        LedgerRecord::new(id, format!("up {id}"), format!("down {id}"), Utc::now())
    }

    fn catalog(ids: &[&str]) -> Catalog {
        Catalog::from_definitions(
            ids.iter()
                .map(|id| MigrationDefinition::new(*id, format!("up {id}"), format!("down {id}")))
                .collect(),
        )
    }

    #[test]
    fn test_status_with_pending() {
        let catalog = catalog(&["1", "2", "3"]);
        let ledger = vec![record("1")];
        let plan = Plan::compute(&catalog, &ledger).unwrap();

        let status = MigrationStatus::from_plan(&catalog, &ledger, &plan);
        assert!(!status.is_up_to_date());
        assert_eq!(status.latest_applied(), Some("1"));
        assert_eq!(status.next_pending(), Some("2"));
        assert_eq!(status.pending, vec!["2", "3"]);
        assert!(status.surplus.is_empty());
        assert_eq!(status.defined_count, 3);
    }

    #[test]
    fn test_status_with_surplus() {
        let catalog = catalog(&["1"]);
        let ledger = vec![record("1"), record("2"), record("3")];
        let plan = Plan::compute(&catalog, &ledger).unwrap();

        let status = MigrationStatus::from_plan(&catalog, &ledger, &plan);
        assert_eq!(status.action, Action::Rollback);
        assert_eq!(status.applied.len(), 1);
        assert_eq!(status.surplus, vec!["3", "2"]);
        assert_eq!(status.next_pending(), None);
    }

    #[test]
    fn test_status_up_to_date() {
        let catalog = catalog(&["1", "2"]);
        let ledger = vec![record("1"), record("2")];
        let plan = Plan::compute(&catalog, &ledger).unwrap();

        let status = MigrationStatus::from_plan(&catalog, &ledger, &plan);
        assert!(status.is_up_to_date());
        assert_eq!(status.latest_applied(), Some("2"));
    }
}
