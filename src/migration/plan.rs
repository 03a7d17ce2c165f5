//! Reconciliation planning
//!
//! Compares the ordered catalog with the ordered ledger. The ledger must be a
//! prefix-compatible view of the catalog: over the overlapping range both sides
//! agree on id and on both scripts. Past the overlap either the catalog has new
//! migrations to apply (oldest first) or the ledger has migrations the catalog
//! no longer defines, which are rolled back newest first.

use crate::migration::catalog::Catalog;
use crate::migration::error::{Divergence, DivergentField};
use crate::migration::migration::ScriptDirection;
use crate::migration::record::LedgerRecord;
use std::fmt;

/// What a reconciliation run will do to the schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Ledger and catalog have the same length; nothing to run
    Verify,
    /// The catalog defines migrations past the end of the ledger
    Forward,
    /// The ledger holds migrations past the end of the catalog
    Rollback,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Verify => f.write_str("verify"),
            Action::Forward => f.write_str("forward"),
            Action::Rollback => f.write_str("rollback"),
        }
    }
}

/// One script to run, with the ledger change that follows it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step<'a> {
    pub id: &'a str,
    pub direction: ScriptDirection,
    /// `up_script` of the catalog entry, or `down_statement` of the ledger record
    pub script: &'a str,
    /// Down script stored alongside the record when `direction` is `Up`
    pub down_script: &'a str,
}

/// Verified plan for one reconciliation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan<'a> {
    action: Action,
    verified: usize,
    steps: Vec<Step<'a>>,
}

impl<'a> Plan<'a> {
    /// Verify the overlap of `catalog` and `ledger` and classify the work left
    ///
    /// `ledger` must be ordered ascending by id, as the ledger reader returns it.
    ///
    /// # Errors
    ///
    /// Returns the first [`Divergence`] found in the overlapping range. Nothing
    /// past that index is examined.
    pub fn compute(catalog: &'a Catalog, ledger: &'a [LedgerRecord]) -> Result<Self, Divergence> {
        let defined = catalog.definitions();
        let overlap = defined.len().min(ledger.len());

        for (index, (applied, definition)) in ledger.iter().zip(defined).enumerate() {
            let field = if applied.id != definition.id {
                Some(DivergentField::Id)
            } else if applied.up_statement != definition.up_script {
                Some(DivergentField::UpScript)
            } else if applied.down_statement != definition.down_script {
                Some(DivergentField::DownScript)
            } else {
                None
            };

            if let Some(field) = field {
                let (applied_script, defined_script) = match field {
                    DivergentField::Id => (String::new(), String::new()),
                    DivergentField::UpScript => {
                        (applied.up_statement.clone(), definition.up_script.clone())
                    }
                    DivergentField::DownScript => {
                        (applied.down_statement.clone(), definition.down_script.clone())
                    }
                };
                return Err(Divergence {
                    index,
                    field,
                    applied_id: applied.id.clone(),
                    defined_id: definition.id.clone(),
                    applied_script,
                    defined_script,
                });
            }
            log::debug!("Verified migration: {}", applied.id);
        }

        let (action, steps) = if ledger.len() < defined.len() {
            let steps = defined[overlap..]
                .iter()
                .map(|d| Step {
                    id: &d.id,
                    direction: ScriptDirection::Up,
                    script: &d.up_script,
                    down_script: &d.down_script,
                })
                .collect();
            (Action::Forward, steps)
        } else if ledger.len() > defined.len() {
            let steps = ledger[overlap..]
                .iter()
                .rev()
                .map(|r| Step {
                    id: &r.id,
                    direction: ScriptDirection::Down,
                    script: &r.down_statement,
                    down_script: &r.down_statement,
                })
                .collect();
            (Action::Rollback, steps)
        } else {
            (Action::Verify, Vec::new())
        };

        Ok(Self {
            action,
            verified: overlap,
            steps,
        })
    }

    pub fn action(&self) -> Action {
        self.action
    }

    /// Number of overlapping migrations that were verified
    pub fn verified(&self) -> usize {
        self.verified
    }

    /// Steps in execution order
    pub fn steps(&self) -> &[Step<'a>] {
        &self.steps
    }

    pub fn is_noop(&self) -> bool {
        self.steps.is_empty()
    }
}
