//! Observability helpers
//!
//! With the `tracing` feature enabled the engine opens a span per reconciliation
//! run, per transaction boundary and per migration script. Subscribers are the
//! application's concern; without one the spans cost nothing.

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use crate::migration::ScriptDirection;
    use tracing::{debug_span, info_span, Span};

    /// Span covering one whole reconciliation run
    pub fn reconcile_span(ledger_table: &str) -> Span {
        info_span!("sluice.reconcile", ledger_table = %ledger_table)
    }

    pub fn begin_span() -> Span {
        debug_span!("sluice.begin")
    }

    pub fn commit_span() -> Span {
        debug_span!("sluice.commit")
    }

    pub fn rollback_span() -> Span {
        debug_span!("sluice.rollback")
    }

    /// Span around a single migration script and its ledger write
    pub fn step_span(id: &str, direction: ScriptDirection) -> Span {
        info_span!("sluice.migration", migration.id = %id, direction = %direction)
    }

}
