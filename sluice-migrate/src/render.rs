//! Terminal output for the CLI commands

use colored::Colorize;
use sluice::migration::{Action, MigrationStatus};
use sluice::ReconcileReport;

/// Full status listing for `status`
pub fn status(status: &MigrationStatus) -> String {
    let mut out = format!("\n{}\n\n", "📊 Migration Status".bold());

    if status.applied.is_empty() {
        out.push_str("✅ Applied Migrations: None\n");
    } else {
        out.push_str(&format!("✅ Applied Migrations ({}):\n", status.applied.len()));
        for applied in &status.applied {
            out.push_str(&format!(
                "  {} {} ({})\n",
                "✓".green(),
                applied.id,
                applied.executed_at.format("%Y-%m-%d %H:%M:%S")
            ));
        }
    }

    if status.pending.is_empty() {
        out.push_str("⏳ Pending Migrations: None\n");
    } else {
        out.push_str(&format!("⏳ Pending Migrations ({}):\n", status.pending.len()));
        for id in &status.pending {
            out.push_str(&format!("  {} {} (pending)\n", "⏳".yellow(), id));
        }
    }

    if !status.surplus.is_empty() {
        out.push_str(&format!("↩️  To Roll Back ({}):\n", status.surplus.len()));
        for id in &status.surplus {
            out.push_str(&format!("  {} {} (no longer defined)\n", "↩".red(), id));
        }
    }

    out.push_str(&format!(
        "\n📈 Summary: {} applied, {} pending, {} to roll back ({} defined)\n",
        status.applied.len(),
        status.pending.len(),
        status.surplus.len(),
        status.defined_count
    ));
    out
}

/// What `up` would do, for `up --dry-run`
pub fn plan(status: &MigrationStatus) -> String {
    let (verb, ids) = match status.action {
        Action::Verify => return "No pending migrations to apply\n".to_string(),
        Action::Forward => ("apply", &status.pending),
        Action::Rollback => ("roll back", &status.surplus),
    };

    let mut out = format!("Would {} {} migration(s):\n", verb, ids.len());
    for (i, id) in ids.iter().enumerate() {
        out.push_str(&format!("  {}. {}\n", i + 1, id));
    }
    out
}

/// Result of a committed `up`
pub fn report(report: &ReconcileReport) -> String {
    match report.action {
        Action::Verify => format!(
            "{} No migrations to apply ({} verified)\n",
            "✅".green(),
            report.verified
        ),
        Action::Forward => format!(
            "{} Successfully applied {} migration(s): {}\n",
            "✅".green(),
            report.applied.len(),
            report.applied.join(", ")
        ),
        Action::Rollback => format!(
            "{} Successfully rolled back {} migration(s): {}\n",
            "✅".green(),
            report.rolled_back.len(),
            report.rolled_back.join(", ")
        ),
    }
}
