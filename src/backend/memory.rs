//! In-memory database for testing without a database server
//!
//! `MemoryDatabase` understands just enough SQL to exercise the engine:
//! `CREATE TABLE [IF NOT EXISTS] <name>` and `DROP TABLE [IF EXISTS] <name>`,
//! separated by `;`. Anything else fails as an unsupported statement, which is
//! also the easiest way to make a migration script fail on purpose.
//!
//! Transactions work on a copy of the committed state, so a rollback (or a
//! transaction dropped without commit) leaves the database untouched.

use crate::executor::{DbError, MigrationConnection, MigrationTransaction};
use crate::migration::ledger::LedgerTable;
use crate::migration::record::LedgerRecord;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default)]
struct State {
    tables: BTreeSet<String>,
    /// Ledger tables by name, each keyed by migration id
    ledgers: BTreeMap<String, BTreeMap<String, LedgerRecord>>,
}

/// In-memory stand-in for a SQL database
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    state: State,
    executed: Vec<String>,
    begins: usize,
    commits: usize,
    rollbacks: usize,
    fail_next_begin: bool,
    fail_next_commit: bool,
    ledger_write_rows: Option<u64>,
    reverse_ledger_reads: bool,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts passed to `run_script`, in call order, across all transactions
    pub fn executed(&self) -> Vec<String> {
        self.executed.clone()
    }

    pub fn clear_executed(&mut self) {
        self.executed.clear();
    }

    /// Committed user tables, sorted by name (ledger tables are not included)
    pub fn tables(&self) -> Vec<String> {
        self.state.tables.iter().cloned().collect()
    }

    /// Committed ledger records of `table`, ascending by id
    pub fn ledger(&self, table: &LedgerTable) -> Vec<LedgerRecord> {
        self.state
            .ledgers
            .get(table.name())
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn begins(&self) -> usize {
        self.begins
    }

    pub fn commits(&self) -> usize {
        self.commits
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks
    }

    /// Make the next `begin` fail
    pub fn fail_next_begin(&mut self) {
        self.fail_next_begin = true;
    }

    /// Make the next `commit` fail; nothing from that transaction is kept
    pub fn fail_next_commit(&mut self) {
        self.fail_next_commit = true;
    }

    /// Report `rows` affected for every ledger insert/delete without touching the ledger
    pub fn fail_ledger_writes_with_rows(&mut self, rows: u64) {
        self.ledger_write_rows = Some(rows);
    }

    /// Return ledger rows newest id first from `load_ledger`, like a database
    /// whose collation disagrees with byte order
    pub fn reverse_ledger_reads(&mut self) {
        self.reverse_ledger_reads = true;
    }
}

impl MigrationConnection for MemoryDatabase {
    type Transaction<'c> = MemoryTransaction<'c>;

    fn begin(&mut self) -> Result<MemoryTransaction<'_>, DbError> {
        if std::mem::take(&mut self.fail_next_begin) {
            return Err(DbError::Other("injected begin failure".to_string()));
        }
        self.begins += 1;
        let staged = self.state.clone();
        Ok(MemoryTransaction {
            db: self,
            staged,
            closed: false,
        })
    }
}

/// Transaction over a [`MemoryDatabase`]
#[derive(Debug)]
pub struct MemoryTransaction<'c> {
    db: &'c mut MemoryDatabase,
    staged: State,
    closed: bool,
}

impl MemoryTransaction<'_> {
    fn ledger_mut(&mut self, table: &LedgerTable) -> Result<&mut BTreeMap<String, LedgerRecord>, DbError> {
        self.staged
            .ledgers
            .get_mut(table.name())
            .ok_or_else(|| DbError::Query(format!("no such table: {}", table.name())))
    }

    fn apply(&mut self, statement: &str) -> Result<(), DbError> {
        let tokens: Vec<&str> = statement.split_whitespace().collect();
        let upper: Vec<String> = tokens.iter().map(|t| t.to_ascii_uppercase()).collect();
        let words: Vec<&str> = upper.iter().map(String::as_str).collect();

        match words.as_slice() {
            ["CREATE", "TABLE", "IF", "NOT", "EXISTS", ..] if tokens.len() > 5 => {
                self.staged.tables.insert(table_name(tokens[5]));
                Ok(())
            }
            ["CREATE", "TABLE", ..] if tokens.len() > 2 => {
                let name = table_name(tokens[2]);
                if !self.staged.tables.insert(name.clone()) {
                    return Err(DbError::Query(format!("table {name} already exists")));
                }
                Ok(())
            }
            ["DROP", "TABLE", "IF", "EXISTS", ..] if tokens.len() > 4 => {
                self.staged.tables.remove(&table_name(tokens[4]));
                Ok(())
            }
            ["DROP", "TABLE", ..] if tokens.len() > 2 => {
                let name = table_name(tokens[2]);
                if !self.staged.tables.remove(&name) {
                    return Err(DbError::Query(format!("no such table: {name}")));
                }
                Ok(())
            }
            _ => Err(DbError::Query(format!("unsupported statement: {statement}"))),
        }
    }
}

/// Strip a column list and identifier quotes from a table token
fn table_name(token: &str) -> String {
    let name = token.split('(').next().unwrap_or(token);
    name.trim_matches(|c| c == '"' || c == '`').to_string()
}

impl MigrationTransaction for MemoryTransaction<'_> {
    fn run_script(&mut self, script: &str) -> Result<(), DbError> {
        self.db.executed.push(script.to_string());
        let statements = script
            .split(';')
            .map(|s| {
                s.lines()
                    .filter(|line| !line.trim_start().starts_with("--"))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .filter(|s| !s.trim().is_empty());
        for statement in statements {
            self.apply(statement.trim())?;
        }
        Ok(())
    }

    fn ensure_ledger(&mut self, table: &LedgerTable) -> Result<(), DbError> {
        self.staged.ledgers.entry(table.name().to_string()).or_default();
        Ok(())
    }

    fn load_ledger(&mut self, table: &LedgerTable) -> Result<Vec<LedgerRecord>, DbError> {
        let reverse = self.db.reverse_ledger_reads;
        let mut records: Vec<LedgerRecord> = self.ledger_mut(table)?.values().cloned().collect();
        if reverse {
            records.reverse();
        }
        Ok(records)
    }

    fn insert_record(&mut self, table: &LedgerTable, record: &LedgerRecord) -> Result<u64, DbError> {
        if let Some(rows) = self.db.ledger_write_rows {
            return Ok(rows);
        }
        let ledger = self.ledger_mut(table)?;
        if ledger.contains_key(&record.id) {
            return Err(DbError::Query(format!(
                "UNIQUE constraint failed: {}.id = {}",
                table.name(),
                record.id
            )));
        }
        ledger.insert(record.id.clone(), record.clone());
        Ok(1)
    }

    fn delete_record(&mut self, table: &LedgerTable, id: &str) -> Result<u64, DbError> {
        if let Some(rows) = self.db.ledger_write_rows {
            return Ok(rows);
        }
        Ok(u64::from(self.ledger_mut(table)?.remove(id).is_some()))
    }

    fn commit(mut self) -> Result<(), DbError> {
        self.closed = true;
        if std::mem::take(&mut self.db.fail_next_commit) {
            return Err(DbError::Other("injected commit failure".to_string()));
        }
        self.db.state = std::mem::take(&mut self.staged);
        self.db.commits += 1;
        Ok(())
    }

    fn rollback(mut self) -> Result<(), DbError> {
        self.closed = true;
        self.db.rollbacks += 1;
        Ok(())
    }
}

impl Drop for MemoryTransaction<'_> {
    fn drop(&mut self) {
        if !self.closed {
            self.db.rollbacks += 1;
        }
    }
}
