//! Ledger table management
//!
//! The ledger is the table recording which migrations are applied. Its SQL is
//! generated with `sea-query` so the PostgreSQL and SQLite backends share one
//! definition and differ only in placeholder and quoting style.

use crate::executor::DbError;
use crate::migration::record::LedgerRecord;
use crate::migration::MigrationError;
use once_cell::sync::Lazy;
use regex::Regex;
use sea_query::{
    ColumnDef, DynIden, Expr, ExprTrait, Order, PostgresQueryBuilder, Query, SqliteQueryBuilder,
    Table, Value, Values,
};

static TABLE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap()
});

/// Column order used by every ledger statement
const COLUMNS: [&str; 4] = ["id", "up_statement", "down_statement", "executed_at"];

/// SQL flavour a backend speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    /// `$1` placeholders
    Postgres,
    /// `?` placeholders
    Sqlite,
}

/// A parameterized ledger statement
///
/// Every ledger parameter is text, so backends bind `params` positionally as strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerStatement {
    pub sql: String,
    pub params: Vec<String>,
}

/// Name of the ledger table, validated as a plain SQL identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerTable {
    name: String,
}

impl Default for LedgerTable {
    fn default() -> Self {
        Self {
            name: Self::DEFAULT_NAME.to_string(),
        }
    }
}

impl LedgerTable {
    /// Table name used when none is configured
    pub const DEFAULT_NAME: &'static str = "migration";

    /// Create a `LedgerTable` for `name`
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Config` unless `name` is a letter or underscore
    /// followed by letters, digits or underscores.
    pub fn new(name: impl Into<String>) -> Result<Self, MigrationError> {
        let name = name.into();
        if !TABLE_NAME.is_match(&name) {
            return Err(MigrationError::Config(format!(
                "Invalid ledger table name '{name}': expected an unquoted SQL identifier"
            )));
        }
        Ok(Self { name })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn iden(&self) -> DynIden {
        DynIden::from(self.name.clone())
    }

    /// `CREATE TABLE IF NOT EXISTS` for the ledger
    pub fn create_sql(&self, dialect: SqlDialect) -> String {
        let table = Table::create()
            .table(self.iden())
            .if_not_exists()
            .col(ColumnDef::new("id").text().not_null().primary_key())
            .col(ColumnDef::new("up_statement").text().not_null())
            .col(ColumnDef::new("down_statement").text().not_null())
            .col(ColumnDef::new("executed_at").text().not_null())
            .to_owned();

        match dialect {
            SqlDialect::Postgres => table.build(PostgresQueryBuilder),
            SqlDialect::Sqlite => table.build(SqliteQueryBuilder),
        }
    }

    /// Select every record ordered ascending by id
    ///
    /// Columns come back in the order `LedgerRecord::from_columns` expects.
    pub fn select_sql(&self, dialect: SqlDialect) -> String {
        let select = Query::select()
            .columns(COLUMNS)
            .from(self.iden())
            .order_by("id", Order::Asc)
            .to_owned();

        match dialect {
            SqlDialect::Postgres => select.to_string(PostgresQueryBuilder),
            SqlDialect::Sqlite => select.to_string(SqliteQueryBuilder),
        }
    }

    /// Insert `record` as one row
    ///
    /// # Errors
    ///
    /// Returns `DbError::Query` if the statement cannot be built.
    pub fn insert_statement(
        &self,
        dialect: SqlDialect,
        record: &LedgerRecord,
    ) -> Result<LedgerStatement, DbError> {
        let insert = Query::insert()
            .into_table(self.iden())
            .columns(COLUMNS)
            .values([
                record.id.clone().into(),
                record.up_statement.clone().into(),
                record.down_statement.clone().into(),
                record.executed_at_text().into(),
            ])
            .map_err(|e| DbError::Query(format!("Failed to build ledger insert: {e}")))?
            .to_owned();

        let (sql, values) = match dialect {
            SqlDialect::Postgres => insert.build(PostgresQueryBuilder),
            SqlDialect::Sqlite => insert.build(SqliteQueryBuilder),
        };
        Ok(LedgerStatement {
            sql,
            params: text_params(&values)?,
        })
    }

    /// Delete the row for migration `id`
    ///
    /// # Errors
    ///
    /// Returns `DbError::Query` if the statement cannot be built.
    pub fn delete_statement(&self, dialect: SqlDialect, id: &str) -> Result<LedgerStatement, DbError> {
        let delete = Query::delete()
            .from_table(self.iden())
            .and_where(Expr::col("id").eq(id.to_string()))
            .to_owned();

        let (sql, values) = match dialect {
            SqlDialect::Postgres => delete.build(PostgresQueryBuilder),
            SqlDialect::Sqlite => delete.build(SqliteQueryBuilder),
        };
        Ok(LedgerStatement {
            sql,
            params: text_params(&values)?,
        })
    }
}

fn text_params(values: &Values) -> Result<Vec<String>, DbError> {
    values
        .iter()
        .map(|value| match value {
            Value::String(Some(s)) => Ok(s.to_string()),
            other => Err(DbError::Query(format!(
                "Unexpected non-text ledger parameter: {other:?}"
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record() -> LedgerRecord {
        LedgerRecord::new(
            "1700000000000_init",
            "CREATE TABLE t (id INTEGER)",
            "DROP TABLE t",
            Utc.with_ymd_and_hms(2023, 11, 14, 22, 13, 20).unwrap(),
        )
    }

    #[test]
    fn test_default_name() {
        assert_eq!(LedgerTable::default().name(), "migration");
    }

    #[test]
    fn test_rejects_invalid_names() {
        for name in ["", "1migration", "migration; DROP TABLE users", "schema.migration", "mig-ration"] {
            let err = LedgerTable::new(name).unwrap_err();
            assert!(matches!(err, MigrationError::Config(_)), "{name} should be rejected");
        }
        assert!(LedgerTable::new("_schema_migrations2").is_ok());
    }

    #[test]
    fn test_create_sql_is_idempotent_ddl() {
        let table = LedgerTable::new("schema_ledger").unwrap();
        for dialect in [SqlDialect::Postgres, SqlDialect::Sqlite] {
            let sql = table.create_sql(dialect);
            assert!(sql.contains("IF NOT EXISTS"), "{sql}");
            assert!(sql.contains("schema_ledger"), "{sql}");
            for column in COLUMNS {
                assert!(sql.contains(column), "{sql} missing {column}");
            }
        }
    }

    #[test]
    fn test_select_sql_orders_by_id() {
        let sql = LedgerTable::default().select_sql(SqlDialect::Sqlite);
        assert!(sql.starts_with("SELECT"), "{sql}");
        assert!(sql.contains(r#"ORDER BY "id" ASC"#), "{sql}");
    }

    #[test]
    fn test_insert_statement_params_follow_column_order() {
        let record = record();
        let stmt = LedgerTable::default()
            .insert_statement(SqlDialect::Postgres, &record)
            .unwrap();
        assert!(stmt.sql.contains("$4"), "{}", stmt.sql);
        assert_eq!(
            stmt.params,
            vec![
                record.id.clone(),
                record.up_statement.clone(),
                record.down_statement.clone(),
                "2023-11-14T22:13:20.000Z".to_string(),
            ]
        );
    }

    #[test]
    fn test_delete_statement_placeholders_per_dialect() {
        let table = LedgerTable::default();
        let pg = table.delete_statement(SqlDialect::Postgres, "m1").unwrap();
        assert!(pg.sql.contains("$1"), "{}", pg.sql);
        assert_eq!(pg.params, vec!["m1".to_string()]);

        let lite = table.delete_statement(SqlDialect::Sqlite, "m1").unwrap();
        assert!(lite.sql.contains('?'), "{}", lite.sql);
        assert_eq!(lite.params, vec!["m1".to_string()]);
    }
}
