//! `LedgerRecord` - Represents rows of the migration ledger table

use crate::executor::DbError;
use chrono::{DateTime, SecondsFormat, Utc};

/// One applied migration, as it was at the moment it was applied
///
/// The scripts are stored verbatim rather than re-derived from the catalog, so
/// that a later edit to an already-applied script file shows up as drift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRecord {
    /// Migration id (sortable, e.g. `1700000000000_create_users`)
    pub id: String,

    /// Forward script content at apply time
    pub up_statement: String,

    /// Backward script content at apply time
    pub down_statement: String,

    /// When the migration was applied
    pub executed_at: DateTime<Utc>,
}

impl LedgerRecord {
    /// Create a new `LedgerRecord`
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        up_statement: impl Into<String>,
        down_statement: impl Into<String>,
        executed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            up_statement: up_statement.into(),
            down_statement: down_statement.into(),
            executed_at,
        }
    }

    /// `executed_at` in the text form stored in the ledger table
    ///
    /// ISO-8601 in UTC with millisecond precision, e.g. `2024-01-20T12:00:00.000Z`.
    #[must_use]
    pub fn executed_at_text(&self) -> String {
        self.executed_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Build a `LedgerRecord` from the four text columns of a ledger row
    ///
    /// Expected column order: `id`, `up_statement`, `down_statement`, `executed_at`
    ///
    /// # Errors
    ///
    /// Returns `DbError::Decode` if `executed_at` is not a recognized timestamp.
    pub fn from_columns(
        id: String,
        up_statement: String,
        down_statement: String,
        executed_at: &str,
    ) -> Result<Self, DbError> {
        let executed_at = parse_timestamp(executed_at)?;
        Ok(Self {
            id,
            up_statement,
            down_statement,
            executed_at,
        })
    }
}

/// Parse a stored timestamp
///
/// RFC 3339 is what this crate writes; the naive forms cover rows written by hand
/// or by other tools that used `CURRENT_TIMESTAMP`.
fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, DbError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Ok(parsed.with_timezone(&Utc));
    }

    for format in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
    ] {
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(text, format) {
            return Ok(naive.and_utc());
        }
    }

    Err(DbError::Decode(format!(
        "Failed to parse timestamp '{text}': unrecognized format"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_executed_at_text_is_iso8601_utc() {
        let at = Utc.with_ymd_and_hms(2024, 1, 20, 12, 0, 0).unwrap();
        let record = LedgerRecord::new("1705752000000_init", "CREATE TABLE a", "DROP TABLE a", at);
        assert_eq!(record.executed_at_text(), "2024-01-20T12:00:00.000Z");
    }

    #[test]
    fn test_from_columns_reads_back_written_text() {
        let at = Utc.with_ymd_and_hms(2024, 1, 20, 12, 0, 0).unwrap();
        let record = LedgerRecord::new("1705752000000_init", "up", "down", at);
        let parsed = LedgerRecord::from_columns(
            record.id.clone(),
            record.up_statement.clone(),
            record.down_statement.clone(),
            &record.executed_at_text(),
        )
        .unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_from_columns_accepts_naive_timestamps() {
        let parsed =
            LedgerRecord::from_columns("a".into(), "u".into(), "d".into(), "2024-01-20 12:00:00")
                .unwrap();
        assert_eq!(parsed.executed_at, Utc.with_ymd_and_hms(2024, 1, 20, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_from_columns_rejects_garbage() {
        let err = LedgerRecord::from_columns("a".into(), "u".into(), "d".into(), "yesterday")
            .unwrap_err();
        assert!(matches!(err, DbError::Decode(_)));
        assert!(err.to_string().contains("yesterday"));
    }
}
