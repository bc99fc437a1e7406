pub mod alerts;
pub mod finance;
pub mod obligations;

use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::Row;

/// Read a TEXT column holding an ISO date (`YYYY-MM-DD`).
pub(crate) fn date_col(row: &Row, col: &str) -> rusqlite::Result<NaiveDate> {
    let s: String = row.get(col)?;
    NaiveDate::parse_from_str(&s, "%Y-%m-%d")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
}

/// Read a nullable TEXT column holding an ISO date.
pub(crate) fn opt_date_col(row: &Row, col: &str) -> rusqlite::Result<Option<NaiveDate>> {
    let s: Option<String> = row.get(col)?;
    match s {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map(Some)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e))),
    }
}
