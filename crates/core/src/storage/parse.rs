//! Database value parsing utilities
//!
//! Provides error-safe parsing of stored values.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::Error as SqlError;
use uuid::Uuid;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a UUID from a database string column
pub fn parse_uuid(s: &str) -> Result<Uuid, SqlError> {
    Uuid::parse_str(s).map_err(|e| SqlError::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
}

/// Parse an optional UUID from a database string column
pub fn parse_uuid_opt(s: Option<String>) -> Result<Option<Uuid>, SqlError> {
    s.map(|s| parse_uuid(&s)).transpose()
}

/// Parse a DateTime from an RFC3339 string
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, SqlError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SqlError::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
}

/// Parse an optional DateTime from an RFC3339 string
pub fn parse_datetime_opt(s: Option<String>) -> Result<Option<DateTime<Utc>>, SqlError> {
    s.map(|s| parse_datetime(&s)).transpose()
}

/// Parse a calendar date stored as YYYY-MM-DD
pub fn parse_date(s: &str) -> Result<NaiveDate, SqlError> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| SqlError::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
}

/// Parse an optional calendar date
pub fn parse_date_opt(s: Option<String>) -> Result<Option<NaiveDate>, SqlError> {
    s.map(|s| parse_date(&s)).transpose()
}

/// Parse a stored choice code using the enum's `from_str`
pub fn parse_choice<T>(s: &str, from_str: fn(&str) -> Option<T>) -> Result<T, SqlError> {
    from_str(s).ok_or_else(|| {
        SqlError::FromSqlConversionFailure(0, Type::Text, format!("unknown choice '{}'", s).into())
    })
}

/// Parse a JSON document column
pub fn parse_json(s: &str) -> Result<serde_json::Value, SqlError> {
    serde_json::from_str(s).map_err(|e| SqlError::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
}

/// Fixed-width RFC3339 so stored timestamps sort lexically
pub fn fmt_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Calendar dates are stored as YYYY-MM-DD
pub fn fmt_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Extension trait for converting rusqlite Results to Option
pub trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, SqlError>;
}

impl<T> OptionalExt<T> for Result<T, SqlError> {
    fn optional(self) -> Result<Option<T>, SqlError> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(SqlError::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RoomStatus;

    #[test]
    fn test_datetime_fixed_width_sorts() {
        let a = DateTime::parse_from_rfc3339("2024-01-01T10:00:05Z").unwrap().with_timezone(&Utc);
        let b = DateTime::parse_from_rfc3339("2024-01-01T10:00:05.5Z").unwrap().with_timezone(&Utc);
        assert!(fmt_datetime(&a) < fmt_datetime(&b));
        assert_eq!(parse_datetime(&fmt_datetime(&b)).unwrap(), b);
    }

    #[test]
    fn test_parse_choice() {
        assert_eq!(
            parse_choice("occupied", RoomStatus::from_str).unwrap(),
            RoomStatus::Occupied
        );
        assert!(parse_choice("haunted", RoomStatus::from_str).is_err());
    }

    #[test]
    fn test_parse_date() {
        let d = parse_date("2024-02-29").unwrap();
        assert_eq!(fmt_date(&d), "2024-02-29");
        assert!(parse_date("2023-02-29").is_err());
    }
}
