//! Database value parsing utilities
//!
//! Provides error-safe parsing of stored values.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Error as SqlError;
use uuid::Uuid;

use crate::models::{ProfileStatus, Role};

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

/// Convert a stored u8 to Role. Unknown values fall back to the least
/// privileged role.
pub fn role_from_u8(value: u8) -> Role {
    match value {
        3 => Role::Admin,
        2 => Role::Manager,
        _ => Role::Driver,
    }
}

pub fn parse_status(s: &str) -> Result<ProfileStatus, SqlError> {
    s.parse()
        .map_err(|e: crate::Error| SqlError::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
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
