//! Column decoding helpers for values stored as TEXT: ids, enums and JSON.

use std::fmt::Display;
use std::str::FromStr;

use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

fn decode_error(column: &str, message: impl Display) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: message.to_string().into(),
    }
}

pub fn get_uuid(row: &SqliteRow, column: &str) -> sqlx::Result<Uuid> {
    let raw: String = row.try_get(column)?;
    Uuid::parse_str(&raw).map_err(|e| decode_error(column, e))
}

pub fn get_opt_uuid(row: &SqliteRow, column: &str) -> sqlx::Result<Option<Uuid>> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|value| Uuid::parse_str(&value).map_err(|e| decode_error(column, e)))
        .transpose()
}

pub fn get_enum<T>(row: &SqliteRow, column: &str) -> sqlx::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|e| decode_error(column, e))
}

pub fn get_opt_enum<T>(row: &SqliteRow, column: &str) -> sqlx::Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|value| value.parse().map_err(|e| decode_error(column, e)))
        .transpose()
}

pub fn get_json(row: &SqliteRow, column: &str) -> sqlx::Result<Option<Value>> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|value| serde_json::from_str(&value).map_err(|e| decode_error(column, e)))
        .transpose()
}

/// Serializes an optional JSON value for a TEXT column.
pub fn json_text(value: Option<&Value>) -> Option<String> {
    value.map(Value::to_string)
}
