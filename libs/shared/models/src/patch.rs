//! Partial-update fields for nullable columns.
//!
//! A field declared as `Option<Option<T>>` with
//! `#[serde(default, deserialize_with = "nullable")]` reads as:
//! absent -> `None` (leave unchanged), `null` -> `Some(None)` (clear),
//! value -> `Some(Some(value))` (set).

use serde::{Deserialize, Deserializer};

pub fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
