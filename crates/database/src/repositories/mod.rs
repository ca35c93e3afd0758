pub mod users;
pub mod roles;
pub mod groups;
pub mod equipment;
pub mod logbook;
pub mod audit;

use crate::error::{DatabaseError, Result};
use crate::store::{from_row, Row};
use serde::de::DeserializeOwned;

/// First returned row, or `NotFound` for `entity`/`id`.
pub(crate) fn first_or_not_found<T: DeserializeOwned>(
    rows: Vec<Row>,
    entity: &str,
    id: &str,
) -> Result<T> {
    rows.into_iter()
        .next()
        .map(from_row)
        .transpose()?
        .ok_or_else(|| DatabaseError::not_found(entity, id))
}

pub(crate) fn take_array(row: &mut Row, key: &str) -> Vec<Row> {
    match row.remove(key) {
        Some(serde_json::Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                serde_json::Value::Object(map) => Some(map),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

pub(crate) fn take_object(row: &mut Row, key: &str) -> Option<Row> {
    match row.remove(key) {
        Some(serde_json::Value::Object(map)) => Some(map),
        _ => None,
    }
}
