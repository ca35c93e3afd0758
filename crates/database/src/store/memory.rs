use super::{
    require_filters, validate_row, Cardinality, Embed, EntityStore, Filter, KeyKind, Query, Row,
    Table,
};
use crate::error::{DatabaseError, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

#[derive(Default)]
struct State {
    tables: HashMap<Table, Vec<Row>>,
    sequences: HashMap<Table, i64>,
}

/// Process-local store with the same observable behaviour as the Postgres
/// backend: column defaults, generated keys, unique constraints and
/// embedded relations. Foreign keys are not enforced.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    failure: Mutex<Option<(Option<Table>, DatabaseError)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next store call fail with `error`.
    pub async fn fail_next(&self, error: DatabaseError) {
        *self.failure.lock().await = Some((None, error));
    }

    /// Make the next call touching `table` fail with `error`.
    pub async fn fail_on(&self, table: Table, error: DatabaseError) {
        *self.failure.lock().await = Some((Some(table), error));
    }

    pub async fn row_count(&self, table: Table) -> usize {
        self.state
            .read()
            .await
            .tables
            .get(&table)
            .map_or(0, Vec::len)
    }

    async fn take_failure(&self, table: Option<Table>) -> Result<()> {
        let mut failure = self.failure.lock().await;
        match failure.as_ref() {
            Some((None, _)) => {}
            Some((Some(target), _)) if Some(*target) == table => {}
            _ => return Ok(()),
        }
        match failure.take() {
            Some((_, err)) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn select(&self, query: &Query) -> Result<Vec<Row>> {
        self.take_failure(Some(query.table)).await?;
        query.validate()?;

        let state = self.state.read().await;
        let mut matched: Vec<&Row> = rows_of(&state, query.table)
            .iter()
            .filter(|row| matches_all(row, &query.filters))
            .collect();

        if !query.order.is_empty() {
            matched.sort_by(|a, b| {
                for order in &query.order {
                    let ord = compare_values(
                        a.get(&order.column).unwrap_or(&Value::Null),
                        b.get(&order.column).unwrap_or(&Value::Null),
                    );
                    let ord = if order.ascending { ord } else { ord.reverse() };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }

        let limit = query.limit.map_or(usize::MAX, |n| n as usize);
        Ok(matched
            .into_iter()
            .take(limit)
            .map(|row| shape(&state, row, query.columns.as_deref(), &query.embeds))
            .collect())
    }

    async fn insert(&self, table: Table, row: Row) -> Result<Row> {
        self.take_failure(Some(table)).await?;
        validate_row(&row)?;
        if row.is_empty() {
            return Err(DatabaseError::InvalidInput(format!("empty insert into {}", table)));
        }

        let mut state = self.state.write().await;
        let mut record = column_defaults(table);
        for (k, v) in row {
            record.insert(k, v);
        }

        match table.key_kind() {
            KeyKind::Uuid => {
                if record.get("id").map_or(true, Value::is_null) {
                    record.insert("id".to_string(), json!(Uuid::new_v4()));
                }
            }
            KeyKind::Serial => {
                let seq = state.sequences.entry(table).or_insert(0);
                match record.get("id").and_then(Value::as_i64) {
                    Some(explicit) => *seq = (*seq).max(explicit),
                    None => {
                        *seq += 1;
                        record.insert("id".to_string(), json!(*seq));
                    }
                }
            }
            KeyKind::Composite => {}
        }

        let now = now_value();
        if table.has_created_at() && record.get("created_at").map_or(true, Value::is_null) {
            record.insert("created_at".to_string(), now.clone());
        }
        if table.has_updated_at() && record.get("updated_at").map_or(true, Value::is_null) {
            record.insert("updated_at".to_string(), now);
        }

        let rows = state.tables.entry(table).or_default();
        check_unique(table, rows, &record, None)?;
        if table.key_kind() != KeyKind::Composite
            && rows.iter().any(|r| values_equal(&r["id"], &record["id"]))
        {
            return Err(DatabaseError::duplicate(table.name(), "id"));
        }

        rows.push(record.clone());
        Ok(record)
    }

    async fn update(&self, table: Table, patch: Row, filters: &[Filter]) -> Result<Vec<Row>> {
        self.take_failure(Some(table)).await?;
        require_filters("update", table, filters)?;
        validate_row(&patch)?;

        let mut state = self.state.write().await;
        let rows = state.tables.entry(table).or_default();
        let now = now_value();

        let targets: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| matches_all(row, filters))
            .map(|(i, _)| i)
            .collect();

        // Check every candidate before touching any row
        let mut updated = Vec::with_capacity(targets.len());
        for &i in &targets {
            let mut candidate = rows[i].clone();
            for (k, v) in &patch {
                candidate.insert(k.clone(), v.clone());
            }
            if table.has_updated_at() && !patch.contains_key("updated_at") {
                candidate.insert("updated_at".to_string(), now.clone());
            }
            check_unique(table, rows, &candidate, Some(i))?;
            updated.push((i, candidate));
        }

        Ok(updated
            .into_iter()
            .map(|(i, candidate)| {
                rows[i] = candidate.clone();
                candidate
            })
            .collect())
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<u64> {
        self.take_failure(Some(table)).await?;
        require_filters("delete", table, filters)?;

        let mut state = self.state.write().await;
        let rows = state.tables.entry(table).or_default();
        let before = rows.len();
        rows.retain(|row| !matches_all(row, filters));
        Ok((before - rows.len()) as u64)
    }

    async fn ping(&self) -> Result<()> {
        self.take_failure(None).await
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

fn rows_of(state: &State, table: Table) -> &[Row] {
    state.tables.get(&table).map_or(&[], Vec::as_slice)
}

fn now_value() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
}

/// Values a freshly inserted row carries when the caller leaves them out.
fn column_defaults(table: Table) -> Row {
    let defaults = match table {
        Table::Users => json!({
            "first_name": "",
            "last_name": "",
            "phone": null,
            "department": null,
            "role_id": null,
            "status": "active",
            "is_active": true,
            "email_verified": false,
            "failed_login_attempts": 0,
            "locked_until": null,
            "last_login": null,
            "password_hash": null,
        }),
        Table::Roles => json!({ "description": null, "is_active": true }),
        Table::Permissions => json!({ "description": null }),
        Table::Groups => json!({ "description": null, "is_active": true, "created_by": null }),
        Table::UserGroups => json!({ "assigned_by": null, "assigned_at": now_value() }),
        Table::Equipment => json!({
            "status": "active",
            "last_maintenance": null,
            "conformity_status": "pending",
        }),
        Table::LogbookEntries => json!({
            "user_id": null,
            "equipment_id": null,
            "is_judicial_requisition": false,
            "event_type": "observation",
            "priority": "medium",
            "location": null,
            "status": "new",
        }),
        Table::LogbookActions => json!({ "user_id": null }),
        Table::VideoBookmarks => json!({ "description": null }),
        Table::AuditLogs => json!({
            "user_id": null,
            "old_values": null,
            "new_values": null,
            "success": true,
            "error_message": null,
        }),
        Table::RolePermissions => json!({}),
    };
    match defaults {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}

fn check_unique(table: Table, rows: &[Row], record: &Row, skip: Option<usize>) -> Result<()> {
    for key in table.unique_keys() {
        let clash = rows.iter().enumerate().any(|(i, other)| {
            Some(i) != skip
                && key.iter().all(|col| {
                    let mine = record.get(*col).unwrap_or(&Value::Null);
                    !mine.is_null() && values_equal(mine, other.get(*col).unwrap_or(&Value::Null))
                })
        });
        if clash {
            return Err(DatabaseError::duplicate(table.name(), &key.join(", ")));
        }
    }
    Ok(())
}

fn matches_all(row: &Row, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| {
        let value = row.get(filter.column()).unwrap_or(&Value::Null);
        match filter {
            Filter::Eq(_, expected) if expected.is_null() => value.is_null(),
            Filter::Eq(_, expected) => values_equal(value, expected),
            Filter::In(_, options) => options.iter().any(|o| values_equal(value, o)),
            Filter::IsNull(_) => value.is_null(),
        }
    })
}

fn parse_timestamp(v: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(v).ok().map(|t| t.with_timezone(&Utc))
}

/// Equality as the database sees it: numbers by value, timestamps by instant.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::String(x), Value::String(y)) => {
            x == y
                || matches!((parse_timestamp(x), parse_timestamp(y)), (Some(p), Some(q)) if p == q)
        }
        _ => a == b,
    }
}

/// Sort order with NULLs last, matching the Postgres default for ascending.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => match (parse_timestamp(x), parse_timestamp(y)) {
            (Some(p), Some(q)) => p.cmp(&q),
            _ => x.cmp(y),
        },
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// Resolve embeds against the full row, then project.
fn shape(state: &State, row: &Row, columns: Option<&[String]>, embeds: &[Embed]) -> Row {
    let mut out = match columns {
        Some(cols) if !cols.is_empty() => cols
            .iter()
            .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null)))
            .collect(),
        _ => row.clone(),
    };

    for embed in embeds {
        let local = row.get(&embed.local_column).unwrap_or(&Value::Null);
        let mut related = rows_of(state, embed.table)
            .iter()
            .filter(|r| values_equal(r.get(&embed.foreign_column).unwrap_or(&Value::Null), local))
            .map(|r| Value::Object(shape(state, r, embed.columns.as_deref(), &embed.embeds)));

        let value = match embed.cardinality {
            Cardinality::One => related.next().unwrap_or(Value::Null),
            Cardinality::Many => Value::Array(related.collect()),
        };
        out.insert(embed.alias.clone(), value);
    }

    out
}
