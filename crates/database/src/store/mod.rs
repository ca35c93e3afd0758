//! Generic table access.
//!
//! The entity store is reached through four calls (select, insert, update,
//! delete) over JSON rows. Repositories translate between rows and the typed
//! records of `sensicity-models`; nothing above this module knows which
//! backend is in use.

pub mod memory;
pub mod postgres;

use crate::error::{DatabaseError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// One table row as returned by the store, embedded relations included.
pub type Row = serde_json::Map<String, Value>;

pub type SharedStore = Arc<dyn EntityStore>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    Uuid,
    Serial,
    // Association tables keyed by their column pair
    Composite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Users,
    Roles,
    Permissions,
    RolePermissions,
    Groups,
    UserGroups,
    Equipment,
    LogbookEntries,
    LogbookActions,
    VideoBookmarks,
    AuditLogs,
}

impl Table {
    pub const ALL: &'static [Table] = &[
        Table::Users,
        Table::Roles,
        Table::Permissions,
        Table::RolePermissions,
        Table::Groups,
        Table::UserGroups,
        Table::Equipment,
        Table::LogbookEntries,
        Table::LogbookActions,
        Table::VideoBookmarks,
        Table::AuditLogs,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Users => "users",
            Table::Roles => "roles",
            Table::Permissions => "permissions",
            Table::RolePermissions => "role_permissions",
            Table::Groups => "groups",
            Table::UserGroups => "user_groups",
            Table::Equipment => "equipements",
            Table::LogbookEntries => "logbook_entries",
            Table::LogbookActions => "logbook_actions",
            Table::VideoBookmarks => "video_bookmarks",
            Table::AuditLogs => "user_audit_logs",
        }
    }

    pub fn key_kind(&self) -> KeyKind {
        match self {
            Table::Users | Table::Equipment => KeyKind::Uuid,
            Table::RolePermissions | Table::UserGroups => KeyKind::Composite,
            _ => KeyKind::Serial,
        }
    }

    /// Column sets the store keeps unique.
    pub fn unique_keys(&self) -> &'static [&'static [&'static str]] {
        match self {
            Table::Users => &[&["email"]],
            Table::Roles | Table::Permissions | Table::Groups => &[&["name"]],
            Table::RolePermissions => &[&["role_id", "permission_id"]],
            Table::UserGroups => &[&["user_id", "group_id"]],
            _ => &[],
        }
    }

    pub fn has_created_at(&self) -> bool {
        !matches!(self, Table::RolePermissions | Table::UserGroups)
    }

    pub fn has_updated_at(&self) -> bool {
        matches!(
            self,
            Table::Users | Table::Roles | Table::Groups | Table::Equipment | Table::LogbookEntries
        )
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Row predicate. All filters of a query are AND-ed.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    In(String, Vec<Value>),
    IsNull(String),
}

impl Filter {
    pub fn eq(column: &str, value: impl Serialize) -> Self {
        Filter::Eq(column.to_string(), serde_json::to_value(value).unwrap_or(Value::Null))
    }

    pub fn is_in<T: Serialize>(column: &str, values: &[T]) -> Self {
        Filter::In(
            column.to_string(),
            values
                .iter()
                .map(|v| serde_json::to_value(v).unwrap_or(Value::Null))
                .collect(),
        )
    }

    pub fn is_null(column: &str) -> Self {
        Filter::IsNull(column.to_string())
    }

    pub fn column(&self) -> &str {
        match self {
            Filter::Eq(c, _) | Filter::In(c, _) | Filter::IsNull(c) => c,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Parent column references the embedded row (many-to-one)
    One,
    /// Embedded rows reference the parent (one-to-many)
    Many,
}

/// A related table pulled into each returned row under `alias`.
#[derive(Debug, Clone, PartialEq)]
pub struct Embed {
    pub table: Table,
    pub alias: String,
    pub local_column: String,
    pub foreign_column: String,
    pub cardinality: Cardinality,
    pub columns: Option<Vec<String>>,
    pub embeds: Vec<Embed>,
}

impl Embed {
    /// `parent.local_column = table.foreign_column`, at most one row.
    pub fn one(table: Table, local_column: &str, foreign_column: &str) -> Self {
        Self::new(table, local_column, foreign_column, Cardinality::One)
    }

    /// All rows with `table.foreign_column = parent.local_column`.
    pub fn many(table: Table, local_column: &str, foreign_column: &str) -> Self {
        Self::new(table, local_column, foreign_column, Cardinality::Many)
    }

    fn new(table: Table, local: &str, foreign: &str, cardinality: Cardinality) -> Self {
        Self {
            table,
            alias: table.name().to_string(),
            local_column: local.to_string(),
            foreign_column: foreign.to_string(),
            cardinality,
            columns: None,
            embeds: Vec::new(),
        }
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.alias = alias.to_string();
        self
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = Some(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    fn validate(&self) -> Result<()> {
        validate_identifier(&self.alias)?;
        validate_identifier(&self.local_column)?;
        validate_identifier(&self.foreign_column)?;
        if let Some(ref columns) = self.columns {
            for c in columns {
                validate_identifier(c)?;
            }
        }
        for nested in &self.embeds {
            nested.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: Table,
    pub columns: Option<Vec<String>>,
    pub filters: Vec<Filter>,
    pub embeds: Vec<Embed>,
    pub order: Vec<Order>,
    pub limit: Option<i64>,
}

impl Query {
    pub fn table(table: Table) -> Self {
        Self {
            table,
            columns: None,
            filters: Vec::new(),
            embeds: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = Some(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn eq(self, column: &str, value: impl Serialize) -> Self {
        self.filter(Filter::eq(column, value))
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
        self.order.push(Order {
            column: column.to_string(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Reject identifiers that could not have come from code.
    pub fn validate(&self) -> Result<()> {
        if let Some(ref columns) = self.columns {
            for c in columns {
                validate_identifier(c)?;
            }
        }
        validate_filters(&self.filters)?;
        for embed in &self.embeds {
            embed.validate()?;
        }
        for order in &self.order {
            validate_identifier(&order.column)?;
        }
        if matches!(self.limit, Some(n) if n < 0) {
            return Err(DatabaseError::InvalidInput("negative limit".to_string()));
        }
        Ok(())
    }
}

/// The four calls the application makes against its backing store.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Rows of `query.table` matching every filter, in the requested order.
    async fn select(&self, query: &Query) -> Result<Vec<Row>>;

    /// Insert one row; columns left out take the store's defaults.
    async fn insert(&self, table: Table, row: Row) -> Result<Row>;

    /// Apply `patch` to every matching row and return the updated rows.
    /// An empty filter list is rejected.
    async fn update(&self, table: Table, patch: Row, filters: &[Filter]) -> Result<Vec<Row>>;

    /// Delete matching rows and return how many went. No cascading beyond
    /// what the store itself enforces. An empty filter list is rejected.
    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<u64>;

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str;
}

/// First row of a select, if any.
pub async fn select_one(store: &dyn EntityStore, query: Query) -> Result<Option<Row>> {
    let mut rows = store.select(&query.limit(1)).await?;
    Ok(if rows.is_empty() { None } else { Some(rows.swap_remove(0)) })
}

pub fn to_row<T: Serialize>(value: &T) -> Result<Row> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(DatabaseError::Serialization(format!(
            "expected an object, got {}",
            other
        ))),
    }
}

pub fn from_row<T: DeserializeOwned>(row: Row) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(row))?)
}

pub fn from_rows<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Vec<T>> {
    rows.into_iter().map(from_row).collect()
}

/// `[a-z_][a-z0-9_]*`, at most 63 bytes (the Postgres identifier limit).
pub fn validate_identifier(ident: &str) -> Result<()> {
    let mut chars = ident.chars();
    let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if valid_start && valid_rest && ident.len() <= 63 {
        Ok(())
    } else {
        Err(DatabaseError::InvalidInput(format!("invalid identifier: {:?}", ident)))
    }
}

pub(crate) fn validate_filters(filters: &[Filter]) -> Result<()> {
    for f in filters {
        validate_identifier(f.column())?;
    }
    Ok(())
}

pub(crate) fn validate_row(row: &Row) -> Result<()> {
    for key in row.keys() {
        validate_identifier(key)?;
    }
    Ok(())
}

pub(crate) fn require_filters(op: &str, table: Table, filters: &[Filter]) -> Result<()> {
    if filters.is_empty() {
        return Err(DatabaseError::InvalidInput(format!(
            "{} on {} requires at least one filter",
            op, table
        )));
    }
    validate_filters(filters)
}
