use super::{
    require_filters, validate_row, Cardinality, Embed, EntityStore, Filter, Query, Row, Table,
};
use crate::connection::Database;
use crate::error::{DatabaseError, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};

/// Entity store backed by the PostgreSQL pool.
///
/// Rows travel as `jsonb`: reads project with `to_jsonb`, writes go through
/// `jsonb_populate_record` so every value is cast to the column's declared
/// type by the database.
#[derive(Clone)]
pub struct PgStore {
    db: Database,
}

impl PgStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl EntityStore for PgStore {
    async fn select(&self, query: &Query) -> Result<Vec<Row>> {
        query.validate()?;

        let mut counter = 0;
        let projection = row_expr("t0", query.columns.as_deref(), &query.embeds, &mut counter);

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT ");
        builder.push(projection);
        builder.push(format!(" FROM \"{}\" AS t0", query.table.name()));
        push_where(&mut builder, &query.filters);

        if !query.order.is_empty() {
            let order = query
                .order
                .iter()
                .map(|o| format!("t0.\"{}\" {}", o.column, if o.ascending { "ASC" } else { "DESC" }))
                .collect::<Vec<_>>()
                .join(", ");
            builder.push(" ORDER BY ");
            builder.push(order);
        }

        if let Some(limit) = query.limit {
            builder.push(" LIMIT ");
            builder.push_bind(limit);
        }

        tracing::debug!(table = %query.table, sql = builder.sql(), "select");

        let rows = builder
            .build_query_scalar::<Json<Value>>()
            .fetch_all(self.db.pool())
            .await?;

        rows.into_iter().map(|Json(v)| into_row(v)).collect()
    }

    async fn insert(&self, table: Table, row: Row) -> Result<Row> {
        validate_row(&row)?;
        if row.is_empty() {
            return Err(DatabaseError::InvalidInput(format!("empty insert into {}", table)));
        }

        let column_list = row
            .keys()
            .map(|c| format!("\"{}\"", c))
            .collect::<Vec<_>>()
            .join(", ");
        let select_list = row
            .keys()
            .map(|c| format!("r.\"{}\"", c))
            .collect::<Vec<_>>()
            .join(", ");

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "INSERT INTO \"{table}\" AS t0 ({column_list}) SELECT {select_list} FROM jsonb_populate_record(NULL::\"{table}\", ",
            table = table.name(),
            column_list = column_list,
            select_list = select_list,
        ));
        builder.push_bind(Json(Value::Object(row.clone())));
        builder.push(") AS r RETURNING to_jsonb(t0)");

        tracing::debug!(table = %table, sql = builder.sql(), "insert");

        let Json(inserted) = builder
            .build_query_scalar::<Json<Value>>()
            .fetch_one(self.db.pool())
            .await?;

        into_row(inserted)
    }

    async fn update(&self, table: Table, patch: Row, filters: &[Filter]) -> Result<Vec<Row>> {
        require_filters("update", table, filters)?;
        validate_row(&patch)?;

        let mut assignments: Vec<String> = patch.keys().map(|c| format!("\"{c}\" = r.\"{c}\"")).collect();
        if table.has_updated_at() && !patch.contains_key("updated_at") {
            assignments.push("updated_at = NOW()".to_string());
        }
        if assignments.is_empty() {
            return Err(DatabaseError::InvalidInput(format!("empty update on {}", table)));
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "UPDATE \"{table}\" AS t0 SET {assignments} FROM jsonb_populate_record(NULL::\"{table}\", ",
            table = table.name(),
            assignments = assignments.join(", "),
        ));
        builder.push_bind(Json(Value::Object(patch)));
        builder.push(") AS r");
        push_where(&mut builder, filters);
        builder.push(" RETURNING to_jsonb(t0)");

        tracing::debug!(table = %table, sql = builder.sql(), "update");

        let rows = builder
            .build_query_scalar::<Json<Value>>()
            .fetch_all(self.db.pool())
            .await?;

        rows.into_iter().map(|Json(v)| into_row(v)).collect()
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<u64> {
        require_filters("delete", table, filters)?;

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("DELETE FROM \"{}\" AS t0", table.name()));
        push_where(&mut builder, filters);

        tracing::debug!(table = %table, sql = builder.sql(), "delete");

        let result = builder.build().execute(self.db.pool()).await?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<()> {
        self.db.ping().await
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

fn into_row(value: Value) -> Result<Row> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(DatabaseError::Serialization(format!(
            "expected a jsonb object, got {}",
            other
        ))),
    }
}

/// Compare through `to_jsonb` so bound JSON values match any column type.
fn push_where(builder: &mut QueryBuilder<Postgres>, filters: &[Filter]) {
    for (i, filter) in filters.iter().enumerate() {
        builder.push(if i == 0 { " WHERE " } else { " AND " });
        match filter {
            Filter::Eq(column, Value::Null) | Filter::IsNull(column) => {
                builder.push(format!("t0.\"{}\" IS NULL", column));
            }
            Filter::Eq(column, value) => {
                builder.push(format!("to_jsonb(t0.\"{}\") = ", column));
                builder.push_bind(Json(value.clone()));
            }
            Filter::In(_, values) if values.is_empty() => {
                builder.push("FALSE");
            }
            Filter::In(column, values) => {
                builder.push(format!(
                    "to_jsonb(t0.\"{}\") IN (SELECT jsonb_array_elements(",
                    column
                ));
                builder.push_bind(Json(Value::Array(values.clone())));
                builder.push("))");
            }
        }
    }
}

/// `jsonb` expression for one row of `alias`, with embedded relations merged in.
fn row_expr(alias: &str, columns: Option<&[String]>, embeds: &[Embed], counter: &mut usize) -> String {
    let mut expr = match columns {
        Some(cols) if !cols.is_empty() => {
            let pairs = cols
                .iter()
                .map(|c| format!("'{c}', {alias}.\"{c}\""))
                .collect::<Vec<_>>()
                .join(", ");
            format!("jsonb_build_object({})", pairs)
        }
        _ => format!("to_jsonb({})", alias),
    };

    for embed in embeds {
        *counter += 1;
        let child = format!("t{}", counter);
        let inner = row_expr(&child, embed.columns.as_deref(), &embed.embeds, counter);
        let join = format!(
            "FROM \"{table}\" AS {child} WHERE {child}.\"{foreign}\" = {alias}.\"{local}\"",
            table = embed.table.name(),
            child = child,
            foreign = embed.foreign_column,
            alias = alias,
            local = embed.local_column,
        );
        let sub = match embed.cardinality {
            Cardinality::One => format!("(SELECT {} {} LIMIT 1)", inner, join),
            Cardinality::Many => format!(
                "COALESCE((SELECT jsonb_agg({}) {}), '[]'::jsonb)",
                inner, join
            ),
        };
        expr = format!("{} || jsonb_build_object('{}', {})", expr, embed.alias, sub);
    }

    expr
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::DatabaseConfig;

    #[test]
    fn test_row_expr_nests_embeds() {
        let embeds = vec![Embed::one(Table::Roles, "role_id", "id").embed(
            Embed::many(Table::RolePermissions, "id", "role_id")
                .embed(Embed::one(Table::Permissions, "permission_id", "id")),
        )];
        let mut counter = 0;
        let sql = row_expr("t0", None, &embeds, &mut counter);

        assert_eq!(counter, 3);
        assert!(sql.starts_with("to_jsonb(t0) || jsonb_build_object('roles', (SELECT to_jsonb(t1)"));
        assert!(sql.contains(r#"FROM "roles" AS t1 WHERE t1."id" = t0."role_id""#));
        assert!(sql.contains("COALESCE((SELECT jsonb_agg(to_jsonb(t2)"));
        assert!(sql.contains(r#"FROM "role_permissions" AS t2 WHERE t2."role_id" = t1."id""#));
        assert!(sql.contains(r#"FROM "permissions" AS t3 WHERE t3."id" = t2."permission_id" LIMIT 1"#));
    }

    #[test]
    fn test_row_expr_projection() {
        let cols = vec!["id".to_string(), "email".to_string()];
        let mut counter = 0;
        let sql = row_expr("t0", Some(&cols), &[], &mut counter);
        assert_eq!(sql, r#"jsonb_build_object('id', t0."id", 'email', t0."email")"#);
    }

    #[test]
    fn test_where_clause_shapes() {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(r#"DELETE FROM "users" AS t0"#);
        push_where(
            &mut builder,
            &[
                Filter::eq("status", "active"),
                Filter::In("id".to_string(), vec![]),
                Filter::is_null("locked_until"),
            ],
        );
        assert_eq!(
            builder.sql(),
            r#"DELETE FROM "users" AS t0 WHERE to_jsonb(t0."status") = $1 AND FALSE AND t0."locked_until" IS NULL"#
        );
    }

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn test_pg_store_roundtrip() {
        let db = Database::new(DatabaseConfig::from_env())
            .await
            .expect("Failed to connect to database");
        let store = PgStore::new(db);
        store.ping().await.expect("Failed to ping database");

        let rows = store
            .select(&Query::table(Table::Permissions).order_by("name", true).limit(5))
            .await
            .expect("select failed");
        assert!(rows.len() <= 5);
    }
}
