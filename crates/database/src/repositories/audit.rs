use crate::error::Result;
use crate::store::{from_row, from_rows, to_row, Query, SharedStore, Table};
use sensicity_models::{AuditLog, CreateAuditLog};

#[derive(Clone)]
pub struct AuditRepository {
    store: SharedStore,
}

impl AuditRepository {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Append an audit log entry. Entries are never updated or deleted.
    pub async fn create(&self, log: &CreateAuditLog) -> Result<AuditLog> {
        let row = self.store.insert(Table::AuditLogs, to_row(log)?).await?;
        from_row(row)
    }

    /// Most recent entries first.
    pub async fn list(&self, limit: i64) -> Result<Vec<AuditLog>> {
        let rows = self
            .store
            .select(
                &Query::table(Table::AuditLogs)
                    .order_by("created_at", false)
                    .order_by("id", false)
                    .limit(limit),
            )
            .await?;
        from_rows(rows)
    }

    /// History of one target, e.g. `("user", "<uuid>")`.
    pub async fn list_for_target(&self, target_type: &str, target_id: &str) -> Result<Vec<AuditLog>> {
        let rows = self
            .store
            .select(
                &Query::table(Table::AuditLogs)
                    .eq("target_type", target_type)
                    .eq("target_id", target_id)
                    .order_by("created_at", false)
                    .order_by("id", false),
            )
            .await?;
        from_rows(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use sensicity_models::AuditLogBuilder;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_append_and_query() {
        let repo = AuditRepository::new(fixtures::memory_store());
        let actor = Uuid::new_v4();
        let target = Uuid::new_v4().to_string();

        repo.create(
            &AuditLogBuilder::new("user.create", "user", target.clone())
                .actor(Some(actor))
                .new_values(&serde_json::json!({ "email": "x@sensicity.fr" }))
                .build(),
        )
        .await
        .unwrap();
        repo.create(
            &AuditLogBuilder::new("user.update", "user", target.clone())
                .actor(Some(actor))
                .failure("email already used")
                .build(),
        )
        .await
        .unwrap();
        repo.create(&AuditLogBuilder::new("group.create", "group", "1").build())
            .await
            .unwrap();

        let all = repo.list(10).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].action, "group.create");

        let history = repo.list_for_target("user", &target).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].action, "user.update");
        assert!(!history[0].success);
        assert_eq!(history[1].new_values.as_ref().unwrap()["email"], "x@sensicity.fr");
    }
}
