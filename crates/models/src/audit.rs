use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: i64,

    // Actor (None for system actions)
    pub user_id: Option<Uuid>,

    // Event, e.g. "user.create"
    pub action: String,

    // Target
    pub target_type: String,
    pub target_id: String,

    // Snapshot
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,

    // Result
    #[serde(default = "default_true")]
    pub success: bool,
    pub error_message: Option<String>,

    pub created_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuditLog {
    pub user_id: Option<Uuid>,
    pub action: String,
    pub target_type: String,
    pub target_id: String,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    pub success: bool,
    pub error_message: Option<String>,
}

// Helper builder for audit events
pub struct AuditLogBuilder {
    log: CreateAuditLog,
}

impl AuditLogBuilder {
    pub fn new(
        action: impl Into<String>,
        target_type: impl Into<String>,
        target_id: impl Into<String>,
    ) -> Self {
        Self {
            log: CreateAuditLog {
                user_id: None,
                action: action.into(),
                target_type: target_type.into(),
                target_id: target_id.into(),
                old_values: None,
                new_values: None,
                success: true,
                error_message: None,
            },
        }
    }

    pub fn actor(mut self, user_id: Option<Uuid>) -> Self {
        self.log.user_id = user_id;
        self
    }

    pub fn old_values<T: Serialize>(mut self, values: &T) -> Self {
        self.log.old_values = serde_json::to_value(values).ok();
        self
    }

    pub fn new_values<T: Serialize>(mut self, values: &T) -> Self {
        self.log.new_values = serde_json::to_value(values).ok();
        self
    }

    pub fn failure(mut self, error: impl Into<String>) -> Self {
        self.log.success = false;
        self.log.error_message = Some(error.into());
        self
    }

    pub fn build(self) -> CreateAuditLog {
        self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults_to_success() {
        let log = AuditLogBuilder::new("user.delete", "user", "42").build();
        assert!(log.success);
        assert!(log.user_id.is_none());
        assert!(log.old_values.is_none());
    }

    #[test]
    fn test_builder_failure_and_snapshots() {
        let actor = Uuid::new_v4();
        let log = AuditLogBuilder::new("group.create", "group", "7")
            .actor(Some(actor))
            .new_values(&serde_json::json!({ "name": "Night shift" }))
            .failure("duplicate name")
            .build();

        assert_eq!(log.user_id, Some(actor));
        assert!(!log.success);
        assert_eq!(log.error_message.as_deref(), Some("duplicate name"));
        assert_eq!(log.new_values.unwrap()["name"], "Night shift");
    }
}
