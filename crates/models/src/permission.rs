use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A `module.action` authorization unit, e.g. `equipment.create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub module: String,
    pub action: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewPermission {
    #[validate(length(min = 1, max = 255))]
    pub name: String,

    pub description: Option<String>,

    #[validate(length(min = 1, max = 100))]
    pub module: String,

    #[validate(length(min = 1, max = 100))]
    pub action: String,
}

impl NewPermission {
    /// Build from a dotted name; `None` when the name has no `module.action` shape.
    pub fn from_name(name: &str, description: Option<&str>) -> Option<Self> {
        let (module, action) = name.split_once('.')?;
        if module.is_empty() || action.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            description: description.map(str::to_string),
            module: module.to_string(),
            action: action.to_string(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolePermission {
    pub role_id: i64,
    pub permission_id: i64,
}
