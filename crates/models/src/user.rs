use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{trim_in_place, trim_optional, Group, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
    Pending,
}

string_enum!(UserStatus {
    Active => "active",
    Inactive => "inactive",
    Suspended => "suspended",
    Pending => "pending",
});

#[derive(Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,

    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub phone: Option<String>,
    pub department: Option<String>,

    // Single role; NULL means "no role" and yields no permissions
    pub role_id: Option<i64>,

    #[serde(default)]
    pub status: UserStatus,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub email_verified: bool,

    // Lockout bookkeeping
    #[serde(default)]
    pub failed_login_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing)]
    pub password_hash: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

redacted_debug!(User {
    show id,
    show email,
    show role_id,
    show status,
    show is_active,
    show failed_login_attempts,
    show locked_until,
    redact_option password_hash,
});

fn default_true() -> bool {
    true
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    /// Lock still in force at `now`, if any.
    pub fn active_lock(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.locked_until.filter(|until| *until > now)
    }

    /// Only `active` accounts with the activity flag set may open a session.
    pub fn can_sign_in(&self) -> bool {
        self.status == UserStatus::Active && self.is_active
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewUser {
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,

    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(regex(path = *PHONE_REGEX, message = "Invalid phone format"))]
    pub phone: Option<String>,

    pub department: Option<String>,

    pub role_id: Option<i64>,

    #[serde(default)]
    pub status: UserStatus,

    #[serde(default = "default_true")]
    pub is_active: bool,

    #[serde(default)]
    pub email_verified: bool,
}

impl NewUser {
    /// Trim text inputs and drop blank optionals before validation.
    pub fn normalized(mut self) -> Self {
        trim_in_place(&mut self.first_name);
        trim_in_place(&mut self.last_name);
        trim_in_place(&mut self.email);
        self.phone = trim_optional(self.phone);
        self.department = trim_optional(self.department);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateUser {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(regex(path = *PHONE_REGEX, message = "Invalid phone format"))]
    pub phone: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_id: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<UserStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
}

impl UpdateUser {
    pub fn normalized(mut self) -> Self {
        if let Some(ref mut v) = self.first_name {
            trim_in_place(v);
        }
        if let Some(ref mut v) = self.last_name {
            trim_in_place(v);
        }
        if let Some(ref mut v) = self.email {
            trim_in_place(v);
        }
        self.phone = trim_optional(self.phone);
        self.department = trim_optional(self.department);
        self
    }
}

/// What the rest of the application sees of a user: no credentials, no
/// lockout bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub role_id: Option<i64>,
    pub status: UserStatus,
    pub is_active: bool,
    pub email_verified: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            phone: user.phone,
            department: user.department,
            role_id: user.role_id,
            status: user.status,
            is_active: user.is_active,
            email_verified: user.email_verified,
            last_login: user.last_login,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Listing shape: profile joined to its role and group memberships.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDetails {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub role: Option<Role>,
    #[serde(default)]
    pub groups: Vec<Group>,
}

// Digits, spaces, dashes, plus sign and parentheses
lazy_static::lazy_static! {
    static ref PHONE_REGEX: regex::Regex = regex::Regex::new(r"^[\d\s\-\+\(\)]+$").unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user() -> NewUser {
        NewUser {
            first_name: "Camille".to_string(),
            last_name: "Durand".to_string(),
            email: "camille.durand@sensicity.fr".to_string(),
            phone: Some("+33 (0)1 23-45-67-89".to_string()),
            department: None,
            role_id: Some(2),
            status: UserStatus::Active,
            is_active: true,
            email_verified: false,
        }
    }

    #[test]
    fn test_new_user_valid() {
        assert!(new_user().normalized().validate().is_ok());
    }

    #[test]
    fn test_new_user_blank_names_rejected() {
        let mut user = new_user();
        user.first_name = "   ".to_string();
        user.last_name = String::new();

        let errors = user.normalized().validate().unwrap_err();
        let fields = crate::field_errors(&errors);
        assert_eq!(fields["first_name"], vec!["First name is required".to_string()]);
        assert!(fields.contains_key("last_name"));
    }

    #[test]
    fn test_new_user_bad_email_and_phone() {
        let mut user = new_user();
        user.email = "not-an-email".to_string();
        user.phone = Some("call me".to_string());

        let fields = crate::field_errors(&user.normalized().validate().unwrap_err());
        assert_eq!(fields["email"], vec!["Invalid email format".to_string()]);
        assert_eq!(fields["phone"], vec!["Invalid phone format".to_string()]);
    }

    #[test]
    fn test_blank_phone_is_dropped() {
        let mut user = new_user();
        user.phone = Some("  ".to_string());
        let user = user.normalized();
        assert!(user.phone.is_none());
        assert!(user.validate().is_ok());
    }

    #[test]
    fn test_user_row_defaults() {
        let row = serde_json::json!({
            "id": "6f1c1c34-3d4e-4a47-9a53-1df0e1b2a0c1",
            "email": "ops@sensicity.fr",
            "role_id": null,
            "created_at": "2025-01-10T08:00:00Z",
            "updated_at": "2025-01-10T08:00:00Z"
        });
        let user: User = serde_json::from_value(row).unwrap();
        assert_eq!(user.status, UserStatus::Active);
        assert!(user.is_active);
        assert_eq!(user.failed_login_attempts, 0);
        assert!(user.can_sign_in());
    }

    #[test]
    fn test_password_hash_never_serialized() {
        let row = serde_json::json!({
            "id": "6f1c1c34-3d4e-4a47-9a53-1df0e1b2a0c1",
            "email": "ops@sensicity.fr",
            "role_id": 1,
            "password_hash": "$argon2id$v=19$secret",
            "created_at": "2025-01-10T08:00:00Z",
            "updated_at": "2025-01-10T08:00:00Z"
        });
        let user: User = serde_json::from_value(row).unwrap();
        assert!(user.password_hash.is_some());

        let out = serde_json::to_string(&user).unwrap();
        assert!(!out.contains("argon2id"));
        assert!(!format!("{:?}", user).contains("argon2id"));
    }

    #[test]
    fn test_active_lock() {
        let now = Utc::now();
        let row = serde_json::json!({
            "id": "6f1c1c34-3d4e-4a47-9a53-1df0e1b2a0c1",
            "email": "ops@sensicity.fr",
            "role_id": 1,
            "locked_until": (now + chrono::Duration::minutes(5)).to_rfc3339(),
            "created_at": "2025-01-10T08:00:00Z",
            "updated_at": "2025-01-10T08:00:00Z"
        });
        let user: User = serde_json::from_value(row).unwrap();
        assert!(user.active_lock(now).is_some());
        assert!(user.active_lock(now + chrono::Duration::minutes(6)).is_none());
    }
}
