use crate::error::{AuthzError, Result};
use crate::permission::PermissionSet;
use sensicity_database::{DatabaseError, SharedStore, UserRepository};
use sensicity_models::UserProfile;
use uuid::Uuid;

/// How a user's effective permissions are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionPolicy {
    /// user -> role -> role_permissions -> permissions
    #[default]
    Strict,
    /// Every authenticated user holds the whole catalog. Development only.
    Demo,
}

/// Loads users together with their effective permission set.
#[derive(Clone)]
pub struct PermissionEvaluator {
    users: UserRepository,
    policy: PermissionPolicy,
}

impl PermissionEvaluator {
    pub fn new(store: SharedStore, policy: PermissionPolicy) -> Self {
        if policy == PermissionPolicy::Demo {
            tracing::warn!("Permission evaluator running with the demo policy");
        }
        Self {
            users: UserRepository::new(store),
            policy,
        }
    }

    pub fn policy(&self) -> PermissionPolicy {
        self.policy
    }

    /// Profile and effective permissions of `user_id`.
    ///
    /// A user without a role, or whose role grants nothing, gets an empty set.
    /// Group membership is never consulted.
    pub async fn load_user(&self, user_id: Uuid) -> Result<(UserProfile, PermissionSet)> {
        let (user, role) = self.users.find_with_role(user_id).await.map_err(|e| match e {
            DatabaseError::NotFound(_) => AuthzError::NotFound(format!("User {}", user_id)),
            other => AuthzError::Database(other),
        })?;

        let permissions: PermissionSet = match self.policy {
            PermissionPolicy::Strict => role
                .as_ref()
                .map(|r| r.permission_names().collect())
                .unwrap_or_default(),
            PermissionPolicy::Demo => {
                tracing::warn!(user_id = %user_id, "Demo policy: granting the full permission catalog");
                PermissionSet::full_catalog()
            }
        };

        tracing::debug!(
            user_id = %user_id,
            role = role.as_ref().map(|r| r.role.name.as_str()),
            permissions = permissions.len(),
            "Loaded user permissions"
        );

        Ok((user.into(), permissions))
    }
}
