use super::{first_or_not_found, take_array, take_object};
use crate::error::{DatabaseError, Result};
use crate::store::{from_row, select_one, to_row, Embed, Filter, Query, Row, SharedStore, Table};
use chrono::{DateTime, Utc};
use sensicity_models::{
    Group, NewUser, Permission, Role, RoleWithPermissions, UpdateUser, User, UserDetails,
    UserProfile,
};
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Clone)]
pub struct UserRepository {
    store: SharedStore,
}

/// roles -> role_permissions -> permissions
pub(crate) fn permissions_embed() -> Embed {
    Embed::many(Table::RolePermissions, "id", "role_id")
        .embed(Embed::one(Table::Permissions, "permission_id", "id").alias("permission"))
}

fn role_with_permissions_embed() -> Embed {
    Embed::one(Table::Roles, "role_id", "id")
        .alias("role")
        .embed(permissions_embed())
}

/// Unpack a role row carrying a `role_permissions[].permission` tree.
pub(crate) fn role_from_tree(mut row: Row) -> Result<RoleWithPermissions> {
    let permissions = take_array(&mut row, "role_permissions")
        .into_iter()
        .filter_map(|mut link| take_object(&mut link, "permission"))
        .map(from_row::<Permission>)
        .collect::<Result<Vec<_>>>()?;

    Ok(RoleWithPermissions {
        role: from_row(row)?,
        permissions,
    })
}

impl UserRepository {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Create a new user
    pub async fn create(&self, new_user: &NewUser, password_hash: Option<&str>) -> Result<User> {
        let mut row = to_row(new_user)?;
        if let Some(hash) = password_hash {
            row.insert("password_hash".to_string(), json!(hash));
        }

        let row = self.store.insert(Table::Users, row).await?;
        from_row(row)
    }

    /// Find user by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<User> {
        let rows = self
            .store
            .select(&Query::table(Table::Users).eq("id", id).limit(1))
            .await?;
        first_or_not_found(rows, "User", &id.to_string())
    }

    /// Find user by email
    pub async fn find_by_email(&self, email: &str) -> Result<User> {
        let rows = self
            .store
            .select(&Query::table(Table::Users).eq("email", email).limit(1))
            .await?;
        first_or_not_found(rows, "User", email)
    }

    /// User together with their role and its permissions. `None` when the
    /// user has no role or the role row is gone.
    pub async fn find_with_role(&self, id: Uuid) -> Result<(User, Option<RoleWithPermissions>)> {
        let query = Query::table(Table::Users)
            .eq("id", id)
            .embed(role_with_permissions_embed());

        let mut row = select_one(self.store.as_ref(), query)
            .await?
            .ok_or_else(|| DatabaseError::not_found("User", &id.to_string()))?;

        let role = take_object(&mut row, "role").map(role_from_tree).transpose()?;
        Ok((from_row(row)?, role))
    }

    /// All users, newest first, with role and groups.
    pub async fn list_detailed(&self) -> Result<Vec<UserDetails>> {
        let query = Query::table(Table::Users)
            .order_by("created_at", false)
            .embed(Embed::one(Table::Roles, "role_id", "id").alias("role"))
            .embed(
                Embed::many(Table::UserGroups, "id", "user_id")
                    .embed(Embed::one(Table::Groups, "group_id", "id").alias("group")),
            );

        let rows = self.store.select(&query).await?;
        rows.into_iter().map(details_from_row).collect()
    }

    pub async fn list(&self) -> Result<Vec<UserProfile>> {
        let rows = self
            .store
            .select(&Query::table(Table::Users).order_by("created_at", false))
            .await?;
        rows.into_iter()
            .map(|row| from_row::<User>(row).map(UserProfile::from))
            .collect()
    }

    /// Update user; absent fields are left untouched.
    pub async fn update(&self, id: Uuid, update: &UpdateUser) -> Result<User> {
        let patch = to_row(update)?;
        if patch.is_empty() {
            return self.find_by_id(id).await;
        }
        self.patch(id, patch).await
    }

    /// Clear lockout bookkeeping and stamp the login time.
    pub async fn record_login_success(&self, id: Uuid, at: DateTime<Utc>) -> Result<User> {
        self.patch(
            id,
            row(json!({
                "last_login": at,
                "failed_login_attempts": 0,
                "locked_until": null,
            })),
        )
        .await
    }

    pub async fn record_login_failure(
        &self,
        id: Uuid,
        failed_attempts: i32,
        locked_until: Option<DateTime<Utc>>,
    ) -> Result<User> {
        self.patch(
            id,
            row(json!({
                "failed_login_attempts": failed_attempts,
                "locked_until": locked_until,
            })),
        )
        .await
    }

    pub async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<()> {
        self.patch(id, row(json!({ "password_hash": password_hash })))
            .await?;
        Ok(())
    }

    /// Delete user
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let deleted = self
            .store
            .delete(Table::Users, &[Filter::eq("id", id)])
            .await?;
        if deleted == 0 {
            return Err(DatabaseError::not_found("User", &id.to_string()));
        }
        Ok(())
    }

    async fn patch(&self, id: Uuid, patch: Row) -> Result<User> {
        let rows = self
            .store
            .update(Table::Users, patch, &[Filter::eq("id", id)])
            .await?;
        first_or_not_found(rows, "User", &id.to_string())
    }
}

fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}

fn details_from_row(mut row: Row) -> Result<UserDetails> {
    let role = take_object(&mut row, "role")
        .map(from_row::<Role>)
        .transpose()?;
    let groups = take_array(&mut row, "user_groups")
        .into_iter()
        .filter_map(|mut link| take_object(&mut link, "group"))
        .map(from_row::<Group>)
        .collect::<Result<Vec<_>>>()?;
    let user: User = from_row(row)?;

    Ok(UserDetails {
        profile: user.into(),
        role,
        groups,
    })
}
