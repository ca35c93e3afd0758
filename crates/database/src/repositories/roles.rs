use super::first_or_not_found;
use super::users::{permissions_embed, role_from_tree};
use crate::error::{DatabaseError, Result};
use crate::store::{
    from_row, from_rows, select_one, to_row, Embed, Filter, Query, SharedStore, Table,
};
use sensicity_models::{
    NewPermission, NewRole, Permission, Role, RolePermission, RoleWithPermissions, UpdateRole,
};

#[derive(Clone)]
pub struct RoleRepository {
    store: SharedStore,
}

impl RoleRepository {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn create(&self, role: &NewRole) -> Result<Role> {
        let row = self.store.insert(Table::Roles, to_row(role)?).await?;
        from_row(row)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Role> {
        let rows = self
            .store
            .select(&Query::table(Table::Roles).eq("id", id).limit(1))
            .await?;
        first_or_not_found(rows, "Role", &id.to_string())
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Role> {
        let rows = self
            .store
            .select(&Query::table(Table::Roles).eq("name", name).limit(1))
            .await?;
        first_or_not_found(rows, "Role", name)
    }

    pub async fn list(&self) -> Result<Vec<Role>> {
        let rows = self
            .store
            .select(&Query::table(Table::Roles).order_by("name", true))
            .await?;
        from_rows(rows)
    }

    /// Every role with its permission set, by name.
    pub async fn list_with_permissions(&self) -> Result<Vec<RoleWithPermissions>> {
        let query = Query::table(Table::Roles)
            .order_by("name", true)
            .embed(permissions_embed());

        let rows = self.store.select(&query).await?;
        rows.into_iter().map(role_from_tree).collect()
    }

    pub async fn find_with_permissions(&self, id: i64) -> Result<RoleWithPermissions> {
        let query = Query::table(Table::Roles)
            .eq("id", id)
            .embed(permissions_embed());

        let row = select_one(self.store.as_ref(), query)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Role", &id.to_string()))?;
        role_from_tree(row)
    }

    pub async fn update(&self, id: i64, update: &UpdateRole) -> Result<Role> {
        let patch = to_row(update)?;
        if patch.is_empty() {
            return self.find_by_id(id).await;
        }
        let rows = self
            .store
            .update(Table::Roles, patch, &[Filter::eq("id", id)])
            .await?;
        first_or_not_found(rows, "Role", &id.to_string())
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let deleted = self
            .store
            .delete(Table::Roles, &[Filter::eq("id", id)])
            .await?;
        if deleted == 0 {
            return Err(DatabaseError::not_found("Role", &id.to_string()));
        }
        Ok(())
    }

    /// The permission catalog, by name.
    pub async fn permissions(&self) -> Result<Vec<Permission>> {
        let rows = self
            .store
            .select(&Query::table(Table::Permissions).order_by("name", true))
            .await?;
        from_rows(rows)
    }

    /// Insert a catalog entry, or return the existing one with that name.
    pub async fn ensure_permission(&self, permission: &NewPermission) -> Result<Permission> {
        let existing = select_one(
            self.store.as_ref(),
            Query::table(Table::Permissions).eq("name", &permission.name),
        )
        .await?;
        if let Some(row) = existing {
            return from_row(row);
        }

        let row = self
            .store
            .insert(Table::Permissions, to_row(permission)?)
            .await?;
        from_row(row)
    }

    /// Grant a permission to a role. Granting twice is a no-op.
    pub async fn assign_permission(&self, role_id: i64, permission_id: i64) -> Result<()> {
        let link = RolePermission {
            role_id,
            permission_id,
        };
        match self.store.insert(Table::RolePermissions, to_row(&link)?).await {
            Ok(_) | Err(DatabaseError::DuplicateEntry(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub async fn revoke_permission(&self, role_id: i64, permission_id: i64) -> Result<bool> {
        let removed = self
            .store
            .delete(
                Table::RolePermissions,
                &[
                    Filter::eq("role_id", role_id),
                    Filter::eq("permission_id", permission_id),
                ],
            )
            .await?;
        Ok(removed > 0)
    }

    pub async fn permissions_for_role(&self, role_id: i64) -> Result<Vec<Permission>> {
        let query = Query::table(Table::RolePermissions)
            .eq("role_id", role_id)
            .embed(Embed::one(Table::Permissions, "permission_id", "id").alias("permission"));

        let rows = self.store.select(&query).await?;
        let mut permissions = rows
            .into_iter()
            .filter_map(|mut row| super::take_object(&mut row, "permission"))
            .map(from_row::<Permission>)
            .collect::<Result<Vec<_>>>()?;
        permissions.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(permissions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[tokio::test]
    async fn test_ensure_permission_is_idempotent() {
        let repo = RoleRepository::new(fixtures::memory_store());
        let new = NewPermission::from_name("equipment.read", Some("View equipment")).unwrap();

        let first = repo.ensure_permission(&new).await.unwrap();
        let second = repo.ensure_permission(&new).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(repo.permissions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_assign_and_revoke() {
        let store = fixtures::memory_store();
        let repo = RoleRepository::new(store.clone());
        let role = repo
            .create(&NewRole {
                name: "Operator".to_string(),
                description: None,
                is_active: true,
            })
            .await
            .unwrap();
        let read = repo
            .ensure_permission(&NewPermission::from_name("logbook.read", None).unwrap())
            .await
            .unwrap();
        let create = repo
            .ensure_permission(&NewPermission::from_name("logbook.create", None).unwrap())
            .await
            .unwrap();

        repo.assign_permission(role.id, read.id).await.unwrap();
        repo.assign_permission(role.id, read.id).await.unwrap();
        repo.assign_permission(role.id, create.id).await.unwrap();

        let names: Vec<String> = repo
            .permissions_for_role(role.id)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["logbook.create", "logbook.read"]);

        assert!(repo.revoke_permission(role.id, create.id).await.unwrap());
        assert!(!repo.revoke_permission(role.id, create.id).await.unwrap());

        let full = repo.find_with_permissions(role.id).await.unwrap();
        assert_eq!(full.permission_names().collect::<Vec<_>>(), vec!["logbook.read"]);
    }

    #[tokio::test]
    async fn test_list_with_permissions_includes_empty_roles() {
        let store = fixtures::memory_store();
        fixtures::seed_role(&store, "Administrator", &["equipment.read", "equipment.delete"])
            .await
            .unwrap();
        fixtures::seed_role(&store, "Visitor", &[]).await.unwrap();

        let roles = RoleRepository::new(store).list_with_permissions().await.unwrap();
        assert_eq!(roles.len(), 2);
        assert_eq!(roles[0].role.name, "Administrator");
        assert_eq!(roles[0].permissions.len(), 2);
        assert!(roles[1].permissions.is_empty());
    }
}
