use super::{first_or_not_found, take_array, take_object};
use crate::error::{DatabaseError, Result};
use crate::store::{from_row, from_rows, to_row, Embed, Filter, Query, Row, SharedStore, Table};
use sensicity_models::{Group, GroupMemberRef, GroupWithMembers, NewGroup, UserGroup};
use serde_json::json;
use uuid::Uuid;

#[derive(Clone)]
pub struct GroupRepository {
    store: SharedStore,
}

impl GroupRepository {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn create(&self, group: &NewGroup) -> Result<Group> {
        let row = self.store.insert(Table::Groups, to_row(group)?).await?;
        from_row(row)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Group> {
        let rows = self
            .store
            .select(&Query::table(Table::Groups).eq("id", id).limit(1))
            .await?;
        first_or_not_found(rows, "Group", &id.to_string())
    }

    /// Groups by name, each with its members' contact fields.
    pub async fn list_with_members(&self) -> Result<Vec<GroupWithMembers>> {
        let query = Query::table(Table::Groups)
            .order_by("name", true)
            .embed(
                Embed::many(Table::UserGroups, "id", "group_id").embed(
                    Embed::one(Table::Users, "user_id", "id")
                        .alias("user")
                        .columns(&["id", "first_name", "last_name", "email"]),
                ),
            );

        let rows = self.store.select(&query).await?;
        rows.into_iter().map(group_from_row).collect()
    }

    pub async fn groups_for_user(&self, user_id: Uuid) -> Result<Vec<Group>> {
        let query = Query::table(Table::UserGroups)
            .eq("user_id", user_id)
            .embed(Embed::one(Table::Groups, "group_id", "id").alias("group"));

        let rows = self.store.select(&query).await?;
        let groups = rows
            .into_iter()
            .filter_map(|mut row| take_object(&mut row, "group"))
            .collect();
        from_rows(groups)
    }

    /// Add a user to a group. Adding an existing member is a conflict.
    pub async fn add_member(
        &self,
        user_id: Uuid,
        group_id: i64,
        assigned_by: Option<Uuid>,
    ) -> Result<UserGroup> {
        let mut row = Row::new();
        row.insert("user_id".to_string(), json!(user_id));
        row.insert("group_id".to_string(), json!(group_id));
        row.insert("assigned_by".to_string(), json!(assigned_by));

        let row = self.store.insert(Table::UserGroups, row).await?;
        from_row(row)
    }

    pub async fn remove_member(&self, user_id: Uuid, group_id: i64) -> Result<()> {
        let removed = self
            .store
            .delete(
                Table::UserGroups,
                &[Filter::eq("user_id", user_id), Filter::eq("group_id", group_id)],
            )
            .await?;
        if removed == 0 {
            return Err(DatabaseError::NotFound(format!(
                "User {} is not a member of group {}",
                user_id, group_id
            )));
        }
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let deleted = self
            .store
            .delete(Table::Groups, &[Filter::eq("id", id)])
            .await?;
        if deleted == 0 {
            return Err(DatabaseError::not_found("Group", &id.to_string()));
        }
        Ok(())
    }
}

fn group_from_row(mut row: Row) -> Result<GroupWithMembers> {
    let users = take_array(&mut row, "user_groups")
        .into_iter()
        .filter_map(|mut link| take_object(&mut link, "user"))
        .map(from_row::<GroupMemberRef>)
        .collect::<Result<Vec<_>>>()?;

    Ok(GroupWithMembers {
        group: from_row(row)?,
        users,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    fn night_shift() -> NewGroup {
        NewGroup {
            name: "Night shift".to_string(),
            description: Some("Operators on the 22h-6h rota".to_string()),
            is_active: true,
            created_by: None,
        }
    }

    #[tokio::test]
    async fn test_membership() {
        let store = fixtures::memory_store();
        let alice = fixtures::seed_user(&store, "alice@sensicity.fr", None, "secret-pass")
            .await
            .unwrap();
        let repo = GroupRepository::new(store);
        let group = repo.create(&night_shift()).await.unwrap();

        repo.add_member(alice.id, group.id, None).await.unwrap();
        let err = repo.add_member(alice.id, group.id, None).await.unwrap_err();
        assert!(err.is_conflict());

        let listed = repo.list_with_members().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].users.len(), 1);
        assert_eq!(listed[0].users[0].email, "alice@sensicity.fr");

        let mine = repo.groups_for_user(alice.id).await.unwrap();
        assert_eq!(mine[0].name, "Night shift");

        repo.remove_member(alice.id, group.id).await.unwrap();
        assert!(matches!(
            repo.remove_member(alice.id, group.id).await.unwrap_err(),
            DatabaseError::NotFound(_)
        ));
        assert!(repo.list_with_members().await.unwrap()[0].users.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_group_name() {
        let repo = GroupRepository::new(fixtures::memory_store());
        repo.create(&night_shift()).await.unwrap();
        assert!(repo.create(&night_shift()).await.unwrap_err().is_conflict());
    }
}
