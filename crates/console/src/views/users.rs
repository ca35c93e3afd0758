use super::{contains_term, record_audit, require, search_term, Choice, ViewState};
use crate::error::Result;
use sensicity_auth::{PasswordHasher, Session};
use sensicity_authz::catalog;
use sensicity_database::{AuditRepository, GroupRepository, RoleRepository, SharedStore, UserRepository};
use sensicity_models::{
    AuditLogBuilder, Group, GroupMemberRef, GroupWithMembers, NewGroup, NewUser, Role,
    RoleWithPermissions, UpdateUser, UserDetails, UserGroup, UserProfile, UserStatus,
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    /// Matched against first name, last name and email.
    pub search: String,
    pub role: Choice<i64>,
    pub status: Choice<UserStatus>,
    pub group: Choice<i64>,
}

impl UserFilter {
    pub fn matches(&self, user: &UserDetails) -> bool {
        let profile = &user.profile;
        let search_ok = match search_term(&self.search) {
            Some(term) => {
                contains_term(&profile.first_name, &term)
                    || contains_term(&profile.last_name, &term)
                    || contains_term(&profile.email, &term)
            }
            None => true,
        };
        let role_ok = match self.role {
            Choice::All => true,
            Choice::Only(id) => profile.role_id == Some(id),
        };
        let group_ok = match self.group {
            Choice::All => true,
            Choice::Only(id) => user.groups.iter().any(|g| g.id == id),
        };

        search_ok && role_ok && group_ok && self.status.matches(&profile.status)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserStats {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
    pub suspended: usize,
    pub pending: usize,
}

/// Users, roles and groups administration screen.
pub struct UsersView {
    users: UserRepository,
    roles: RoleRepository,
    groups: GroupRepository,
    audit: AuditRepository,
    hasher: PasswordHasher,
    user_list: Vec<UserDetails>,
    role_list: Vec<RoleWithPermissions>,
    group_list: Vec<GroupWithMembers>,
    state: ViewState,
}

impl UsersView {
    pub fn new(store: SharedStore, hasher: PasswordHasher) -> Self {
        Self {
            users: UserRepository::new(store.clone()),
            roles: RoleRepository::new(store.clone()),
            groups: GroupRepository::new(store.clone()),
            audit: AuditRepository::new(store),
            hasher,
            user_list: Vec::new(),
            role_list: Vec::new(),
            group_list: Vec::new(),
            state: ViewState::default(),
        }
    }

    pub fn users(&self) -> &[UserDetails] {
        &self.user_list
    }

    pub fn roles(&self) -> &[RoleWithPermissions] {
        &self.role_list
    }

    pub fn groups(&self) -> &[GroupWithMembers] {
        &self.group_list
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ViewState {
        &mut self.state
    }

    pub fn can_read(session: &Session) -> bool {
        session.has_permission(catalog::USERS_READ)
    }

    pub fn can_create(session: &Session) -> bool {
        session.has_permission(catalog::USERS_CREATE)
    }

    pub fn can_update(session: &Session) -> bool {
        session.has_permission(catalog::USERS_UPDATE)
    }

    pub fn can_delete(session: &Session) -> bool {
        session.has_permission(catalog::USERS_DELETE)
    }

    pub fn can_manage_groups(session: &Session) -> bool {
        session.has_permission(catalog::GROUPS_MANAGE)
    }

    /// Users with role and groups, roles with permissions, groups with members.
    pub async fn load(&mut self, session: &Session) -> Result<()> {
        self.state.begin(true);
        let result: Result<_> = async {
            require(session, catalog::USERS_READ)?;
            let users = self.users.list_detailed().await?;
            let roles = self.roles.list_with_permissions().await?;
            let groups = self.groups.list_with_members().await?;
            Ok((users, roles, groups))
        }
        .await;

        let (users, roles, groups) = self.state.settle("users.load", result)?;
        tracing::debug!(
            users = users.len(),
            roles = roles.len(),
            groups = groups.len(),
            "User administration loaded"
        );
        self.user_list = users;
        self.role_list = roles;
        self.group_list = groups;
        Ok(())
    }

    pub fn filtered(&self, filter: &UserFilter) -> Vec<&UserDetails> {
        self.user_list.iter().filter(|u| filter.matches(u)).collect()
    }

    pub fn stats<'a>(users: impl IntoIterator<Item = &'a UserDetails>) -> UserStats {
        users.into_iter().fold(UserStats::default(), |mut stats, user| {
            stats.total += 1;
            match user.profile.status {
                UserStatus::Active => stats.active += 1,
                UserStatus::Inactive => stats.inactive += 1,
                UserStatus::Suspended => stats.suspended += 1,
                UserStatus::Pending => stats.pending += 1,
            }
            stats
        })
    }

    /// Create an account with a generated temporary password. The password
    /// is returned once and only its hash is stored.
    pub async fn create_user(
        &mut self,
        session: &Session,
        new_user: NewUser,
    ) -> Result<(UserDetails, String)> {
        self.state.begin(false);
        let result: Result<_> = async {
            require(session, catalog::USERS_CREATE)?;
            let new_user = new_user.normalized();
            new_user.validate()?;

            let temporary_password = self.hasher.generate_temporary();
            let hash = self.hasher.hash(&temporary_password)?;
            let user = self.users.create(&new_user, Some(&hash)).await?;
            Ok((UserProfile::from(user), temporary_password))
        }
        .await;

        let (profile, temporary_password) = self.state.settle("users.create", result)?;
        tracing::info!(user_id = %profile.id, email = %profile.email, "User created");
        record_audit(
            &self.audit,
            AuditLogBuilder::new("user.create", "user", profile.id.to_string())
                .actor(Some(session.user_id()))
                .new_values(&profile),
        )
        .await;

        let details = UserDetails {
            role: self.role_named_by(profile.role_id),
            profile,
            groups: Vec::new(),
        };
        self.user_list.insert(0, details.clone());
        Ok((details, temporary_password))
    }

    pub async fn update_user(
        &mut self,
        session: &Session,
        id: Uuid,
        update: UpdateUser,
    ) -> Result<UserDetails> {
        self.state.begin(false);
        let result: Result<UserProfile> = async {
            require(session, catalog::USERS_UPDATE)?;
            let update = update.normalized();
            update.validate()?;
            Ok(self.users.update(id, &update).await?.into())
        }
        .await;

        let profile = self.state.settle("users.update", result)?;
        let previous = self.user_list.iter().position(|u| u.profile.id == id);
        record_audit(
            &self.audit,
            AuditLogBuilder::new("user.update", "user", id.to_string())
                .actor(Some(session.user_id()))
                .old_values(&previous.map(|i| &self.user_list[i].profile))
                .new_values(&profile),
        )
        .await;

        let details = UserDetails {
            role: self.role_named_by(profile.role_id),
            groups: previous
                .map(|i| self.user_list[i].groups.clone())
                .unwrap_or_default(),
            profile,
        };
        match previous {
            Some(i) => self.user_list[i] = details.clone(),
            None => self.user_list.insert(0, details.clone()),
        }
        Ok(details)
    }

    /// Remove the account. Logbook entries and audit rows written by the
    /// user stay in place.
    pub async fn delete_user(&mut self, session: &Session, id: Uuid) -> Result<()> {
        self.state.begin(false);
        let result: Result<()> = async {
            require(session, catalog::USERS_DELETE)?;
            Ok(self.users.delete(id).await?)
        }
        .await;

        self.state.settle("users.delete", result)?;
        let previous = self.user_list.iter().find(|u| u.profile.id == id);
        record_audit(
            &self.audit,
            AuditLogBuilder::new("user.delete", "user", id.to_string())
                .actor(Some(session.user_id()))
                .old_values(&previous.map(|u| &u.profile)),
        )
        .await;

        self.user_list.retain(|u| u.profile.id != id);
        for group in &mut self.group_list {
            group.users.retain(|m| m.id != id);
        }
        tracing::info!(user_id = %id, "User deleted");
        Ok(())
    }

    pub async fn create_group(&mut self, session: &Session, group: NewGroup) -> Result<GroupWithMembers> {
        self.state.begin(false);
        let result: Result<Group> = async {
            require(session, catalog::GROUPS_MANAGE)?;
            let mut group = group.normalized();
            group.created_by = Some(session.user_id());
            group.validate()?;
            Ok(self.groups.create(&group).await?)
        }
        .await;

        let group = self.state.settle("groups.create", result)?;
        tracing::info!(group_id = group.id, name = %group.name, "Group created");
        record_audit(
            &self.audit,
            AuditLogBuilder::new("group.create", "group", group.id.to_string())
                .actor(Some(session.user_id()))
                .new_values(&group),
        )
        .await;

        let entry = GroupWithMembers {
            group,
            users: Vec::new(),
        };
        self.group_list.push(entry.clone());
        self.group_list.sort_by(|a, b| a.group.name.cmp(&b.group.name));
        Ok(entry)
    }

    pub async fn assign_user_to_group(
        &mut self,
        session: &Session,
        user_id: Uuid,
        group_id: i64,
    ) -> Result<UserGroup> {
        self.state.begin(false);
        let result: Result<UserGroup> = async {
            require(session, catalog::GROUPS_MANAGE)?;
            Ok(self
                .groups
                .add_member(user_id, group_id, Some(session.user_id()))
                .await?)
        }
        .await;

        let membership = self.state.settle("groups.assign", result)?;
        record_audit(
            &self.audit,
            AuditLogBuilder::new("group.add_member", "group", group_id.to_string())
                .actor(Some(session.user_id()))
                .new_values(&membership),
        )
        .await;

        let group = self
            .group_list
            .iter()
            .find(|g| g.group.id == group_id)
            .map(|g| g.group.clone());
        if let Some(user) = self.user_list.iter_mut().find(|u| u.profile.id == user_id) {
            if let Some(group) = group {
                user.groups.push(group);
            }
            let member = GroupMemberRef {
                id: user.profile.id,
                first_name: user.profile.first_name.clone(),
                last_name: user.profile.last_name.clone(),
                email: user.profile.email.clone(),
            };
            if let Some(entry) = self.group_list.iter_mut().find(|g| g.group.id == group_id) {
                entry.users.push(member);
            }
        }
        Ok(membership)
    }

    pub async fn remove_user_from_group(
        &mut self,
        session: &Session,
        user_id: Uuid,
        group_id: i64,
    ) -> Result<()> {
        self.state.begin(false);
        let result: Result<()> = async {
            require(session, catalog::GROUPS_MANAGE)?;
            Ok(self.groups.remove_member(user_id, group_id).await?)
        }
        .await;

        self.state.settle("groups.remove", result)?;
        record_audit(
            &self.audit,
            AuditLogBuilder::new("group.remove_member", "group", group_id.to_string())
                .actor(Some(session.user_id()))
                .old_values(&serde_json::json!({ "user_id": user_id, "group_id": group_id })),
        )
        .await;

        if let Some(user) = self.user_list.iter_mut().find(|u| u.profile.id == user_id) {
            user.groups.retain(|g| g.id != group_id);
        }
        if let Some(entry) = self.group_list.iter_mut().find(|g| g.group.id == group_id) {
            entry.users.retain(|m| m.id != user_id);
        }
        Ok(())
    }

    fn role_named_by(&self, role_id: Option<i64>) -> Option<Role> {
        let role_id = role_id?;
        self.role_list
            .iter()
            .find(|r| r.role.id == role_id)
            .map(|r| r.role.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ViewError;
    use crate::views::test_support::session_with;
    use sensicity_database::{fixtures, DatabaseError, LogbookRepository, MemoryStore, Table};
    use std::sync::Arc;

    fn admin_permissions() -> Vec<&'static str> {
        vec![
            catalog::USERS_READ,
            catalog::USERS_CREATE,
            catalog::USERS_UPDATE,
            catalog::USERS_DELETE,
            catalog::GROUPS_MANAGE,
        ]
    }

    fn new_group(name: &str) -> NewGroup {
        NewGroup {
            name: name.to_string(),
            description: None,
            is_active: true,
            created_by: None,
        }
    }

    #[tokio::test]
    async fn test_create_user_returns_usable_temporary_password() {
        let store = fixtures::memory_store();
        let role = fixtures::seed_role(&store, "Operator", &[catalog::LOGBOOK_READ])
            .await
            .unwrap();
        let admin = session_with(&store, "admin@sensicity.fr", &admin_permissions()).await;
        let mut view = UsersView::new(store.clone(), PasswordHasher::default());
        view.load(&admin).await.unwrap();

        let (details, password) = view
            .create_user(&admin, fixtures::new_user("  agent@sensicity.fr ", Some(role.id)))
            .await
            .unwrap();

        assert_eq!(details.profile.email, "agent@sensicity.fr");
        assert_eq!(details.role.as_ref().map(|r| r.name.as_str()), Some("Operator"));
        assert!(PasswordHasher::default().validate_password(&password).is_ok());

        let stored = UserRepository::new(store.clone())
            .find_by_id(details.profile.id)
            .await
            .unwrap();
        let hash = stored.password_hash.unwrap();
        assert_ne!(hash, password);
        assert!(PasswordHasher::verify(&password, &hash).unwrap());

        let audit = AuditRepository::new(store)
            .list_for_target("user", &details.profile.id.to_string())
            .await
            .unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].action, "user.create");
        assert_eq!(audit[0].user_id, Some(admin.user_id()));
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let store = fixtures::memory_store();
        let admin = session_with(&store, "admin@sensicity.fr", &admin_permissions()).await;
        let mut view = UsersView::new(store, PasswordHasher::default());

        let err = view
            .create_user(&admin, fixtures::new_user("admin@sensicity.fr", None))
            .await
            .unwrap_err();
        assert!(matches!(err, ViewError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_invalid_email_reported_per_field() {
        let store = fixtures::memory_store();
        let admin = session_with(&store, "admin@sensicity.fr", &admin_permissions()).await;
        let mut view = UsersView::new(store, PasswordHasher::default());

        let err = view
            .create_user(&admin, fixtures::new_user("not-an-email", None))
            .await
            .unwrap_err();
        match err {
            ViewError::Validation(fields) => assert!(fields.contains_key("email")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delete_user_keeps_logbook() {
        let store = fixtures::memory_store();
        let admin = session_with(&store, "admin@sensicity.fr", &admin_permissions()).await;
        let agent = fixtures::seed_user(&store, "agent@sensicity.fr", None, "x")
            .await
            .unwrap();
        let logbook = LogbookRepository::new(store.clone());
        let entry = logbook
            .create(&fixtures::new_entry(agent.id, chrono::Utc::now(), "Patrouille"))
            .await
            .unwrap();

        let mut view = UsersView::new(store, PasswordHasher::default());
        view.load(&admin).await.unwrap();
        view.delete_user(&admin, agent.id).await.unwrap();

        assert!(view.users().iter().all(|u| u.profile.id != agent.id));
        assert!(logbook.find_by_id(entry.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_group_membership_and_filters() {
        let store = fixtures::memory_store();
        let admin = session_with(&store, "admin@sensicity.fr", &admin_permissions()).await;
        let agent = fixtures::seed_user(&store, "agent@sensicity.fr", None, "x")
            .await
            .unwrap();
        let mut view = UsersView::new(store, PasswordHasher::default());
        view.load(&admin).await.unwrap();

        let night = view.create_group(&admin, new_group(" Night shift ")).await.unwrap();
        assert_eq!(night.group.name, "Night shift");
        assert_eq!(night.group.created_by, Some(admin.user_id()));

        view.assign_user_to_group(&admin, agent.id, night.group.id)
            .await
            .unwrap();
        let err = view
            .assign_user_to_group(&admin, agent.id, night.group.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ViewError::Conflict(_)));

        let filter = UserFilter {
            group: Choice::Only(night.group.id),
            ..Default::default()
        };
        let members = view.filtered(&filter);
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].profile.id, agent.id);
        assert_eq!(view.groups()[0].users.len(), 1);

        view.remove_user_from_group(&admin, agent.id, night.group.id)
            .await
            .unwrap();
        assert!(view.filtered(&filter).is_empty());
        assert!(view.groups()[0].users.is_empty());

        let filter = UserFilter {
            search: "AGENT@".to_string(),
            ..Default::default()
        };
        assert_eq!(view.filtered(&filter).len(), 1);
    }

    #[tokio::test]
    async fn test_update_user_and_stats() {
        let store = fixtures::memory_store();
        let admin = session_with(&store, "admin@sensicity.fr", &admin_permissions()).await;
        let agent = fixtures::seed_user(&store, "agent@sensicity.fr", None, "x")
            .await
            .unwrap();
        let mut view = UsersView::new(store.clone(), PasswordHasher::default());
        view.load(&admin).await.unwrap();

        let updated = view
            .update_user(
                &admin,
                agent.id,
                UpdateUser {
                    status: Some(UserStatus::Suspended),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.profile.status, UserStatus::Suspended);

        let stats = UsersView::stats(view.users());
        assert_eq!(stats.total, 2);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.suspended, 1);

        let filter = UserFilter {
            status: Choice::Only(UserStatus::Suspended),
            ..Default::default()
        };
        assert_eq!(view.filtered(&filter)[0].profile.id, agent.id);

        let audit = AuditRepository::new(store)
            .list_for_target("user", &agent.id.to_string())
            .await
            .unwrap();
        assert_eq!(audit[0].action, "user.update");
        assert!(audit[0].old_values.is_some());
    }

    #[tokio::test]
    async fn test_audit_failure_is_not_surfaced() {
        let memory = Arc::new(MemoryStore::new());
        let store: SharedStore = memory.clone();
        let admin = session_with(&store, "admin@sensicity.fr", &admin_permissions()).await;
        let mut view = UsersView::new(store, PasswordHasher::default());

        memory
            .fail_on(
                Table::AuditLogs,
                DatabaseError::ConnectionFailed("timeout".to_string()),
            )
            .await;
        let group = view.create_group(&admin, new_group("Supervisors")).await.unwrap();
        assert_eq!(group.group.name, "Supervisors");
        assert!(view.state().last_error().is_none());
        assert_eq!(memory.row_count(Table::AuditLogs).await, 0);
    }

    #[tokio::test]
    async fn test_permissions_gate_every_write() {
        let store = fixtures::memory_store();
        let reader = session_with(&store, "dpo@sensicity.fr", &[catalog::USERS_READ]).await;
        let mut view = UsersView::new(store, PasswordHasher::default());
        view.load(&reader).await.unwrap();

        assert!(!UsersView::can_create(&reader));
        assert!(!UsersView::can_manage_groups(&reader));
        assert!(matches!(
            view.create_group(&reader, new_group("x")).await,
            Err(ViewError::Unauthorized(_))
        ));
        assert!(matches!(
            view.delete_user(&reader, reader.user_id()).await,
            Err(ViewError::Unauthorized(_))
        ));
    }
}
