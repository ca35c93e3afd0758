use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sensicity_authz::{PermissionEvaluator, PermissionSet};
use sensicity_models::UserProfile;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use uuid::Uuid;

/// An authenticated user and the permissions loaded for them.
///
/// The permission set is a snapshot: role changes made elsewhere are only
/// picked up by [`Session::refresh`].
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    user: UserProfile,
    permissions: PermissionSet,
    loaded_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user: UserProfile, permissions: PermissionSet) -> Self {
        Self {
            user,
            permissions,
            loaded_at: Utc::now(),
        }
    }

    pub fn user(&self) -> &UserProfile {
        &self.user
    }

    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    pub fn permissions(&self) -> &PermissionSet {
        &self.permissions
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn has_permission(&self, name: &str) -> bool {
        self.permissions.has(name)
    }

    pub fn has_any_permission(&self, names: &[&str]) -> bool {
        self.permissions.has_any(names)
    }

    pub fn has_all_permissions(&self, names: &[&str]) -> bool {
        self.permissions.has_all(names)
    }

    pub fn require(&self, name: &str) -> sensicity_authz::Result<()> {
        self.permissions.require(name)
    }

    /// Reload profile and permissions. On failure the previous snapshot is
    /// kept and the error returned.
    pub async fn refresh(&mut self, evaluator: &PermissionEvaluator) -> Result<()> {
        let (user, permissions) = evaluator.load_user(self.user.id).await?;
        self.user = user;
        self.permissions = permissions;
        self.loaded_at = Utc::now();
        Ok(())
    }

    pub fn mirror(&self) -> SessionMirror {
        SessionMirror {
            user_id: self.user.id,
            email: self.user.email.clone(),
            saved_at: Utc::now(),
        }
    }
}

/// What is persisted locally to restore a session: identity only, never
/// credentials or permissions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMirror {
    pub user_id: Uuid,
    pub email: String,
    pub saved_at: DateTime<Utc>,
}

/// Local persistence for the session mirror. Last writer wins.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> Result<Option<SessionMirror>>;
    async fn save(&self, mirror: &SessionMirror) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// JSON file holding a single mirror.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> Result<Option<SessionMirror>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice(&bytes) {
            Ok(mirror) => Ok(Some(mirror)),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Discarding unreadable session file");
                self.clear().await?;
                Ok(None)
            }
        }
    }

    async fn save(&self, mirror: &SessionMirror) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_vec_pretty(mirror)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    mirror: RwLock<Option<SessionMirror>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Result<Option<SessionMirror>> {
        Ok(self.mirror.read().await.clone())
    }

    async fn save(&self, mirror: &SessionMirror) -> Result<()> {
        *self.mirror.write().await = Some(mirror.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.mirror.write().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensicity_authz::{catalog, PermissionPolicy};
    use sensicity_database::{fixtures, DatabaseError, MemoryStore, RoleRepository, SharedStore};
    use std::sync::Arc;

    fn mirror() -> SessionMirror {
        SessionMirror {
            user_id: Uuid::new_v4(),
            email: "ops@sensicity.fr".to_string(),
            saved_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("nested").join("session.json"));

        assert!(store.load().await.unwrap().is_none());
        let saved = mirror();
        store.save(&saved).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(saved));

        store.clear().await.unwrap();
        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_discards_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let store = FileSessionStore::new(&path);
        assert!(store.load().await.unwrap().is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_memory_store_last_writer_wins() {
        let store = MemorySessionStore::new();
        let first = mirror();
        let second = mirror();
        store.save(&first).await.unwrap();
        store.save(&second).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn test_refresh_picks_up_role_changes() {
        let store = fixtures::memory_store();
        let role = fixtures::seed_role(&store, "Operator", &[catalog::LOGBOOK_READ])
            .await
            .unwrap();
        let user = fixtures::seed_user(&store, "op@sensicity.fr", Some(role.id), "x")
            .await
            .unwrap();
        let evaluator = PermissionEvaluator::new(store.clone(), PermissionPolicy::Strict);
        let (profile, perms) = evaluator.load_user(user.id).await.unwrap();
        let mut session = Session::new(profile, perms);

        let roles = RoleRepository::new(store);
        let create = roles
            .ensure_permission(
                &sensicity_models::NewPermission::from_name(catalog::LOGBOOK_CREATE, None).unwrap(),
            )
            .await
            .unwrap();
        roles.assign_permission(role.id, create.id).await.unwrap();

        // Stale until refreshed
        assert!(!session.has_permission(catalog::LOGBOOK_CREATE));
        session.refresh(&evaluator).await.unwrap();
        assert!(session.has_permission(catalog::LOGBOOK_CREATE));
        assert!(session.has_all_permissions(&[catalog::LOGBOOK_READ, catalog::LOGBOOK_CREATE]));
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_set() {
        let memory = Arc::new(MemoryStore::new());
        let store: SharedStore = memory.clone();
        let role = fixtures::seed_role(&store, "Operator", &[catalog::LOGBOOK_READ])
            .await
            .unwrap();
        let user = fixtures::seed_user(&store, "op@sensicity.fr", Some(role.id), "x")
            .await
            .unwrap();
        let evaluator = PermissionEvaluator::new(store, PermissionPolicy::Strict);
        let (profile, perms) = evaluator.load_user(user.id).await.unwrap();
        let mut session = Session::new(profile, perms.clone());

        memory
            .fail_next(DatabaseError::ConnectionFailed("timeout".to_string()))
            .await;
        assert!(session.refresh(&evaluator).await.is_err());
        assert_eq!(session.permissions(), &perms);
        assert!(session.has_any_permission(&[catalog::LOGBOOK_READ]));
    }
}
