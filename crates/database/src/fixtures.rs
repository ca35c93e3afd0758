//! Builders and seeders for tests against the in-memory store.

use crate::error::Result;
use crate::repositories::{roles::RoleRepository, users::UserRepository};
use crate::store::{MemoryStore, SharedStore};
use chrono::{DateTime, NaiveDate, Utc};
use sensicity_models::{
    ConformityStatus, EntryStatus, EntryType, EquipmentStatus, EquipmentType, NewEquipment,
    NewLogbookEntry, NewPermission, NewRole, NewUser, Priority, Role, User, UserStatus,
};
use std::sync::Arc;
use uuid::Uuid;

pub fn memory_store() -> SharedStore {
    Arc::new(MemoryStore::new())
}

pub fn new_user(email: &str, role_id: Option<i64>) -> NewUser {
    let local = email.split('@').next().unwrap_or(email);
    let (first, last) = local.split_once('.').unwrap_or((local, "Test"));
    NewUser {
        first_name: first.to_string(),
        last_name: last.to_string(),
        email: email.to_string(),
        phone: None,
        department: None,
        role_id,
        status: UserStatus::Active,
        is_active: true,
        email_verified: true,
    }
}

/// Role holding exactly `permissions`; catalog rows are created as needed.
pub async fn seed_role(store: &SharedStore, name: &str, permissions: &[&str]) -> Result<Role> {
    let roles = RoleRepository::new(store.clone());
    let role = roles
        .create(&NewRole {
            name: name.to_string(),
            description: None,
            is_active: true,
        })
        .await?;

    for name in permissions {
        if let Some(new) = NewPermission::from_name(name, None) {
            let permission = roles.ensure_permission(&new).await?;
            roles.assign_permission(role.id, permission.id).await?;
        }
    }
    Ok(role)
}

pub async fn seed_user(
    store: &SharedStore,
    email: &str,
    role_id: Option<i64>,
    password_hash: &str,
) -> Result<User> {
    UserRepository::new(store.clone())
        .create(&new_user(email, role_id), Some(password_hash))
        .await
}

pub fn new_camera(name: &str) -> NewEquipment {
    NewEquipment {
        name: name.to_string(),
        equipment_type: EquipmentType::Camera,
        model: "Axis Q6135-LE".to_string(),
        status: EquipmentStatus::Active,
        latitude: 45.7640,
        longitude: 4.8357,
        installation_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap_or_default(),
        last_maintenance: None,
        conformity_status: ConformityStatus::Pending,
    }
}

pub fn new_entry(author: Uuid, at: DateTime<Utc>, description: &str) -> NewLogbookEntry {
    NewLogbookEntry {
        timestamp: at,
        entry_type: EntryType::Incident,
        description: description.to_string(),
        user_id: author,
        equipment_id: None,
        is_judicial_requisition: false,
        event_type: "intrusion".to_string(),
        priority: Priority::Medium,
        location: Some("Depot Nord".to_string()),
        status: EntryStatus::New,
    }
}
