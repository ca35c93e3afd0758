use crate::error::{AuthzError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Names of every permission the application checks.
pub mod catalog {
    pub const EQUIPMENT_READ: &str = "equipment.read";
    pub const EQUIPMENT_CREATE: &str = "equipment.create";
    pub const EQUIPMENT_UPDATE: &str = "equipment.update";
    pub const EQUIPMENT_DELETE: &str = "equipment.delete";
    pub const EQUIPMENT_IMPORT: &str = "equipment.import";
    pub const EQUIPMENT_EXPORT: &str = "equipment.export";

    pub const LOGBOOK_READ: &str = "logbook.read";
    pub const LOGBOOK_CREATE: &str = "logbook.create";
    pub const LOGBOOK_UPDATE: &str = "logbook.update";
    pub const LOGBOOK_DELETE: &str = "logbook.delete";

    pub const USERS_READ: &str = "users.read";
    pub const USERS_CREATE: &str = "users.create";
    pub const USERS_UPDATE: &str = "users.update";
    pub const USERS_DELETE: &str = "users.delete";

    pub const ROLES_READ: &str = "roles.read";
    pub const ROLES_MANAGE: &str = "roles.manage";

    pub const GROUPS_READ: &str = "groups.read";
    pub const GROUPS_MANAGE: &str = "groups.manage";

    pub const AUDIT_READ: &str = "audit.read";

    /// `(name, description)` for every entry, as seeded into `permissions`.
    pub const ALL: &[(&str, &str)] = &[
        (EQUIPMENT_READ, "View the equipment inventory"),
        (EQUIPMENT_CREATE, "Register new equipment"),
        (EQUIPMENT_UPDATE, "Edit equipment records"),
        (EQUIPMENT_DELETE, "Remove equipment"),
        (EQUIPMENT_IMPORT, "Import equipment from spreadsheets"),
        (EQUIPMENT_EXPORT, "Export the inventory"),
        (LOGBOOK_READ, "View the logbook"),
        (LOGBOOK_CREATE, "Write logbook entries and actions"),
        (LOGBOOK_UPDATE, "Edit logbook entries"),
        (LOGBOOK_DELETE, "Delete logbook entries"),
        (USERS_READ, "View user accounts"),
        (USERS_CREATE, "Create user accounts"),
        (USERS_UPDATE, "Edit user accounts"),
        (USERS_DELETE, "Delete user accounts"),
        (ROLES_READ, "View roles and their permissions"),
        (ROLES_MANAGE, "Edit roles and their permissions"),
        (GROUPS_READ, "View groups"),
        (GROUPS_MANAGE, "Create groups and manage membership"),
        (AUDIT_READ, "View the audit trail"),
    ];

    pub fn names() -> impl Iterator<Item = &'static str> {
        ALL.iter().map(|(name, _)| *name)
    }

    pub fn contains(name: &str) -> bool {
        names().any(|n| n == name)
    }
}

/// Effective permissions of one user. Checks are exact name matches; there
/// is no hierarchy and no wildcard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet {
    names: BTreeSet<String>,
}

impl PermissionSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn full_catalog() -> Self {
        catalog::names().collect()
    }

    pub fn has(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// False for an empty list.
    pub fn has_any(&self, names: &[&str]) -> bool {
        names.iter().any(|n| self.has(n))
    }

    pub fn has_all(&self, names: &[&str]) -> bool {
        names.iter().all(|n| self.has(n))
    }

    pub fn require(&self, name: &str) -> Result<()> {
        if self.has(name) {
            Ok(())
        } else {
            Err(AuthzError::unauthorized(name))
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(Into::into).collect(),
        }
    }
}
