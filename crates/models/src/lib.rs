#[macro_use]
mod macros;

// Access control
pub mod user;
pub mod role;
pub mod permission;
pub mod group;
pub mod audit;

// Fleet records
pub mod equipment;
pub mod logbook;

// Re-export commonly used types
pub use user::{User, NewUser, UpdateUser, UserDetails, UserProfile, UserStatus};
pub use role::{Role, NewRole, UpdateRole, RoleWithPermissions};
pub use permission::{Permission, NewPermission, RolePermission};
pub use group::{Group, NewGroup, UserGroup, GroupWithMembers, GroupMemberRef};
pub use audit::{AuditLog, CreateAuditLog, AuditLogBuilder};
pub use equipment::{
    Equipment, NewEquipment, UpdateEquipment,
    EquipmentType, EquipmentStatus, ConformityStatus,
};
pub use logbook::{
    LogbookEntry, NewLogbookEntry, UpdateLogbookEntry,
    LogbookAction, NewLogbookAction, VideoBookmark, NewVideoBookmark,
    EntryType, Priority, EntryStatus,
};

use std::collections::BTreeMap;

/// Error returned when parsing one of the string enums from user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl std::fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {} value: {:?}", self.kind, self.value)
    }
}

impl std::error::Error for ParseEnumError {}

/// Field name -> human readable messages, as shown next to form inputs.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Flatten `validator` output into per-field messages.
///
/// Rules without an explicit `message` fall back to their code.
pub fn field_errors(errors: &validator::ValidationErrors) -> FieldErrors {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let messages = errs
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                })
                .collect();
            (field.to_string(), messages)
        })
        .collect()
}

/// Trim a required text field in place.
pub(crate) fn trim_in_place(value: &mut String) {
    let trimmed = value.trim();
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
}

/// Trim an optional text field, turning blank input into `None`.
pub(crate) fn trim_optional(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
