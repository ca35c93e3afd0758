//! Screen-level state: a full table in memory, client-side filters and
//! write actions that patch the local list once the store accepts them.

mod equipment;
mod logbook;
mod users;

pub use equipment::{EquipmentFilter, EquipmentStats, EquipmentView};
pub use logbook::{LogbookFilter, LogbookStats, LogbookView};
pub use users::{UserFilter, UserStats, UsersView};

use crate::error::{Result, ViewError};
use sensicity_auth::Session;
use sensicity_database::AuditRepository;
use sensicity_models::AuditLogBuilder;
use std::str::FromStr;

/// Filter value: everything, or one specific value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice<T> {
    All,
    Only(T),
}

impl<T> Default for Choice<T> {
    fn default() -> Self {
        Choice::All
    }
}

impl<T: PartialEq> Choice<T> {
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Choice::All => true,
            Choice::Only(expected) => expected == value,
        }
    }
}

impl<T: FromStr> FromStr for Choice<T> {
    type Err = T::Err;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            Ok(Choice::All)
        } else {
            s.parse().map(Choice::Only)
        }
    }
}

/// Lowercased, trimmed search text; `None` when blank.
pub(crate) fn search_term(search: &str) -> Option<String> {
    let term = search.trim();
    (!term.is_empty()).then(|| term.to_lowercase())
}

pub(crate) fn contains_term(haystack: &str, term: &str) -> bool {
    haystack.to_lowercase().contains(term)
}

/// Loading flag and the error of the last action.
#[derive(Debug, Default)]
pub struct ViewState {
    loading: bool,
    last_error: Option<ViewError>,
}

impl ViewState {
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_error(&self) -> Option<&ViewError> {
        self.last_error.as_ref()
    }

    /// Read and clear the last error.
    pub fn take_error(&mut self) -> Option<ViewError> {
        self.last_error.take()
    }

    pub(crate) fn begin(&mut self, loading: bool) {
        self.loading = loading;
        self.last_error = None;
    }

    pub(crate) fn settle<T>(&mut self, action: &str, result: Result<T>) -> Result<T> {
        self.loading = false;
        if let Err(ref e) = result {
            tracing::error!(action, error = %e, "View action failed");
            self.last_error = Some(e.clone());
        }
        result
    }
}

pub(crate) fn require(session: &Session, permission: &str) -> Result<()> {
    session.require(permission).map_err(ViewError::from)
}

/// Audit writes never fail the action they describe.
pub(crate) async fn record_audit(audit: &AuditRepository, builder: AuditLogBuilder) {
    if let Err(e) = audit.create(&builder.build()).await {
        tracing::warn!(error = %e, "Failed to write audit log");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensicity_models::Priority;

    #[test]
    fn test_choice_parsing() {
        assert_eq!("all".parse::<Choice<Priority>>().unwrap(), Choice::All);
        assert_eq!(
            "critical".parse::<Choice<Priority>>().unwrap(),
            Choice::Only(Priority::Critical)
        );
        assert!("urgent".parse::<Choice<Priority>>().is_err());
    }

    #[test]
    fn test_choice_matches() {
        assert!(Choice::All.matches(&Priority::Low));
        assert!(Choice::Only(Priority::Low).matches(&Priority::Low));
        assert!(!Choice::Only(Priority::Low).matches(&Priority::High));
    }

    #[test]
    fn test_search_term() {
        assert_eq!(search_term("  Bellecour "), Some("bellecour".to_string()));
        assert_eq!(search_term("   "), None);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use sensicity_auth::Session;
    use sensicity_authz::PermissionSet;
    use sensicity_database::{fixtures, SharedStore};

    /// A stored user holding exactly `permissions`.
    pub async fn session_with(store: &SharedStore, email: &str, permissions: &[&str]) -> Session {
        let user = fixtures::seed_user(store, email, None, "x").await.unwrap();
        let permissions: PermissionSet = permissions.iter().copied().collect();
        Session::new(user.into(), permissions)
    }
}
