use sensicity_auth::AuthError;
use sensicity_authz::AuthzError;
use sensicity_database::DatabaseError;
use sensicity_models::FieldErrors;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ViewError>;

/// What a screen shows when an action fails.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ViewError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation failed")]
    Validation(FieldErrors),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Service unavailable, please try again later")]
    Transient(String),
}

impl ViewError {
    pub fn validation(field: &str, message: &str) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.to_string()]);
        ViewError::Validation(errors)
    }

    /// Short text for a toast or status line.
    pub fn user_message(&self) -> String {
        match self {
            ViewError::Validation(fields) => fields
                .iter()
                .flat_map(|(field, messages)| messages.iter().map(move |m| format!("{}: {}", field, m)))
                .collect::<Vec<_>>()
                .join("; "),
            other => other.to_string(),
        }
    }
}

impl From<DatabaseError> for ViewError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(msg) => ViewError::NotFound(msg),
            DatabaseError::DuplicateEntry(msg) | DatabaseError::ConstraintViolation(msg) => {
                ViewError::Conflict(msg)
            }
            DatabaseError::InvalidInput(msg) => ViewError::validation("input", &msg),
            other => ViewError::Transient(other.to_string()),
        }
    }
}

impl From<AuthzError> for ViewError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Database(e) => e.into(),
            AuthzError::NotFound(msg) => ViewError::NotFound(msg),
            AuthzError::Unauthorized(msg) => ViewError::Unauthorized(msg),
        }
    }
}

impl From<AuthError> for ViewError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::DatabaseError(e) => e.into(),
            AuthError::Authz(e) => e.into(),
            AuthError::NotFound(msg) => ViewError::NotFound(msg),
            AuthError::WeakPassword(msg) => ViewError::validation("password", &msg),
            AuthError::ValidationError(msg) => ViewError::validation("input", &msg),
            AuthError::InvalidCredentials
            | AuthError::UserInactive
            | AuthError::AccountLocked { .. } => ViewError::Unauthorized(err.to_string()),
            AuthError::PasswordHashError(_) | AuthError::SessionStorage(_) => {
                ViewError::Transient(err.to_string())
            }
        }
    }
}

impl From<validator::ValidationErrors> for ViewError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ViewError::Validation(sensicity_models::field_errors(&errors))
    }
}
