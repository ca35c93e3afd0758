use sensicity_database::DatabaseError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuthzError>;

#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    Unauthorized(String),
}

impl AuthzError {
    pub fn unauthorized(permission: &str) -> Self {
        Self::Unauthorized(format!("missing permission {}", permission))
    }
}
