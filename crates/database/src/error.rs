use thiserror::Error;

pub type Result<T> = std::result::Result<T, DatabaseError>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Row decoding failed: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DatabaseError {
    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::NotFound(format!("{} with id {} not found", entity, id))
    }

    pub fn duplicate(entity: &str, field: &str) -> Self {
        Self::DuplicateEntry(format!("{} with {} already exists", entity, field))
    }

    /// Write rejected by a store constraint (unique, foreign key, check).
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::DuplicateEntry(_) | Self::ConstraintViolation(_))
    }

    /// Network or service failure; the action may succeed if invoked again.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionFailed(_) | Self::Query(_))
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("row not found".to_string()),
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                // SQLSTATE class 23: integrity constraint violation
                match db_err.code().as_deref() {
                    Some("23505") => DatabaseError::DuplicateEntry(message),
                    Some("23503") | Some("23502") | Some("23514") => {
                        DatabaseError::ConstraintViolation(message)
                    }
                    Some("22P02") | Some("22023") => DatabaseError::InvalidInput(message),
                    _ => DatabaseError::Query(message),
                }
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                DatabaseError::Serialization(err.to_string())
            }
            sqlx::Error::Configuration(_) => DatabaseError::ConnectionFailed(err.to_string()),
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => DatabaseError::ConnectionFailed(err.to_string()),
            other => DatabaseError::Query(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for DatabaseError {
    fn from(err: serde_json::Error) -> Self {
        DatabaseError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: DatabaseError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DatabaseError::NotFound(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_pool_timeout_is_transient() {
        let err: DatabaseError = sqlx::Error::PoolTimedOut.into();
        assert!(err.is_transient());
        assert!(!err.is_conflict());
    }

    #[test]
    fn test_duplicate_is_conflict() {
        let err = DatabaseError::duplicate("User", "email");
        assert!(err.is_conflict());
        assert_eq!(err.to_string(), "Duplicate entry: User with email already exists");
    }
}
