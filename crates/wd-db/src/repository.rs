//! Repository error type shared by every store

use wd_core::WdError;

/// Error type for repository operations
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

impl RepositoryError {
    /// Map a unique-constraint violation to `Conflict`, leaving other errors as is
    pub fn from_write(err: sqlx::Error, conflict: &str) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return RepositoryError::Conflict(conflict.to_string());
            }
        }
        RepositoryError::Database(err)
    }
}

impl From<RepositoryError> for WdError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => WdError::NotFound {
                entity: "Record",
                id: what,
            },
            RepositoryError::Conflict(msg) => WdError::Conflict(msg),
            RepositoryError::InvalidData(msg) => WdError::Internal(msg),
            RepositoryError::Database(e) => WdError::Database(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_wd_error() {
        let err: WdError = RepositoryError::Conflict("email taken".into()).into();
        assert_eq!(err.status_code(), 409);

        let err: WdError = RepositoryError::Database(sqlx::Error::RowNotFound).into();
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.public_message(), "Internal server error");
    }

    #[test]
    fn test_from_write_passes_through_other_errors() {
        let err = RepositoryError::from_write(sqlx::Error::PoolTimedOut, "dup");
        assert!(matches!(err, RepositoryError::Database(_)));
    }
}
