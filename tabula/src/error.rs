use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TabulaError {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Record not found: {table} where {criteria}")]
    RecordNotFound { table: String, criteria: String },

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Storage error: {0}")]
    Storage(#[source] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, TabulaError>;

/// Sort an engine failure into the error taxonomy.
///
/// Constraint failures keep the engine's own message. Open failures become
/// connection errors. Everything else, busy and locked included, is carried
/// unchanged as [`TabulaError::Storage`].
impl From<rusqlite::Error> for TabulaError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, message) => match code.code {
                ErrorCode::ConstraintViolation => {
                    let detail = message.clone().unwrap_or_else(|| code.to_string());
                    log::warn!("Write rejected by constraint: {detail}");
                    TabulaError::ConstraintViolation(detail)
                }
                ErrorCode::CannotOpen
                | ErrorCode::NotADatabase
                | ErrorCode::PermissionDenied
                | ErrorCode::ReadOnly => {
                    log::warn!("Store unavailable: {err}");
                    TabulaError::Connection(err.to_string())
                }
                _ => TabulaError::Storage(err),
            },
            rusqlite::Error::InvalidPath(path) => {
                TabulaError::Connection(format!("Invalid store path: {}", path.display()))
            }
            _ => TabulaError::Storage(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::ffi;

    fn failure(extended: i32, message: &str) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(ffi::Error::new(extended), Some(message.to_string()))
    }

    #[test]
    fn test_constraint_failure_keeps_message() {
        let err: TabulaError = failure(ffi::SQLITE_CONSTRAINT_UNIQUE, "UNIQUE constraint failed: user.email").into();
        match err {
            TabulaError::ConstraintViolation(msg) => {
                assert_eq!(msg, "UNIQUE constraint failed: user.email")
            }
            other => panic!("Expected ConstraintViolation, got {other:?}"),
        }
    }

    #[test]
    fn test_cannot_open_is_connection_error() {
        let err: TabulaError = failure(ffi::SQLITE_CANTOPEN, "unable to open database file").into();
        assert!(matches!(err, TabulaError::Connection(_)));
    }

    #[test]
    fn test_busy_is_not_reclassified() {
        let err: TabulaError = failure(ffi::SQLITE_BUSY, "database is locked").into();
        assert!(matches!(err, TabulaError::Storage(_)));
    }
}
