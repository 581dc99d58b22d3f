//! Typed store errors.
//!
//! Not-found and version-conflict conditions are recovered at each
//! operation's boundary and translated to caller-visible errors; everything
//! else propagates as a generic database failure.

use uuid::Uuid;

#[derive(Debug)]
pub enum StoreError {
    /// The targeted reservation (or payment parent) does not exist.
    NotFound { id: Uuid },
    /// Optimistic concurrency check failed: the row moved under the caller.
    VersionConflict {
        id: Uuid,
        expected: i64,
        found: i64,
    },
    /// A stored value did not decode into its domain type.
    Corrupt { id: Uuid, message: String },
    /// Underlying database failure (connectivity, constraint violation).
    Database(sqlx::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound { id } => write!(f, "reservation not found: {id}"),
            StoreError::VersionConflict {
                id,
                expected,
                found,
            } => write!(
                f,
                "version conflict on {id}: expected {expected}, found {found}"
            ),
            StoreError::Corrupt { id, message } => {
                write!(f, "corrupt stored record {id}: {message}")
            }
            StoreError::Database(e) => write!(f, "database failure: {e}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Database(e) => Some(e),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Database(e)
    }
}
