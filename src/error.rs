//! Error types for the image archive.
//!
//! Expected misses (no such site, no image with that name) are `Ok(None)` at
//! the API surface and never reach this enum. User cancellation is an outcome
//! variant on the operation's result type, not an error either.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ArchiveError>;

#[derive(Error, Debug)]
pub enum ArchiveError {
    /// A record that the operation requires is absent (image, version, site, ...).
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// Registration of a UUID or name that is already present.
    #[error("{entity} already exists: {key}")]
    AlreadyExists { entity: &'static str, key: String },

    /// A query failed. The driver diagnostic is kept as the error source.
    #[error("Database error during {operation}: {source}")]
    Storage {
        operation: &'static str,
        #[source]
        source: DieselError,
    },

    #[error("Failed to get database connection: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("Failed to run database migrations: {0}")]
    Migration(String),

    #[error("Image codec error: {0}")]
    Codec(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A branch that invariants say is unreachable. Indicates a bug or a
    /// schema/application mismatch.
    #[error("Internal inconsistency, this indicates a bug: {0}")]
    InternalInconsistency(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ArchiveError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn already_exists(entity: &'static str, key: impl ToString) -> Self {
        Self::AlreadyExists {
            entity,
            key: key.to_string(),
        }
    }

    /// Builds an [`ArchiveError::InternalInconsistency`] and logs it loudly.
    pub fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        log::error!("Internal inconsistency: {}", message);
        Self::InternalInconsistency(message)
    }

    /// True when the underlying driver reported a unique-key violation.
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            Self::Storage {
                source: DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _),
                ..
            }
        )
    }
}

/// Attaches the name of the failing operation to a diesel result.
pub(crate) trait QueryResultExt<T> {
    fn during(self, operation: &'static str) -> Result<T>;
}

impl<T> QueryResultExt<T> for diesel::QueryResult<T> {
    fn during(self, operation: &'static str) -> Result<T> {
        self.map_err(|source| ArchiveError::Storage { operation, source })
    }
}
