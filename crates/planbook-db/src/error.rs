//! Database-specific error types and conversions.

use planbook_core::error::PlanbookError;

/// Marker embedded in the message of the in-transaction exclusivity
/// guard's `THROW`, used to recognize guard aborts in the raw SurrealDB
/// error text.
pub(crate) const GUARD_ABORT_MARKER: &str = "booking-overlap";

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Booking conflict: {0}")]
    BookingConflict(String),
}

impl DbError {
    /// Classify a query-execution error, turning exclusivity-guard aborts
    /// into [`DbError::BookingConflict`].
    pub(crate) fn from_query(err: surrealdb::Error) -> Self {
        let text = err.to_string();
        if text.contains(GUARD_ABORT_MARKER) {
            DbError::BookingConflict(
                "a conflicting booking was committed concurrently".to_string(),
            )
        } else {
            DbError::Surreal(err)
        }
    }
}

impl From<DbError> for PlanbookError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => PlanbookError::NotFound { entity, id },
            DbError::BookingConflict(message) => PlanbookError::Conflict { message },
            other => PlanbookError::Database(other.to_string()),
        }
    }
}
