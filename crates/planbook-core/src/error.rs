//! Error types for the Planbook system.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanbookError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Scheduling conflict detected. {message}")]
    Conflict { message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlanbookError {
    /// Shorthand for a [`PlanbookError::Validation`] with the given message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

pub type PlanbookResult<T> = Result<T, PlanbookError>;
