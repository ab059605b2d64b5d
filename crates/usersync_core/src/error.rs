//! Error types for UserSync core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON (de)serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Account not found.
    #[error("account not found: {id}")]
    AccountNotFound {
        /// The account ID that was not found.
        id: u64,
    },

    /// Another account already owns the login or email.
    #[error("duplicate {field}: {value}")]
    DuplicateIdentity {
        /// Which identity field collided (`login` or `email`).
        field: &'static str,
        /// The colliding value.
        value: String,
    },

    /// The record is missing a required identity field.
    #[error("invalid account: {message}")]
    InvalidAccount {
        /// Description of the problem.
        message: String,
    },

    /// Host storage failure.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the failure.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid account error.
    pub fn invalid_account(message: impl Into<String>) -> Self {
        Self::InvalidAccount {
            message: message.into(),
        }
    }

    /// Creates a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}
