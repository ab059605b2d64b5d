//! Protocol errors.

use thiserror::Error;
use usersync_core::CipherError;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while building or reading wire messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The event lacks required fields or is not an object.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// The `action` field names an unknown action.
    #[error("invalid action: {0}")]
    UnknownAction(String),

    /// The encrypted envelope could not be opened.
    #[error("failed to decrypt data: {0}")]
    Decryption(#[from] CipherError),

    /// The envelope could not be sealed.
    #[error("failed to encrypt data: {0}")]
    Encryption(CipherError),

    /// The request could not be signed.
    #[error("failed to sign request: {0}")]
    Signing(String),

    /// JSON (de)serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
