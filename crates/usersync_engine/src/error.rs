//! Error types for the outbound side.

use thiserror::Error;
use usersync_core::AccountId;

/// Result type for engine operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors raised by dispatch, reconciliation and connection testing.
///
/// Per-destination delivery failures are not errors; they are reported in a
/// [`DispatchReport`](crate::DispatchReport).
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error outside of per-destination delivery.
    #[error("transport error: {0}")]
    Transport(String),

    /// Building or sealing a message failed.
    #[error("protocol error: {0}")]
    Protocol(#[from] usersync_protocol::ProtocolError),

    /// Account store error.
    #[error("store error: {0}")]
    Store(#[from] usersync_core::CoreError),

    /// The account does not exist.
    #[error("account {0} not found")]
    AccountNotFound(AccountId),

    /// No destinations are registered.
    #[error("no remote sites configured")]
    NoDestinations,

    /// The batch size must be at least one.
    #[error("invalid batch size: {0}")]
    InvalidBatchSize(usize),
}

impl SyncError {
    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }
}
