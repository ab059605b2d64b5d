//! # UserSync Protocol
//!
//! Wire types and request signing for UserSync.
//!
//! This crate provides:
//! - `ChangeEvent` describing an account create/update/delete
//! - `Envelope` for plaintext or encrypted transport
//! - Response bodies for the receive and health endpoints
//! - HMAC-SHA256 request signing
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod envelope;
mod error;
mod event;
mod messages;
mod signing;

pub use envelope::Envelope;
pub use error::{ProtocolError, ProtocolResult};
pub use event::{Action, ChangeEvent};
pub use messages::{ApplyAction, ErrorBody, ErrorData, HealthResponse, ReceiveResponse};
pub use signing::{
    sign_request, verify_signature, HEADER_API_KEY, HEADER_SIGNATURE, HEADER_TIMESTAMP,
};

/// REST namespace of the sync endpoints.
pub const API_NAMESPACE: &str = "sync/v1";

/// Route receiving change events.
pub const USER_ROUTE: &str = "user";

/// Route answering health probes.
pub const HEALTH_ROUTE: &str = "health";
