//! # UserSync Server
//!
//! Inbound side of UserSync.
//!
//! This crate provides:
//! - `CredentialGuard`: rate limiting, IP allow-list, API key and optional
//!   timestamped HMAC signature checks
//! - `Receiver`: decrypts, validates and applies change events with
//!   lifecycle dispatch suppressed
//! - `SyncServer`: the "receive change" and "health probe" operations
//! - An axum router exposing both over HTTP
//!
//! # Routes
//!
//! | Method | Path | Operation |
//! |---|---|---|
//! | `POST` | `{prefix}/sync/v1/user` | receive change |
//! | `GET` | `{prefix}/sync/v1/health` | health probe |
//! | `HEAD` | `/wp-json/` | URL-shape probe target |
//!
//! `{prefix}` is `/wp-json` or `/index.php/wp-json`. Both user and health
//! routes require authentication.
//!
//! # Errors
//!
//! Every failure is answered with `{code, message, data: {status}}`; see
//! [`ServerError::code`] and [`ServerError::status`].

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod auth;
mod config;
mod error;
mod handler;
mod rate_limit;
mod request;
mod router;
mod server;

pub use auth::{client_ip, CredentialGuard};
pub use config::ServerConfig;
pub use error::{AuthError, ServerError, ServerResult};
pub use handler::Receiver;
pub use rate_limit::RateLimiter;
pub use request::{InboundRequest, ServerResponse};
pub use router::router;
pub use server::{Route, SyncServer};

/// Re-exported so callers can build [`InboundRequest`]s.
pub use axum::http::Method;
