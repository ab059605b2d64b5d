//! # UserSync Engine
//!
//! Outbound side of UserSync: everything that sends account changes to
//! remote installations.
//!
//! This crate provides:
//! - The `HttpClient` seam with a reqwest implementation and a loopback
//!   client for in-process testing
//! - `RemoteRegistry` and URL-shape probing of destinations
//! - `ChangeDispatcher`, which turns lifecycle notifications into signed,
//!   optionally encrypted deliveries
//! - `ReconciliationEngine`, a stateless page-by-page replay of the whole
//!   account set
//! - Connection testing against destinations' health endpoints
//!
//! ## Delivery model
//!
//! Delivery is best effort. Each destination is attempted independently;
//! failures are logged and reported in a `DispatchReport`, never retried or
//! queued. A local mutation always succeeds regardless of remote outcomes.
//!
//! ## Loop prevention
//!
//! The dispatcher drops notifications whose kind is suppressed by the shared
//! `ReentrancyGuard`. Inbound applies and reconciliation pages hold a
//! suppression scope for their whole duration.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod connections;
mod dispatcher;
mod error;
mod http;
mod reconcile;
mod registry;

pub use config::{EngineConfig, DEFAULT_META_KEYS};
pub use connections::ConnectionReport;
pub use dispatcher::{ChangeDispatcher, DeliveryOutcome, DispatchReport};
pub use error::{SyncError, SyncResult};
pub use http::{
    HttpClient, HttpMethod, HttpRequest, HttpResponse, LoopbackClient, LoopbackServer,
    ReqwestClient,
};
pub use reconcile::{
    BatchCursor, BatchReport, ReconciliationEngine, SyncAllReport, SyncStatus, DEFAULT_BATCH_SIZE,
};
pub use registry::RemoteRegistry;
