//! # UserSync Core
//!
//! Account model and shared primitives for UserSync.
//!
//! This crate provides:
//! - `AccountRecord` and the `AccountStore` host boundary
//! - Lifecycle notifications (`AccountMutated`, `LifecycleListener`)
//! - The reentrancy guard that keeps inbound applies from echoing back
//! - The `SyncSettings` configuration record
//! - `PayloadCipher` for envelope confidentiality
//!
//! ## Host boundary
//!
//! The core never owns the account database or the event source. The host
//! application implements [`AccountStore`] and raises [`AccountMutated`]
//! notifications into a [`LifecycleListener`] (the outbound dispatcher).
//! [`MemoryAccountStore`] is a complete in-process implementation used by
//! tests and the CLI.
//!
//! ## Loop prevention
//!
//! While a remote change is being applied, the applying code holds a
//! [`SuppressionScope`] from the shared [`ReentrancyGuard`]. Listeners consult
//! the guard and drop notifications raised inside the scope, so a change
//! received from a peer is never sent back to it.

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod account;
mod clock;
mod crypto;
mod error;
mod guard;
mod lifecycle;
mod settings;
mod store;

pub use account::{AccountId, AccountRecord};
pub use clock::{Clock, ManualClock, SystemClock};
pub use crypto::{CipherError, PayloadCipher, IV_SIZE, KEY_SIZE};
pub use error::{CoreError, CoreResult};
pub use guard::{GuardMode, ReentrancyGuard, SuppressionScope};
pub use lifecycle::{AccountMutated, LifecycleListener, MutationKind};
pub use settings::{generate_api_key, Destination, SettingsHandle, SyncSettings};
pub use store::{AccountStore, MemoryAccountStore};

/// Crate version, reported by the health endpoint.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
