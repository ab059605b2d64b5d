//! Main sync server.

use crate::auth::CredentialGuard;
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::Receiver;
use crate::request::{InboundRequest, ServerResponse};
use axum::http::Method;
use std::sync::Arc;
use usersync_core::{AccountStore, Clock, ReentrancyGuard, SettingsHandle, SystemClock};
use usersync_protocol::{HealthResponse, API_NAMESPACE, HEALTH_ROUTE, USER_ROUTE};

/// Route prefixes the server answers under.
const PREFIXES: [&str; 2] = ["/index.php/wp-json", "/wp-json"];

/// Logical routes of the sync API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// `HEAD/GET {prefix}/`, answered so URL-shape probes succeed.
    Index,
    /// `POST {prefix}/sync/v1/user`.
    User,
    /// `GET {prefix}/sync/v1/health`.
    Health,
}

impl Route {
    /// Matches a request path.
    pub fn parse(path: &str) -> Option<Self> {
        let path = path.trim_end_matches('/');
        let rest = PREFIXES
            .iter()
            .find_map(|prefix| path.strip_prefix(prefix))?;
        if rest.is_empty() {
            return Some(Route::Index);
        }
        let route = rest
            .strip_prefix('/')?
            .strip_prefix(API_NAMESPACE)?
            .strip_prefix('/')?;
        match route {
            USER_ROUTE => Some(Route::User),
            HEALTH_ROUTE => Some(Route::Health),
            _ => None,
        }
    }
}

/// The sync server.
///
/// Exposes the two logical operations, "receive change" and "health probe",
/// independent of how a host wires them to the network. [`crate::router`]
/// serves them over axum; tests call [`SyncServer::handle`] directly.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use usersync_core::{MemoryAccountStore, SettingsHandle};
/// use usersync_server::{ServerConfig, SyncServer};
///
/// let store = Arc::new(MemoryAccountStore::new());
/// let server = SyncServer::new(ServerConfig::default(), SettingsHandle::default(), store);
///
/// // Expose server.handle() through HTTP, or use usersync_server::router.
/// ```
pub struct SyncServer<S: AccountStore> {
    config: ServerConfig,
    receiver: Receiver<S>,
    credentials: Arc<CredentialGuard>,
    guard: Arc<ReentrancyGuard>,
    clock: Arc<dyn Clock>,
}

impl<S: AccountStore> SyncServer<S> {
    /// Creates a server with its own guard and the system clock.
    pub fn new(config: ServerConfig, settings: SettingsHandle, store: S) -> Self {
        let guard = Arc::new(ReentrancyGuard::new(config.guard_mode));
        Self::with_parts(config, settings, store, guard, Arc::new(SystemClock))
    }

    /// Creates a server sharing a reentrancy guard (typically the
    /// dispatcher's) and using the given clock.
    pub fn with_parts(
        config: ServerConfig,
        settings: SettingsHandle,
        store: S,
        guard: Arc<ReentrancyGuard>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let credentials = Arc::new(CredentialGuard::new(settings.clone(), &config, clock.clone()));
        let receiver = Receiver::new(store, settings, guard.clone(), credentials.clone());
        Self {
            config,
            receiver,
            credentials,
            guard,
            clock,
        }
    }

    /// The configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The receiver.
    pub fn receiver(&self) -> &Receiver<S> {
        &self.receiver
    }

    /// The reentrancy guard.
    pub fn guard(&self) -> &Arc<ReentrancyGuard> {
        &self.guard
    }

    /// Handles the "receive change" operation.
    pub fn receive(&self, request: &InboundRequest) -> ServerResult<usersync_protocol::ReceiveResponse> {
        self.receiver.receive(request)
    }

    /// Handles the "health probe" operation.
    pub fn health(&self, request: &InboundRequest) -> ServerResult<HealthResponse> {
        self.credentials.authorize(request)?;
        let time = chrono::DateTime::from_timestamp(self.clock.unix_timestamp(), 0)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        Ok(HealthResponse::ok(usersync_core::VERSION, time))
    }

    /// Routes a request and renders the response.
    pub fn handle(&self, request: &InboundRequest) -> ServerResponse {
        let result = match (Route::parse(&request.path), &request.method) {
            (Some(Route::User), &Method::POST) => self.receive(request).map(|r| ServerResponse::ok(&r)),
            (Some(Route::Health), &Method::GET | &Method::HEAD) => {
                self.health(request).map(|r| ServerResponse::ok(&r))
            }
            (Some(Route::Index), &Method::GET | &Method::HEAD) => Ok(ServerResponse::ok(
                &serde_json::json!({ "namespaces": [API_NAMESPACE] }),
            )),
            (Some(_), _) => Err(ServerError::MethodNotAllowed),
            (None, _) => Err(ServerError::NoRoute),
        };

        result.unwrap_or_else(|e| {
            if e.is_server_error() {
                tracing::error!(path = %request.path, code = e.code(), error = %e, "request failed");
            } else {
                tracing::debug!(path = %request.path, code = e.code(), "request rejected");
            }
            e.into()
        })
    }
}
