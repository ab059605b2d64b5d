//! Outbound change dispatch.
//!
//! The dispatcher turns local account mutations into [`ChangeEvent`]s and
//! broadcasts them to every active destination. Delivery is best effort:
//! each destination is attempted independently and failures are logged and
//! reported, never retried.

use crate::config::EngineConfig;
use crate::http::{HttpClient, HttpRequest};
use crate::registry::RemoteRegistry;
use std::collections::BTreeMap;
use std::sync::Arc;
use usersync_core::{
    AccountMutated, AccountRecord, Clock, Destination, LifecycleListener, MutationKind,
    PayloadCipher, ReentrancyGuard, SettingsHandle, SyncSettings, SystemClock,
};
use usersync_protocol::{
    sign_request, Action, ChangeEvent, Envelope, ProtocolResult, HEADER_API_KEY,
    HEADER_SIGNATURE, HEADER_TIMESTAMP, USER_ROUTE,
};

/// Outcome of delivering one event to one destination.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryOutcome {
    /// Base URL of the destination.
    pub url: String,
    /// HTTP status, if a response was received.
    pub status: Option<u16>,
    /// Truncated response body or transport error for failed deliveries.
    pub message: Option<String>,
}

impl DeliveryOutcome {
    /// Returns true if the destination answered 2xx.
    pub fn is_accepted(&self) -> bool {
        matches!(self.status, Some(s) if (200..300).contains(&s))
    }

    fn failed(url: &str, message: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            status: None,
            message: Some(message.into()),
        }
    }

    /// A one-line description of a failure.
    pub fn describe(&self) -> String {
        let message = self.message.as_deref().unwrap_or_default();
        match self.status {
            Some(status) => format!("{}: HTTP {}: {}", self.url, status, message),
            None => format!("{}: {}", self.url, message),
        }
    }
}

/// Per-destination results of one dispatch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    /// One entry per active destination, in registry order.
    pub outcomes: Vec<DeliveryOutcome>,
}

impl DispatchReport {
    /// Returns true if at least one destination accepted the event.
    pub fn accepted(&self) -> bool {
        self.outcomes.iter().any(DeliveryOutcome::is_accepted)
    }

    /// Returns true if no destination was attempted.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Deliveries that were not accepted.
    pub fn failures(&self) -> impl Iterator<Item = &DeliveryOutcome> {
        self.outcomes.iter().filter(|o| !o.is_accepted())
    }
}

/// Builds change events and delivers them to all destinations.
pub struct ChangeDispatcher<C: HttpClient> {
    settings: SettingsHandle,
    registry: RemoteRegistry,
    client: C,
    config: EngineConfig,
    guard: Arc<ReentrancyGuard>,
    clock: Arc<dyn Clock>,
}

impl<C: HttpClient> ChangeDispatcher<C> {
    /// Creates a dispatcher with the default configuration.
    pub fn new(settings: SettingsHandle, client: C, guard: Arc<ReentrancyGuard>) -> Self {
        let config = EngineConfig::default();
        Self {
            registry: RemoteRegistry::new(settings.clone(), config.clone()),
            settings,
            client,
            config,
            guard,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.registry = RemoteRegistry::new(self.settings.clone(), config.clone());
        self.config = config;
        self
    }

    /// Replaces the clock used for signature timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The settings handle.
    pub fn settings(&self) -> &SettingsHandle {
        &self.settings
    }

    /// The destination registry.
    pub fn registry(&self) -> &RemoteRegistry {
        &self.registry
    }

    /// The HTTP client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// The configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The shared reentrancy guard.
    pub fn guard(&self) -> &Arc<ReentrancyGuard> {
        &self.guard
    }

    /// Builds the event for a lifecycle notification.
    ///
    /// Deletes carry only the identity. Creates and updates carry the profile,
    /// roles when `sync_roles`, and allow-listed non-empty metadata when
    /// `sync_meta`.
    pub fn lifecycle_event(&self, mutation: &AccountMutated, settings: &SyncSettings) -> ChangeEvent {
        let account = &mutation.account;
        let action = match mutation.kind {
            MutationKind::Deleted => return ChangeEvent::delete(account),
            MutationKind::Created => Action::Create,
            MutationKind::Updated | MutationKind::RoleChanged => Action::Update,
        };

        let mut event = ChangeEvent::from_account(action, account);
        if settings.sync_roles {
            event = event.with_roles(account.roles.clone());
        }
        if settings.sync_meta {
            let meta: BTreeMap<_, _> = account
                .metadata
                .iter()
                .filter(|(key, value)| {
                    self.config.meta_keys.iter().any(|k| k == *key) && !is_empty_value(value)
                })
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            if !meta.is_empty() {
                event = event.with_meta(meta);
            }
        }
        event
    }

    /// Builds the full `update` event used by reconciliation.
    pub fn reconcile_event(&self, account: &AccountRecord, settings: &SyncSettings) -> ChangeEvent {
        let mut event = ChangeEvent::from_account(Action::Update, account);
        if settings.sync_roles {
            event = event.with_roles(account.roles.clone());
        }
        if settings.sync_meta {
            event = event.with_meta(account.metadata.clone());
        }
        event
    }

    /// Delivers an event to every active destination.
    ///
    /// The event is sealed once with the configured encryption key; each
    /// destination is then signed (when `verify_signature` is on) with its own
    /// API key and posted independently.
    pub fn dispatch(&self, event: &ChangeEvent) -> DispatchReport {
        let settings = self.settings.snapshot();
        let destinations: Vec<Destination> = settings.active_destinations().cloned().collect();
        if destinations.is_empty() {
            tracing::debug!(action = event.action.as_str(), "no active destinations");
            return DispatchReport::default();
        }

        let cipher = settings.encryption_key().map(PayloadCipher::new);
        let body = match Envelope::seal(event, cipher.as_ref()).and_then(|e| e.to_body()) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, login = %event.user_login, "failed to build change event");
                let outcomes = destinations
                    .iter()
                    .map(|d| DeliveryOutcome::failed(d.base_url(), e.to_string()))
                    .collect();
                return DispatchReport { outcomes };
            }
        };

        let outcomes = destinations
            .iter()
            .map(|destination| self.deliver(destination, &body, settings.verify_signature))
            .collect();
        DispatchReport { outcomes }
    }

    fn deliver(&self, destination: &Destination, body: &str, sign: bool) -> DeliveryOutcome {
        let url = destination.base_url();
        let endpoint = self
            .registry
            .resolve_endpoint(&self.client, destination, USER_ROUTE);

        let mut request = HttpRequest::post(endpoint, body.as_bytes().to_vec())
            .header("Content-Type", "application/json")
            .header(HEADER_API_KEY, destination.api_key.as_str())
            .timeout(self.config.delivery_timeout);
        if sign {
            request = match self.sign(request, &destination.api_key) {
                Ok(signed) => signed,
                Err(e) => {
                    tracing::warn!(destination = %url, error = %e, "change not signed");
                    return DeliveryOutcome::failed(url, e.to_string());
                }
            };
        }

        match self.client.execute(request) {
            Ok(response) if response.is_success() => {
                tracing::debug!(destination = %url, status = response.status, "change delivered");
                DeliveryOutcome {
                    url: url.to_string(),
                    status: Some(response.status),
                    message: None,
                }
            }
            Ok(response) => {
                let excerpt = self.config.truncate(&response.text());
                tracing::warn!(
                    destination = %url,
                    status = response.status,
                    body = %excerpt,
                    "change delivery rejected"
                );
                DeliveryOutcome {
                    url: url.to_string(),
                    status: Some(response.status),
                    message: Some(excerpt),
                }
            }
            Err(e) => {
                tracing::warn!(destination = %url, error = %e, "change delivery failed");
                DeliveryOutcome::failed(url, self.config.truncate(&e))
            }
        }
    }
}

impl<C: HttpClient> ChangeDispatcher<C> {
    /// Stamps `request` with the current time and its signature over the
    /// request body, keyed by the destination's API key.
    pub(crate) fn sign(&self, request: HttpRequest, api_key: &str) -> ProtocolResult<HttpRequest> {
        let timestamp = self.clock.unix_timestamp().to_string();
        let signature = sign_request(api_key, &timestamp, &request.body)?;
        Ok(request
            .header(HEADER_TIMESTAMP, timestamp)
            .header(HEADER_SIGNATURE, signature))
    }
}

impl<C: HttpClient> LifecycleListener for ChangeDispatcher<C> {
    fn notify(&self, mutation: &AccountMutated) {
        let settings = self.settings.snapshot();
        if !settings.enabled {
            tracing::debug!(kind = ?mutation.kind, "sync disabled, not dispatching");
            return;
        }
        if self.guard.is_suppressed(mutation.kind) {
            tracing::debug!(
                kind = ?mutation.kind,
                login = %mutation.account.login,
                "inbound apply in progress, not dispatching"
            );
            return;
        }

        let event = self.lifecycle_event(mutation, &settings);
        let report = self.dispatch(&event);
        if !report.is_empty() && !report.accepted() {
            tracing::warn!(
                login = %mutation.account.login,
                action = event.action.as_str(),
                "no destination accepted the change"
            );
        }
    }
}

fn is_empty_value(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.is_empty(),
        serde_json::Value::Array(a) => a.is_empty(),
        serde_json::Value::Object(o) => o.is_empty(),
        _ => false,
    }
}
