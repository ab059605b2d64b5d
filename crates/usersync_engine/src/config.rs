//! Configuration for the outbound side.

use std::time::Duration;

/// Metadata keys sent with lifecycle-triggered events.
pub const DEFAULT_META_KEYS: &[&str] = &[
    "nickname",
    "description",
    "billing_first_name",
    "billing_last_name",
    "billing_company",
    "billing_address_1",
    "billing_address_2",
    "billing_city",
    "billing_postcode",
    "billing_country",
    "billing_state",
    "billing_phone",
    "billing_email",
    "shipping_first_name",
    "shipping_last_name",
    "shipping_company",
    "shipping_address_1",
    "shipping_address_2",
    "shipping_city",
    "shipping_postcode",
    "shipping_country",
    "shipping_state",
];

/// Tunables for dispatch, probing and reconciliation.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Timeout for delivering one event to one destination.
    pub delivery_timeout: Duration,
    /// Timeout for the URL-shape probe.
    pub probe_timeout: Duration,
    /// Timeout for connection tests against the health endpoint.
    pub health_timeout: Duration,
    /// Response bodies are cut to this many characters in logs and reports.
    pub log_body_limit: usize,
    /// REST namespace of the sync routes.
    pub namespace: String,
    /// Metadata keys included in lifecycle-triggered events.
    pub meta_keys: Vec<String>,
}

impl EngineConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self {
            delivery_timeout: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
            health_timeout: Duration::from_secs(10),
            log_body_limit: 200,
            namespace: usersync_protocol::API_NAMESPACE.to_string(),
            meta_keys: DEFAULT_META_KEYS.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Sets the delivery timeout.
    pub fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    /// Sets the probe timeout.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Sets the health-check timeout.
    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    /// Sets the metadata allow-list.
    pub fn with_meta_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.meta_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Cuts `text` to the configured number of characters.
    pub fn truncate(&self, text: &str) -> String {
        text.chars().take(self.log_body_limit).collect()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}
