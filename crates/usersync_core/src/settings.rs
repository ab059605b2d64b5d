//! The sync configuration record.
//!
//! Settings are owned by the host's administrative store; the core reads them
//! through a [`SettingsHandle`] on every operation, so edits take effect
//! without rebuilding any service.

use crate::error::CoreResult;
use parking_lot::RwLock;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Length of generated API keys.
const API_KEY_LEN: usize = 32;

/// A remote installation that receives change events.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Destination {
    /// Base URL of the remote installation.
    #[serde(default)]
    pub url: String,
    /// The remote's API key (its shared secret).
    #[serde(default)]
    pub api_key: String,
}

impl Destination {
    /// Creates a destination.
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
        }
    }

    /// Entries missing either field are inert and never contacted.
    pub fn is_active(&self) -> bool {
        !self.url.trim().is_empty() && !self.api_key.is_empty()
    }

    /// The base URL without trailing slashes.
    pub fn base_url(&self) -> &str {
        self.url.trim().trim_end_matches('/')
    }
}

/// Configuration record consumed by the sync core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Destinations to send changes to.
    #[serde(default, deserialize_with = "list_or_json_string")]
    pub remote_sites: Vec<Destination>,
    /// Local API key: bearer secret and HMAC key for inbound requests.
    #[serde(default = "generate_api_key")]
    pub api_key: String,
    /// Optional passphrase for envelope encryption (empty = plaintext).
    #[serde(default)]
    pub encryption_key: String,
    /// Whether account metadata is synchronised.
    #[serde(default = "enabled_by_default")]
    pub sync_meta: bool,
    /// Whether account roles are synchronised.
    #[serde(default = "enabled_by_default")]
    pub sync_roles: bool,
    /// Allowed client IPs (empty = any).
    #[serde(default, deserialize_with = "list_or_lines")]
    pub ip_whitelist: Vec<String>,
    /// Requests per minute per client IP (0 = unlimited).
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,
    /// Whether requests must carry a timestamped HMAC signature.
    #[serde(default)]
    pub verify_signature: bool,
    /// Master switch for outbound dispatch of local mutations.
    #[serde(default)]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

fn default_rate_limit() -> u32 {
    100
}

/// Generates a random 32-character alphanumeric API key.
pub fn generate_api_key() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(API_KEY_LEN)
        .map(char::from)
        .collect()
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            remote_sites: Vec::new(),
            api_key: generate_api_key(),
            encryption_key: String::new(),
            sync_meta: true,
            sync_roles: true,
            ip_whitelist: Vec::new(),
            rate_limit: default_rate_limit(),
            verify_signature: false,
            enabled: false,
        }
    }
}

impl SyncSettings {
    /// Returns the encryption passphrase, if one is configured.
    pub fn encryption_key(&self) -> Option<&str> {
        Some(self.encryption_key.as_str()).filter(|k| !k.is_empty())
    }

    /// Destinations that have both a URL and a key.
    pub fn active_destinations(&self) -> impl Iterator<Item = &Destination> {
        self.remote_sites.iter().filter(|d| d.is_active())
    }

    /// Parses settings from JSON text.
    pub fn from_json(text: &str) -> CoreResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Loads settings from a JSON file.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Writes settings to a JSON file.
    pub fn save(&self, path: &Path) -> CoreResult<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

/// `remote_sites` may arrive as a list or as a JSON-encoded string of one.
/// Invalid JSON in the string form yields an empty list.
fn list_or_json_string<'de, D>(deserializer: D) -> Result<Vec<Destination>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<Destination>),
        Text(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::List(list) => list,
        Raw::Text(text) => serde_json::from_str(&text).unwrap_or_default(),
    })
}

/// `ip_whitelist` may arrive as a list or as newline-separated text.
fn list_or_lines<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Text(String),
    }

    let entries = match Raw::deserialize(deserializer)? {
        Raw::List(list) => list,
        Raw::Text(text) => text.lines().map(str::to_owned).collect(),
    };
    Ok(entries
        .into_iter()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect())
}

/// Shared, live view of the settings record.
#[derive(Debug, Clone, Default)]
pub struct SettingsHandle {
    inner: Arc<RwLock<SyncSettings>>,
}

impl SettingsHandle {
    /// Wraps a settings record.
    pub fn new(settings: SyncSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Returns a copy of the current settings.
    pub fn snapshot(&self) -> SyncSettings {
        self.inner.read().clone()
    }

    /// Reads a value out of the current settings.
    pub fn read<R>(&self, f: impl FnOnce(&SyncSettings) -> R) -> R {
        f(&self.inner.read())
    }

    /// Modifies the settings in place.
    pub fn update<R>(&self, f: impl FnOnce(&mut SyncSettings) -> R) -> R {
        f(&mut self.inner.write())
    }
}
