//! Destination registry and endpoint resolution.

use crate::config::EngineConfig;
use crate::http::{HttpClient, HttpRequest};
use usersync_core::{Destination, SettingsHandle};

/// Prefix for installations with pretty permalinks.
const BARE_PREFIX: &str = "/wp-json";
/// Prefix for installations routed through the front controller.
const FRONT_CONTROLLER_PREFIX: &str = "/index.php/wp-json";

/// The set of remote installations, backed by the live settings record.
#[derive(Debug, Clone)]
pub struct RemoteRegistry {
    settings: SettingsHandle,
    config: EngineConfig,
}

impl RemoteRegistry {
    /// Creates a registry over the settings record.
    pub fn new(settings: SettingsHandle, config: EngineConfig) -> Self {
        Self { settings, config }
    }

    /// All registered destinations, including inert ones.
    pub fn list(&self) -> Vec<Destination> {
        self.settings.read(|s| s.remote_sites.clone())
    }

    /// Destinations that have both a URL and a key.
    pub fn active(&self) -> Vec<Destination> {
        self.settings
            .read(|s| s.active_destinations().cloned().collect())
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.settings.read(|s| s.remote_sites.is_empty())
    }

    /// Registers a destination, replacing any entry with the same base URL.
    pub fn add(&self, destination: Destination) {
        self.settings.update(|s| {
            match s
                .remote_sites
                .iter_mut()
                .find(|d| d.base_url() == destination.base_url())
            {
                Some(existing) => *existing = destination,
                None => s.remote_sites.push(destination),
            }
        });
    }

    /// Removes the destination with the given URL. Returns false if absent.
    pub fn remove(&self, url: &str) -> bool {
        let target = url.trim().trim_end_matches('/');
        self.settings.update(|s| {
            let before = s.remote_sites.len();
            s.remote_sites.retain(|d| d.base_url() != target);
            s.remote_sites.len() != before
        })
    }

    /// Resolves the full URL of `route` on a destination.
    ///
    /// Probes `HEAD {base}/wp-json/` without following redirects. A 404 or a
    /// transport error selects the front-controller form
    /// (`/index.php/wp-json`); anything else selects the bare form. The probe
    /// is not cached.
    pub fn resolve_endpoint<C: HttpClient + ?Sized>(
        &self,
        client: &C,
        destination: &Destination,
        route: &str,
    ) -> String {
        let base = destination.base_url();
        let probe = HttpRequest::head(format!("{base}{BARE_PREFIX}/"))
            .timeout(self.config.probe_timeout)
            .no_redirects();

        let prefix = match client.execute(probe) {
            Ok(response) if response.status != 404 => BARE_PREFIX,
            Ok(_) => FRONT_CONTROLLER_PREFIX,
            Err(e) => {
                tracing::debug!(destination = %base, error = %e, "URL-shape probe failed");
                FRONT_CONTROLLER_PREFIX
            }
        };

        format!("{base}{prefix}/{}/{route}", self.config.namespace)
    }
}
