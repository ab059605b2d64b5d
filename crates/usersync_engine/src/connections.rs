//! Connection testing against destinations' health endpoints.

use crate::dispatcher::ChangeDispatcher;
use crate::error::{SyncError, SyncResult};
use crate::http::{HttpClient, HttpRequest};
use serde::{Deserialize, Serialize};
use usersync_protocol::{HEADER_API_KEY, HEALTH_ROUTE};

/// Result of testing one destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionReport {
    /// The destination URL as registered.
    pub url: String,
    /// Whether the health endpoint answered 200.
    pub success: bool,
    /// `Connected (v<version>)` or the reason for failure.
    pub message: String,
}

impl<C: HttpClient> ChangeDispatcher<C> {
    /// Calls every destination's health endpoint with its API key.
    ///
    /// With signature verification on, the health request is signed the
    /// same way changes are, over an empty body.
    ///
    /// Fails with [`SyncError::NoDestinations`] when nothing is registered.
    /// Inert entries are reported without being contacted.
    pub fn test_connections(&self) -> SyncResult<Vec<ConnectionReport>> {
        let destinations = self.registry().list();
        if destinations.is_empty() {
            return Err(SyncError::NoDestinations);
        }
        let sign = self.settings().snapshot().verify_signature;

        let reports = destinations
            .iter()
            .map(|destination| {
                if !destination.is_active() {
                    let url = if destination.url.is_empty() {
                        "Unknown".to_string()
                    } else {
                        destination.url.clone()
                    };
                    return ConnectionReport {
                        url,
                        success: false,
                        message: "Missing URL or API key".to_string(),
                    };
                }

                let endpoint =
                    self.registry()
                        .resolve_endpoint(self.client(), destination, HEALTH_ROUTE);
                let request = HttpRequest::get(endpoint)
                    .header(HEADER_API_KEY, destination.api_key.as_str())
                    .timeout(self.config().health_timeout);
                let request = if sign {
                    self.sign(request, &destination.api_key)
                } else {
                    Ok(request)
                };

                let (success, message) = match request.map(|r| self.client().execute(r)) {
                    Err(e) => (false, e.to_string()),
                    Ok(Err(e)) => (false, e),
                    Ok(Ok(response)) => {
                        let body = response.json();
                        let field = |name: &str| {
                            body.as_ref()
                                .and_then(|b| b.get(name))
                                .and_then(|v| v.as_str())
                                .map(str::to_owned)
                        };
                        if response.status == 200 {
                            let version = field("version").unwrap_or_else(|| "unknown".into());
                            (true, format!("Connected (v{version})"))
                        } else {
                            let reason = field("message").unwrap_or_else(|| "Unknown error".into());
                            (false, format!("HTTP {}: {}", response.status, reason))
                        }
                    }
                };

                tracing::info!(destination = %destination.url, success, %message, "connection test");
                ConnectionReport {
                    url: destination.url.clone(),
                    success,
                    message,
                }
            })
            .collect();
        Ok(reports)
    }
}
