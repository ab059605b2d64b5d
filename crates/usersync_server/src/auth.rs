//! Inbound request authentication.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. rate limit per client IP (counted before anything else, so requests
//!    with bad credentials still use up the budget)
//! 2. IP allow-list
//! 3. `X-API-Key`
//! 4. `X-Timestamp` / `X-Signature`, when signing is required

use crate::config::ServerConfig;
use crate::error::AuthError;
use crate::rate_limit::RateLimiter;
use crate::request::InboundRequest;
use std::net::IpAddr;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use usersync_core::{Clock, SettingsHandle};
use usersync_protocol::{verify_signature, HEADER_API_KEY, HEADER_SIGNATURE, HEADER_TIMESTAMP};

/// Headers consulted for the client IP, in order, before the socket address.
const CLIENT_IP_HEADERS: [&str; 3] = ["cf-connecting-ip", "x-real-ip", "x-forwarded-for"];

/// Fallback when no source yields a valid IP.
const UNKNOWN_IP: &str = "0.0.0.0";

/// Derives the caller's IP.
///
/// Each source is cut at its first comma and trimmed; the first one that
/// parses as an IP address wins.
pub fn client_ip(request: &InboundRequest) -> String {
    CLIENT_IP_HEADERS
        .iter()
        .filter_map(|name| request.header_value(name))
        .chain(request.remote_addr.as_deref())
        .filter_map(|raw| {
            let candidate = raw.split(',').next().unwrap_or_default().trim();
            candidate.parse::<IpAddr>().ok().map(|_| candidate.to_string())
        })
        .next()
        .unwrap_or_else(|| UNKNOWN_IP.to_string())
}

/// Authenticates inbound requests against the live settings.
pub struct CredentialGuard {
    settings: SettingsHandle,
    limiter: RateLimiter,
    clock: Arc<dyn Clock>,
    tolerance_secs: u64,
}

impl CredentialGuard {
    /// Creates a guard.
    pub fn new(settings: SettingsHandle, config: &ServerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            settings,
            limiter: RateLimiter::new(config.rate_limit_window, clock.clone()),
            clock,
            tolerance_secs: config.signature_tolerance.as_secs(),
        }
    }

    /// The rate limiter.
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Authorizes a request.
    pub fn authorize(&self, request: &InboundRequest) -> Result<(), AuthError> {
        let result = self.check(request);
        if let Err(e) = &result {
            tracing::debug!(code = e.code(), ip = %client_ip(request), "request rejected");
        }
        result
    }

    fn check(&self, request: &InboundRequest) -> Result<(), AuthError> {
        let settings = self.settings.snapshot();
        let ip = client_ip(request);

        if !self.limiter.check(&ip, settings.rate_limit) {
            return Err(AuthError::RateLimitExceeded);
        }

        if !settings.ip_whitelist.is_empty() && !settings.ip_whitelist.iter().any(|w| *w == ip) {
            return Err(AuthError::IpNotWhitelisted);
        }

        let presented = request
            .header_value(HEADER_API_KEY)
            .ok_or(AuthError::MissingApiKey)?;
        let stored = settings.api_key.as_bytes();
        if stored.is_empty() || !bool::from(stored.ct_eq(presented.as_bytes())) {
            return Err(AuthError::InvalidApiKey);
        }

        if settings.verify_signature {
            let (signature, timestamp) = match (
                request.header_value(HEADER_SIGNATURE),
                request.header_value(HEADER_TIMESTAMP),
            ) {
                (Some(s), Some(t)) => (s, t),
                _ => return Err(AuthError::MissingSignature),
            };

            let sent = timestamp.trim().parse::<i64>().unwrap_or(0);
            if self.clock.unix_timestamp().abs_diff(sent) > self.tolerance_secs {
                return Err(AuthError::ExpiredRequest);
            }

            if !verify_signature(&settings.api_key, timestamp, &request.body, signature) {
                return Err(AuthError::InvalidSignature);
            }
        }

        Ok(())
    }
}
