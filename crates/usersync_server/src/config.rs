//! Server configuration.

use std::net::SocketAddr;
use std::time::Duration;
use usersync_core::GuardMode;

/// Configuration for the inbound side.
///
/// Per-installation policy (keys, allow-list, rate ceiling) lives in the
/// settings record; this holds the fixed tunables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address `usersync serve` binds to.
    pub bind_addr: SocketAddr,
    /// Maximum allowed distance between `X-Timestamp` and now.
    pub signature_tolerance: Duration,
    /// Length of a rate-limit window.
    pub rate_limit_window: Duration,
    /// Reach of the reentrancy guard.
    pub guard_mode: GuardMode,
    /// Largest accepted request body.
    pub max_body_bytes: usize,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            signature_tolerance: Duration::from_secs(300),
            rate_limit_window: Duration::from_secs(60),
            guard_mode: GuardMode::default(),
            max_body_bytes: 2 * 1024 * 1024,
        }
    }

    /// Sets the signature tolerance.
    pub fn with_signature_tolerance(mut self, tolerance: Duration) -> Self {
        self.signature_tolerance = tolerance;
        self
    }

    /// Sets the rate-limit window.
    pub fn with_rate_limit_window(mut self, window: Duration) -> Self {
        self.rate_limit_window = window;
        self
    }

    /// Sets the guard mode.
    pub fn with_guard_mode(mut self, mode: GuardMode) -> Self {
        self.guard_mode = mode;
        self
    }

    /// Sets the body size limit.
    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 8080)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.signature_tolerance, Duration::from_secs(300));
        assert_eq!(config.rate_limit_window, Duration::from_secs(60));
        assert_eq!(config.guard_mode, GuardMode::PerThread);
    }

    #[test]
    fn config_builder() {
        let config = ServerConfig::new("0.0.0.0:9000".parse().unwrap())
            .with_signature_tolerance(Duration::from_secs(30))
            .with_guard_mode(GuardMode::ProcessWide);
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.signature_tolerance, Duration::from_secs(30));
        assert_eq!(config.guard_mode, GuardMode::ProcessWide);
    }
}
