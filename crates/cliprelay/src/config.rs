//! Server configuration.

use std::env;
use std::time::Duration;

use cliprelay_session::PAIRING_TTL;

const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_RELAY_ADDR: &str = "0.0.0.0:3001";
const DEFAULT_SECRET: &str = "replace_this_with_a_strong_secret";

/// Runtime configuration for both listeners.
///
/// The session API and the relay listener bind separately so that one can
/// sit behind an HTTP reverse proxy while the other takes raw WebSocket
/// traffic.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address of the session API (pairing endpoints, health).
    pub http_addr: String,
    /// Bind address of the WebSocket relay listener.
    pub relay_addr: String,
    /// HMAC secret for signing and verifying device tokens.
    pub secret: String,
    /// How long a pairing request stays confirmable.
    pub pairing_ttl: Duration,
}

impl ServerConfig {
    /// Builds a configuration from the process environment.
    ///
    /// Honors `CLIPRELAY_HTTP_ADDR`, `CLIPRELAY_RELAY_ADDR`, and
    /// `JWT_SECRET`. Unset variables fall back to the defaults; running on
    /// the fallback secret is loud in the logs because every deployment
    /// sharing it can forge each other's tokens.
    pub fn from_env() -> Self {
        let secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set, using built-in development secret");
            DEFAULT_SECRET.to_string()
        });

        Self {
            http_addr: env::var("CLIPRELAY_HTTP_ADDR")
                .unwrap_or_else(|_| DEFAULT_HTTP_ADDR.to_string()),
            relay_addr: env::var("CLIPRELAY_RELAY_ADDR")
                .unwrap_or_else(|_| DEFAULT_RELAY_ADDR.to_string()),
            secret,
            pairing_ttl: PAIRING_TTL,
        }
    }
}

/// Loopback addresses and the development secret, for local runs and
/// tests. Deployments go through [`ServerConfig::from_env`].
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: "127.0.0.1:3000".to_string(),
            relay_addr: "127.0.0.1:3001".to_string(),
            secret: DEFAULT_SECRET.to_string(),
            pairing_ttl: PAIRING_TTL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_uses_loopback() {
        let config = ServerConfig::default();

        assert_eq!(config.http_addr, "127.0.0.1:3000");
        assert_eq!(config.relay_addr, "127.0.0.1:3001");
        assert_eq!(config.pairing_ttl, Duration::from_secs(300));
        assert!(!config.secret.is_empty());
    }
}
