//! Application configuration loaded from environment variables.
//!
//! Loaded once at startup; timeouts and retry settings are handed to each
//! session as a [`SessionSettings`] value.

use crate::services::session::SessionSettings;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Upper bound on verification attempts; settlement holds the session gate
/// for the whole retry sequence.
const MAX_VERIFY_ATTEMPTS: u32 = 5;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the points ledger backend
    pub backend_url: String,
    /// Base URL of the store bridge (platform purchase service)
    pub store_bridge_url: String,
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,

    /// Bound on store catalog/initialize calls
    pub store_timeout: Duration,
    /// Bound on the interactive store purchase step
    pub purchase_timeout: Duration,
    /// Bound on each backend ledger call
    pub backend_timeout: Duration,
    /// Maximum receipt verification attempts per settlement
    pub verify_max_attempts: u32,
    /// Initial backoff between verification attempts (doubles each retry)
    pub verify_backoff: Duration,

    /// Sessions unused this long are dropped unless they have pending work
    pub session_idle: Duration,

    /// Expose the `/debug` diagnostics routes
    pub diagnostics_enabled: bool,

    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
}

impl Config {
    /// Config for tests: local URLs and fast retries.
    pub fn test_default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:9".to_string(),
            store_bridge_url: "http://127.0.0.1:9".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            port: 8080,
            store_timeout: Duration::from_secs(2),
            purchase_timeout: Duration::from_secs(5),
            backend_timeout: Duration::from_secs(2),
            verify_max_attempts: 3,
            verify_backoff: Duration::from_millis(1),
            session_idle: Duration::from_secs(1800),
            diagnostics_enabled: true,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
        }
    }

    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            backend_url: required("BACKEND_URL")?
                .trim_end_matches('/')
                .to_string(),
            store_bridge_url: required("STORE_BRIDGE_URL")?
                .trim_end_matches('/')
                .to_string(),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port: parsed_or("PORT", 8080)?,

            store_timeout: Duration::from_secs(parsed_or("STORE_TIMEOUT_SECS", 15)?),
            purchase_timeout: Duration::from_secs(parsed_or("PURCHASE_TIMEOUT_SECS", 300)?),
            backend_timeout: Duration::from_secs(parsed_or("BACKEND_TIMEOUT_SECS", 10)?),
            verify_max_attempts: parsed_or("VERIFY_MAX_ATTEMPTS", 3)?,
            verify_backoff: Duration::from_millis(parsed_or("VERIFY_BACKOFF_MS", 500)?),

            session_idle: Duration::from_secs(parsed_or("SESSION_IDLE_SECS", 1800)?),
            diagnostics_enabled: parsed_or("DIAGNOSTICS_ENABLED", false)?,

            jwt_signing_key: required("JWT_SIGNING_KEY")?.into_bytes(),
        })
    }

    /// Per-session timeouts and retry policy.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            store_timeout: self.store_timeout,
            purchase_timeout: self.purchase_timeout,
            backend_timeout: self.backend_timeout,
            verify_max_attempts: self.verify_max_attempts.clamp(1, MAX_VERIFY_ATTEMPTS),
            verify_backoff: self.verify_backoff,
        }
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .map_err(|_| ConfigError::Missing(name))
}

fn parsed_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        env::set_var("BACKEND_URL", "https://ledger.example.com/");
        env::set_var("STORE_BRIDGE_URL", "http://127.0.0.1:7001");
        env::set_var("JWT_SIGNING_KEY", "test_jwt_key_32_bytes_minimum!!");
        env::set_var("VERIFY_MAX_ATTEMPTS", "5");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.backend_url, "https://ledger.example.com");
        assert_eq!(config.store_bridge_url, "http://127.0.0.1:7001");
        assert_eq!(config.verify_max_attempts, 5);
        assert_eq!(config.backend_timeout, Duration::from_secs(10));

        env::set_var("VERIFY_MAX_ATTEMPTS", "lots");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("VERIFY_MAX_ATTEMPTS", _)));
        env::remove_var("VERIFY_MAX_ATTEMPTS");
    }

    #[test]
    fn test_session_settings_clamps_attempts() {
        let mut config = Config::test_default();
        config.verify_max_attempts = 0;
        assert_eq!(config.session_settings().verify_max_attempts, 1);

        config.verify_max_attempts = 1000;
        assert_eq!(
            config.session_settings().verify_max_attempts,
            MAX_VERIFY_ATTEMPTS
        );
    }
}
