//! Daemon configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tally_domain::CountPolicy;

use crate::error::{ControllerError, ControllerResult};

// =============================================================================
// Configuration
// =============================================================================

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Stock ledger connection
    pub ledger: LedgerConfig,

    /// Counting session behaviour
    pub session: SessionConfig,

    /// Environment (test, development, production)
    pub environment: Environment,
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
}

/// Which ledger implementation to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerKind {
    /// In-process ledger seeded with demo data
    Memory,
    /// Remote JSON-RPC ledger
    Http,
}

/// Stock ledger connection.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Implementation
    pub kind: LedgerKind,
    /// Server base URL, required for `Http`
    pub url: Option<String>,
    /// Authenticated session id sent as a cookie
    pub session_id: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

/// Counting session behaviour.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Positions requested per page
    pub page_size: usize,
    /// How long a notification stays visible
    pub notify_duration: Duration,
    /// Idle gap before a product search fires
    pub search_debounce: Duration,
    /// Shortest query that triggers a product search
    pub product_search_min_chars: usize,
    /// Maximum product suggestions
    pub product_search_limit: usize,
    /// Revert the optimistic count when the ledger rejects it
    pub rollback_on_failure: bool,
    /// Accept counts below zero
    pub allow_negative_counts: bool,
}

impl SessionConfig {
    /// Count policy derived from this configuration.
    pub fn count_policy(&self) -> CountPolicy {
        CountPolicy {
            allow_negative: self.allow_negative_counts,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            page_size: 500,
            notify_duration: Duration::from_millis(2500),
            search_debounce: Duration::from_millis(350),
            product_search_min_chars: 2,
            product_search_limit: 10,
            rollback_on_failure: true,
            allow_negative_counts: false,
        }
    }
}

/// Environment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Test environment (in-memory ledger)
    Test,
    /// Development environment
    Development,
    /// Production environment
    Production,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> ControllerResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        let environment = Self::load_environment()?;
        let api = Self::load_api_config()?;
        let ledger = Self::load_ledger_config()?;
        let session = Self::load_session_config()?;

        Ok(Self {
            api,
            ledger,
            session,
            environment,
        })
    }

    /// Create test configuration.
    pub fn test() -> Self {
        Self {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
            },
            ledger: LedgerConfig {
                kind: LedgerKind::Memory,
                url: None,
                session_id: None,
                timeout: Duration::from_secs(1),
            },
            session: SessionConfig {
                page_size: 50,
                ..SessionConfig::default()
            },
            environment: Environment::Test,
        }
    }

    fn load_environment() -> ControllerResult<Environment> {
        let env_str = env::var("TALLY_ENV").unwrap_or_else(|_| "development".to_string());
        parse_environment(&env_str)
    }

    fn load_api_config() -> ControllerResult<ApiConfig> {
        let host = env::var("TALLY_API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = Self::load_parsed_env("TALLY_API_PORT", 8080u16)?;

        Ok(ApiConfig { host, port })
    }

    fn load_ledger_config() -> ControllerResult<LedgerConfig> {
        let kind_str = env::var("TALLY_LEDGER").unwrap_or_else(|_| "memory".to_string());
        let kind = parse_ledger_kind(&kind_str)?;
        let url = env::var("TALLY_LEDGER_URL").ok().filter(|u| !u.trim().is_empty());
        let session_id = env::var("TALLY_LEDGER_SESSION")
            .ok()
            .filter(|s| !s.trim().is_empty());
        let timeout_secs = Self::load_parsed_env("TALLY_LEDGER_TIMEOUT_SECS", 10u64)?;

        if kind == LedgerKind::Http && url.is_none() {
            return Err(ControllerError::Config(
                "TALLY_LEDGER_URL is required when TALLY_LEDGER=http".to_string(),
            ));
        }

        Ok(LedgerConfig {
            kind,
            url,
            session_id,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    fn load_session_config() -> ControllerResult<SessionConfig> {
        let defaults = SessionConfig::default();

        let page_size = Self::load_parsed_env("TALLY_PAGE_SIZE", defaults.page_size)?;
        if page_size == 0 {
            return Err(ControllerError::Config(
                "Invalid TALLY_PAGE_SIZE value: 0".to_string(),
            ));
        }

        let notify_ms = Self::load_parsed_env("TALLY_NOTIFY_MS", 2500u64)?;
        let debounce_ms = Self::load_parsed_env("TALLY_SEARCH_DEBOUNCE_MS", 350u64)?;

        Ok(SessionConfig {
            page_size,
            notify_duration: Duration::from_millis(notify_ms),
            search_debounce: Duration::from_millis(debounce_ms),
            product_search_min_chars: Self::load_parsed_env(
                "TALLY_PRODUCT_SEARCH_MIN_CHARS",
                defaults.product_search_min_chars,
            )?,
            product_search_limit: Self::load_parsed_env(
                "TALLY_PRODUCT_SEARCH_LIMIT",
                defaults.product_search_limit,
            )?,
            rollback_on_failure: Self::load_bool_env(
                "TALLY_ROLLBACK_ON_FAILURE",
                defaults.rollback_on_failure,
            )?,
            allow_negative_counts: Self::load_bool_env(
                "TALLY_ALLOW_NEGATIVE_COUNTS",
                defaults.allow_negative_counts,
            )?,
        })
    }

    fn load_parsed_env<T: FromStr>(key: &str, default: T) -> ControllerResult<T> {
        match env::var(key) {
            Ok(val) => parse_value(key, &val),
            Err(_) => Ok(default),
        }
    }

    fn load_bool_env(key: &str, default: bool) -> ControllerResult<bool> {
        match env::var(key) {
            Ok(val) => parse_bool(key, &val),
            Err(_) => Ok(default),
        }
    }
}

fn parse_environment(value: &str) -> ControllerResult<Environment> {
    match value.to_lowercase().as_str() {
        "test" => Ok(Environment::Test),
        "development" | "dev" => Ok(Environment::Development),
        "production" | "prod" => Ok(Environment::Production),
        other => Err(ControllerError::Config(format!(
            "Invalid TALLY_ENV: {}. Expected: test, development, production",
            other
        ))),
    }
}

fn parse_ledger_kind(value: &str) -> ControllerResult<LedgerKind> {
    match value.to_lowercase().as_str() {
        "memory" => Ok(LedgerKind::Memory),
        "http" => Ok(LedgerKind::Http),
        other => Err(ControllerError::Config(format!(
            "Invalid TALLY_LEDGER: {}. Expected: memory, http",
            other
        ))),
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> ControllerResult<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ControllerError::Config(format!("Invalid {} value: {}", key, value)))
}

fn parse_bool(key: &str, value: &str) -> ControllerResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ControllerError::Config(format!("Invalid {} value: {}", key, value))),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            ledger: LedgerConfig {
                kind: LedgerKind::Memory,
                url: None,
                session_id: None,
                timeout: Duration::from_secs(10),
            },
            session: SessionConfig::default(),
            environment: Environment::Development,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Test => write!(f, "test"),
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

impl std::fmt::Display for LedgerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerKind::Memory => write!(f, "memory"),
            LedgerKind::Http => write!(f, "http"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.api.port, 8080);
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.ledger.kind, LedgerKind::Memory);
        assert_eq!(config.ledger.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_test_config() {
        let config = Config::test();

        assert_eq!(config.api.port, 0);
        assert_eq!(config.environment, Environment::Test);
        assert_eq!(config.session.page_size, 50);
    }

    #[test]
    fn test_session_defaults() {
        let session = SessionConfig::default();

        assert_eq!(session.page_size, 500);
        assert_eq!(session.notify_duration, Duration::from_millis(2500));
        assert_eq!(session.search_debounce, Duration::from_millis(350));
        assert_eq!(session.product_search_min_chars, 2);
        assert_eq!(session.product_search_limit, 10);
        assert!(session.rollback_on_failure);
        assert!(!session.count_policy().allow_negative);
    }

    #[test]
    fn test_parse_environment() {
        assert_eq!(parse_environment("PROD").unwrap(), Environment::Production);
        assert!(matches!(
            parse_environment("staging"),
            Err(ControllerError::Config(_))
        ));
    }

    #[test]
    fn test_parse_values() {
        assert_eq!(parse_value::<u16>("TALLY_API_PORT", "9090").unwrap(), 9090);
        let err = parse_value::<u16>("TALLY_API_PORT", "nine").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: Invalid TALLY_API_PORT value: nine"
        );

        assert!(parse_bool("TALLY_ROLLBACK_ON_FAILURE", "Yes").unwrap());
        assert!(!parse_bool("TALLY_ROLLBACK_ON_FAILURE", "0").unwrap());
        assert!(parse_bool("TALLY_ROLLBACK_ON_FAILURE", "maybe").is_err());

        assert_eq!(parse_ledger_kind("HTTP").unwrap(), LedgerKind::Http);
        assert!(parse_ledger_kind("grpc").is_err());
    }

    #[test]
    fn test_environment_display() {
        assert_eq!(Environment::Test.to_string(), "test");
        assert_eq!(Environment::Development.to_string(), "development");
        assert_eq!(Environment::Production.to_string(), "production");
    }
}
