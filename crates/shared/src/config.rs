//! Application configuration management.

use serde::Deserialize;

use crate::error::AppResult;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// JWT configuration.
    pub jwt: JwtConfig,
    /// Approval workflow tuning.
    #[serde(default)]
    pub approval: ApprovalConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// JWT configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    /// Secret key for verifying tokens.
    pub secret: String,
    /// Access token expiration in seconds.
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry_secs: u64,
    /// Clock skew tolerated when validating expiry, in seconds.
    #[serde(default = "default_leeway")]
    pub leeway_secs: u64,
}

fn default_access_token_expiry() -> u64 {
    900 // 15 minutes
}

fn default_leeway() -> u64 {
    30
}

/// Retry policy for decision submission.
///
/// Only transient persistence failures are retried. Validation failures
/// (`NotAnApprover`, `AlreadyTerminal`, ...) are returned immediately.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ApprovalConfig {
    /// Maximum number of retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay between retries in milliseconds, doubled on each retry.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    25
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Configuration` if a source cannot be read or the
    /// merged values do not fit the expected shape.
    pub fn load() -> AppResult<Self> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("EXPENSA").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn test_load_from_environment() {
        temp_env::with_vars(
            [
                ("EXPENSA__DATABASE__URL", Some("postgres://localhost/expensa")),
                ("EXPENSA__JWT__SECRET", Some("secret")),
                ("EXPENSA__SERVER__PORT", Some("9090")),
                ("EXPENSA__APPROVAL__MAX_RETRIES", Some("5")),
                ("RUN_MODE", Some("config-test")),
            ],
            || {
                let config = AppConfig::load().unwrap();
                assert_eq!(config.database.url, "postgres://localhost/expensa");
                assert_eq!(config.jwt.secret, "secret");
                assert_eq!(config.server.port, 9090);
                assert_eq!(config.server.host, "0.0.0.0");
                assert_eq!(config.approval.max_retries, 5);
                assert_eq!(config.approval.retry_base_delay_ms, 25);
            },
        );
    }

    #[test]
    fn test_missing_database_url_fails() {
        temp_env::with_vars(
            [
                ("EXPENSA__DATABASE__URL", None::<&str>),
                ("EXPENSA__JWT__SECRET", Some("secret")),
                ("RUN_MODE", Some("config-test")),
            ],
            || {
                assert!(matches!(
                    AppConfig::load(),
                    Err(AppError::Configuration(_))
                ));
            },
        );
    }

    #[test]
    fn test_malformed_value_is_configuration_error() {
        temp_env::with_vars(
            [
                ("EXPENSA__DATABASE__URL", Some("postgres://localhost/expensa")),
                ("EXPENSA__JWT__SECRET", Some("secret")),
                ("EXPENSA__SERVER__PORT", Some("not-a-port")),
                ("RUN_MODE", Some("config-test")),
            ],
            || {
                let err = AppConfig::load().unwrap_err();
                assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
            },
        );
    }

    #[test]
    fn test_approval_defaults() {
        let config = ApprovalConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_base_delay_ms, 25);
    }
}
