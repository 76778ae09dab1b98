use serde::Deserialize;
use std::net::SocketAddr;

use shared::validation::MAX_UTC_OFFSET_MINUTES;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    /// JWT authentication configuration
    pub jwt: JwtAuthConfig,
    /// Scan admission and dashboard settings
    #[serde(default)]
    pub scanning: ScanningConfig,
    /// First-admin bootstrap
    #[serde(default)]
    pub admin: AdminBootstrapConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl From<&DatabaseConfig> for persistence::db::DatabaseConfig {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            url: config.url.clone(),
            max_connections: config.max_connections,
            min_connections: config.min_connections,
            connect_timeout_secs: config.connect_timeout_secs,
            idle_timeout_secs: config.idle_timeout_secs,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Login attempts allowed per client IP per minute. 0 disables the limit.
    #[serde(default = "default_login_rate_limit")]
    pub login_rate_limit_per_minute: u32,

    /// Key the login limiter on `X-Forwarded-For` instead of the socket peer.
    /// Only enable behind a reverse proxy that overwrites the header.
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtAuthConfig {
    /// RSA private key in PEM format for signing tokens
    pub private_key: String,

    /// RSA public key in PEM format for verifying tokens
    pub public_key: String,

    /// Access token expiration in seconds (default: 3600 = 1 hour)
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry_secs: i64,

    /// Refresh token expiration in seconds (default: 604800 = 7 days)
    #[serde(default = "default_refresh_token_expiry")]
    pub refresh_token_expiry_secs: i64,

    /// Leeway in seconds for clock skew tolerance
    #[serde(default = "default_jwt_leeway")]
    pub leeway_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanningConfig {
    /// Offset from UTC, in minutes, that defines a "day" for ONCE_PER_DAY
    /// and for the dashboard buckets.
    #[serde(default)]
    pub utc_offset_minutes: i32,

    /// Whether scanners (role USER) may override duplicates.
    #[serde(default)]
    pub allow_scanner_override: bool,

    #[serde(default = "default_recent_logs_limit")]
    pub recent_logs_limit: usize,
}

impl Default for ScanningConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 0,
            allow_scanner_override: false,
            recent_logs_limit: default_recent_logs_limit(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminBootstrapConfig {
    #[serde(default)]
    pub bootstrap_email: String,

    #[serde(default)]
    pub bootstrap_password: String,

    #[serde(default = "default_bootstrap_name")]
    pub bootstrap_name: String,
}

impl Default for AdminBootstrapConfig {
    fn default() -> Self {
        Self {
            bootstrap_email: String::new(),
            bootstrap_password: String::new(),
            bootstrap_name: default_bootstrap_name(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_max_connections() -> u32 {
    20
}
fn default_min_connections() -> u32 {
    5
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    600
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_login_rate_limit() -> u32 {
    10
}
fn default_access_token_expiry() -> i64 {
    3600
}
fn default_refresh_token_expiry() -> i64 {
    604800
}
fn default_jwt_leeway() -> u64 {
    30
}
fn default_recent_logs_limit() -> usize {
    50
}
fn default_bootstrap_name() -> String {
    "Administrator".to_string()
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with CHECKIN__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("CHECKIN")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("security.cors_origins")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration for testing with custom overrides.
    ///
    /// Defaults are embedded so tests do not depend on config files.
    #[cfg(test)]
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let defaults = r#"
            [server]
            host = "0.0.0.0"
            port = 8080
            request_timeout_secs = 30

            [database]
            url = ""
            max_connections = 20
            min_connections = 5
            connect_timeout_secs = 10
            idle_timeout_secs = 600

            [logging]
            level = "info"
            format = "json"

            [security]
            cors_origins = []
            login_rate_limit_per_minute = 10

            [jwt]
            private_key = "test-private-key"
            public_key = "test-public-key"
            access_token_expiry_secs = 3600
            refresh_token_expiry_secs = 604800
            leeway_secs = 30

            [scanning]
            utc_offset_minutes = 0
            allow_scanner_override = false
            recent_logs_limit = 50
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        // Validation is left to the caller so partial configs load.
        builder.build()?.try_deserialize()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.database.url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "CHECKIN__DATABASE__URL environment variable must be set".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "Server port cannot be 0".to_string(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigValidationError::InvalidValue(
                "min_connections cannot exceed max_connections".to_string(),
            ));
        }

        if self.scanning.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
            return Err(ConfigValidationError::InvalidValue(format!(
                "scanning.utc_offset_minutes must be within ±{} minutes",
                MAX_UTC_OFFSET_MINUTES
            )));
        }

        if self.scanning.recent_logs_limit == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "scanning.recent_logs_limit must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigValidationError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|_| {
                ConfigValidationError::InvalidValue(format!(
                    "Invalid socket address {}:{}",
                    self.server.host, self.server.port
                ))
            })
    }
}
