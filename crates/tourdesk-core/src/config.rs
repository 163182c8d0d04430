//! Application configuration
//!
//! This module provides centralized configuration management using the `config` crate.
//! Configuration can be loaded from environment variables and config files.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub booking: BookingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Allowed CORS origins, empty means any
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_timeout() -> u64 {
    30
}

/// Database configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,

    /// Idle connection timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    2
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    600
}

/// Redis configuration
///
/// Redis is optional. Without a URL, webhook deliveries are de-duplicated by the
/// store-level state checks only.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: Option<String>,

    /// How long a processed webhook delivery is remembered
    #[serde(default = "default_webhook_ttl")]
    pub webhook_ttl_secs: u64,
}

fn default_webhook_ttl() -> u64 {
    86_400
}

/// Authentication configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// JWT signing secret
    pub jwt_secret: String,

    /// JWT token expiration in minutes
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_minutes: i64,
}

fn default_jwt_expiration() -> i64 {
    1440 // 24 hours
}

/// Payment gateway configuration
#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    /// Base URL of the gateway REST API
    #[serde(default = "default_gateway_url")]
    pub api_url: String,

    /// Merchant account identifier (basic auth user)
    pub shop_id: String,

    /// Merchant secret (basic auth password)
    pub secret_key: String,

    /// Where the payer is sent back after confirming the charge
    pub return_url: String,

    /// ISO 4217 currency used for every charge
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Upper bound for any single gateway call
    #[serde(default = "default_gateway_timeout")]
    pub timeout_secs: u64,

    /// VAT code sent on receipt line items
    #[serde(default = "default_vat_code")]
    pub vat_code: u8,
}

fn default_gateway_url() -> String {
    "https://api.yookassa.ru/v3".to_string()
}

fn default_currency() -> String {
    "RUB".to_string()
}

fn default_gateway_timeout() -> u64 {
    10
}

fn default_vat_code() -> u8 {
    1
}

/// Outbound mail configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MailConfig {
    /// Deliver through SMTP; otherwise messages are only logged
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default)]
    pub smtp_username: Option<String>,

    #[serde(default)]
    pub smtp_password: Option<String>,

    #[serde(default = "default_from_email")]
    pub from_email: String,

    #[serde(default = "default_from_name")]
    pub from_name: String,
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from_email() -> String {
    "noreply@tourdesk.local".to_string()
}

fn default_from_name() -> String {
    "Tourdesk".to_string()
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            smtp_username: None,
            smtp_password: None,
            from_email: default_from_email(),
            from_name: default_from_name(),
        }
    }
}

/// Booking rules
#[derive(Debug, Deserialize, Clone)]
pub struct BookingConfig {
    /// Unpaid reservations older than this are purged
    #[serde(default = "default_stale_unpaid")]
    pub stale_unpaid_minutes: i64,

    /// Period of the in-process purge loop, 0 disables it
    #[serde(default = "default_housekeeping_interval")]
    pub housekeeping_interval_secs: u64,

    /// IANA timezone used when rendering session times for people
    #[serde(default = "default_display_timezone")]
    pub display_timezone: String,

    /// How far ahead recurring schedules publish sessions
    #[serde(default = "default_schedule_horizon")]
    pub schedule_horizon_days: u32,
}

fn default_stale_unpaid() -> i64 {
    15
}

fn default_housekeeping_interval() -> u64 {
    300
}

fn default_display_timezone() -> String {
    "Europe/Moscow".to_string()
}

fn default_schedule_horizon() -> u32 {
    28
}

impl BookingConfig {
    /// Parsed display timezone
    pub fn timezone(&self) -> Result<chrono_tz::Tz, ConfigError> {
        self.display_timezone.parse::<chrono_tz::Tz>().map_err(|e| {
            ConfigError::Message(format!(
                "booking.display_timezone {:?} is not an IANA zone: {}",
                self.display_timezone, e
            ))
        })
    }

    /// Purge window, rejected when negative or beyond what `chrono` can hold
    pub fn stale_window(&self) -> Result<chrono::Duration, ConfigError> {
        chrono::Duration::try_minutes(self.stale_unpaid_minutes)
            .filter(|window| *window >= chrono::Duration::zero())
            .ok_or_else(|| {
                ConfigError::Message(format!(
                    "booking.stale_unpaid_minutes {} is out of range",
                    self.stale_unpaid_minutes
                ))
            })
    }
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            stale_unpaid_minutes: default_stale_unpaid(),
            housekeeping_interval_secs: default_housekeeping_interval(),
            display_timezone: default_display_timezone(),
            schedule_horizon_days: default_schedule_horizon(),
        }
    }
}

/// Photo storage configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Directory that photo URLs are resolved against
    #[serde(default = "default_photo_root")]
    pub photo_root: String,
}

fn default_photo_root() -> String {
    "uploads".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            photo_root: default_photo_root(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and optional config file
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.workers", num_cpus::get() as i64)?
            .set_default("server.timeout_secs", 30)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("auth.jwt_expiration_minutes", 1440)?
            .set_default("gateway.currency", "RUB")?
            .set_default("gateway.timeout_secs", 10)?
            .set_default("booking.stale_unpaid_minutes", 15)?
            .set_default("booking.schedule_horizon_days", 28)?
            .set_default("booking.housekeeping_interval_secs", 300)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables with TOURDESK_ prefix
            .add_source(
                Environment::with_prefix("TOURDESK")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("TOURDESK").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Get the server bind address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    const MINIMAL: &str = r#"
        [server]
        port = 9000

        [database]
        url = "postgres://localhost/tourdesk"

        [auth]
        jwt_secret = "secret"

        [gateway]
        shop_id = "123"
        secret_key = "test_key"
        return_url = "https://tourdesk.local/reservations"
    "#;

    #[test]
    fn test_defaults_fill_optional_sections() {
        let config: AppConfig = Config::builder()
            .add_source(File::from_str(MINIMAL, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.gateway.currency, "RUB");
        assert_eq!(config.gateway.timeout_secs, 10);
        assert_eq!(config.booking.stale_unpaid_minutes, 15);
        assert!(config.redis.url.is_none());
        assert!(!config.mail.enabled);
        assert_eq!(config.server_addr(), "0.0.0.0:9000");
    }

    #[test]
    fn test_default_booking_config() {
        let config = BookingConfig::default();
        assert_eq!(config.stale_unpaid_minutes, 15);
        assert_eq!(config.schedule_horizon_days, 28);
        assert_eq!(config.display_timezone, "Europe/Moscow");
        assert_eq!(config.timezone().unwrap(), chrono_tz::Europe::Moscow);
        assert_eq!(config.stale_window().unwrap(), chrono::Duration::minutes(15));

        let broken = BookingConfig {
            display_timezone: "Mars/Olympus".to_string(),
            ..BookingConfig::default()
        };
        assert!(broken.timezone().is_err());
    }

    #[test]
    fn test_stale_window_out_of_range() {
        for minutes in [-1, i64::MAX] {
            let config = BookingConfig {
                stale_unpaid_minutes: minutes,
                ..BookingConfig::default()
            };
            assert!(config.stale_window().is_err(), "{} minutes accepted", minutes);
        }
    }
}
