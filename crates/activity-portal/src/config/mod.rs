use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use chrono::{Duration, FixedOffset};

use crate::portal::session::DEFAULT_SESSION_TTL_MINUTES;
use crate::portal::time::parse_utc_offset;

const DEFAULT_UTC_OFFSET: &str = "+07:00";

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the portal.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub portal: PortalConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            portal: PortalConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Administrator account accepted by the built-in identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminCredentials {
    pub email: String,
    pub password_sha256: String,
}

/// Portal behavior: local time, administrator account and on-disk state.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// Offset for form timestamps and exported dates.
    pub utc_offset: FixedOffset,
    pub admin: Option<AdminCredentials>,
    /// JSON snapshot the in-memory store is loaded from and saved to.
    pub data_file: Option<PathBuf>,
    /// Where the CLI keeps the signed-in student between runs.
    pub student_session_file: Option<PathBuf>,
    /// How long an HTTP bearer token stays valid after sign-in.
    pub session_ttl: Duration,
}

impl PortalConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let raw_offset =
            non_empty_var("APP_UTC_OFFSET").unwrap_or_else(|| DEFAULT_UTC_OFFSET.to_string());
        let utc_offset = parse_utc_offset(&raw_offset)
            .ok_or(ConfigError::InvalidUtcOffset { value: raw_offset })?;

        let admin = match (
            non_empty_var("APP_ADMIN_EMAIL"),
            non_empty_var("APP_ADMIN_PASSWORD_SHA256"),
        ) {
            (Some(email), Some(digest)) => {
                if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(ConfigError::InvalidPasswordDigest);
                }
                Some(AdminCredentials {
                    email,
                    password_sha256: digest.to_ascii_lowercase(),
                })
            }
            (None, None) => None,
            _ => return Err(ConfigError::IncompleteAdminCredentials),
        };

        let session_ttl = match non_empty_var("APP_SESSION_TTL_MINUTES") {
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|minutes| *minutes > 0)
                .map(Duration::minutes)
                .ok_or(ConfigError::InvalidSessionTtl { value: raw })?,
            None => Duration::minutes(DEFAULT_SESSION_TTL_MINUTES),
        };

        Ok(Self {
            utc_offset,
            admin,
            data_file: non_empty_var("APP_DATA_FILE").map(PathBuf::from),
            student_session_file: non_empty_var("APP_STUDENT_SESSION_FILE").map(PathBuf::from),
            session_ttl,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidUtcOffset { value: String },
    IncompleteAdminCredentials,
    InvalidPasswordDigest,
    InvalidSessionTtl { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidUtcOffset { value } => {
                write!(f, "APP_UTC_OFFSET '{value}' must look like +07:00")
            }
            ConfigError::IncompleteAdminCredentials => write!(
                f,
                "APP_ADMIN_EMAIL and APP_ADMIN_PASSWORD_SHA256 must be set together"
            ),
            ConfigError::InvalidPasswordDigest => write!(
                f,
                "APP_ADMIN_PASSWORD_SHA256 must be a 64 character hex SHA-256 digest"
            ),
            ConfigError::InvalidSessionTtl { value } => write!(
                f,
                "APP_SESSION_TTL_MINUTES '{value}' must be a positive number of minutes"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
