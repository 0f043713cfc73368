use std::env;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while reading configuration from the environment.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} must be a number, got {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string. Without one the service keeps its data in memory.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub server_host: String,
    pub server_port: u16,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub environment: String,
    pub allowed_origins: Vec<String>,
    pub rate_limit_max: usize,
    pub rate_limit_window: Duration,
    pub json_body_limit: usize,
    pub bcrypt_cost: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|secret| !secret.is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let ttl_minutes: u64 = parse_or(&lookup, "TOKEN_TTL_MINUTES", 60)?;
        let token_ttl = ttl_minutes
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(|| ConfigError::Invalid {
                name: "TOKEN_TTL_MINUTES",
                value: ttl_minutes.to_string(),
            })?;

        Ok(Self {
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5)?,
            server_host: lookup("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            server_port: parse_or(&lookup, "SERVER_PORT", 8080)?,
            jwt_secret,
            token_ttl,
            environment: lookup("APP_ENV").unwrap_or_else(|| "development".to_string()),
            allowed_origins: lookup("ALLOWED_ORIGINS")
                .map(|origins| parse_origins(&origins))
                .unwrap_or_default(),
            rate_limit_max: parse_or(&lookup, "RATE_LIMIT_MAX", 100)?,
            rate_limit_window: Duration::from_secs(parse_or(
                &lookup,
                "RATE_LIMIT_WINDOW_SECS",
                15 * 60,
            )?),
            json_body_limit: parse_or(&lookup, "JSON_BODY_LIMIT", 64 * 1024)?,
            bcrypt_cost: parse_or(&lookup, "BCRYPT_COST", 12)?,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.server_host.clone(), self.server_port)
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

// Entries of four characters or fewer cannot be a real origin and are dropped.
fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| origin.len() > 4)
        .map(String::from)
        .collect()
}
