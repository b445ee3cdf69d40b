// Centralized configuration management for the Hearth backend
// Load ALL env vars ONCE at startup

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Global application configuration loaded once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(|| {
    // For tests, load .env file first
    #[cfg(test)]
    dotenv::dotenv().ok();

    AppConfig::from_env().expect("Failed to load configuration")
});

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    // Server
    pub bind_address: String,
    pub environment: Environment,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,
    pub database_min_connections: u32,
    pub database_connect_timeout: u64,
    pub database_idle_timeout: u64,
    pub database_max_lifetime: u64,

    // Feature toggles
    pub disable_onboarding: bool,
    pub disable_embedded_migrations: bool,

    // Nested configs
    pub jwt: JwtConfig,
    pub security: SecurityConfig,
}

/// Environment type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Environment {
    Development,
    Test,
    Staging,
    Production,
}

impl From<String> for Environment {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Environment::Development,
            "test" => Environment::Test,
            "staging" | "stage" => Environment::Staging,
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Signed-token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    /// Access token lifetime in seconds (minutes-scale)
    pub access_expiry: u64,
    /// Refresh token lifetime in seconds (weeks-scale)
    pub refresh_expiry: u64,
    pub issuer: String,
}

/// Security and housekeeping configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Seconds between expiry sweep runs
    pub token_sweep_interval: u64,
    /// Maximum queued background import jobs running at once
    pub import_worker_concurrency: usize,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment: Environment = env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string())
            .into();

        let database_url = require_var("DATABASE_URL", &environment)?;
        let jwt_secret = require_var("JWT_SECRET_KEY", &environment)?;

        Ok(AppConfig {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:5000".to_string()),
            environment,

            database_url,
            database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 10)?,
            database_min_connections: parse_var("DATABASE_MIN_CONNECTIONS", 1)?,
            database_connect_timeout: parse_var("DATABASE_CONNECT_TIMEOUT", 30)?,
            database_idle_timeout: parse_var("DATABASE_IDLE_TIMEOUT", 600)?,
            database_max_lifetime: parse_var("DATABASE_MAX_LIFETIME", 1800)?,

            disable_onboarding: parse_bool("DISABLE_ONBOARDING", false),
            disable_embedded_migrations: parse_bool("DISABLE_EMBEDDED_MIGRATIONS", false),

            jwt: JwtConfig {
                secret: jwt_secret,
                // 10 minutes
                access_expiry: parse_var("JWT_ACCESS_TOKEN_EXPIRES", 600)?,
                // 4 weeks
                refresh_expiry: parse_var("JWT_REFRESH_TOKEN_EXPIRES", 2_419_200)?,
                issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "hearth".to_string()),
            },
            security: SecurityConfig {
                token_sweep_interval: parse_var("TOKEN_SWEEP_INTERVAL", 3600)?,
                import_worker_concurrency: parse_var("IMPORT_WORKER_CONCURRENCY", 2)?,
            },
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Create a config for unit tests without touching process env
    #[cfg(test)]
    pub fn for_test() -> Self {
        AppConfig {
            bind_address: "127.0.0.1:0".to_string(),
            environment: Environment::Test,
            database_url: "postgres://localhost/hearth_test".to_string(),
            database_max_connections: 2,
            database_min_connections: 1,
            database_connect_timeout: 5,
            database_idle_timeout: 60,
            database_max_lifetime: 300,
            disable_onboarding: false,
            disable_embedded_migrations: true,
            jwt: JwtConfig {
                secret: "test-secret-hs256".to_string(),
                access_expiry: 600,
                refresh_expiry: 2_419_200,
                issuer: "hearth-test".to_string(),
            },
            security: SecurityConfig {
                token_sweep_interval: 3600,
                import_worker_concurrency: 2,
            },
        }
    }
}

fn require_var(name: &str, environment: &Environment) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ if *environment == Environment::Production => {
            Err(ConfigError::MissingVar(name.to_string()))
        },
        // Development fallbacks keep first-run setup friction low; production must configure.
        _ if name == "DATABASE_URL" => Ok("postgres://localhost/hearth".to_string()),
        _ => Ok(format!("insecure-dev-{}", name.to_lowercase())),
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(v) => v
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(name.to_string(), v)),
        Err(_) => Ok(default),
    }
}

fn parse_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

/// Access the global configuration
pub fn config() -> &'static AppConfig {
    &CONFIG
}
