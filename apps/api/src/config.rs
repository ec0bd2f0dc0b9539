use std::str::FromStr;

use anyhow::{bail, Context, Result};

/// Which `ResumeStore` implementation backs the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => bail!("STORE_BACKEND must be 'postgres' or 'memory', got '{other}'"),
        }
    }
}

/// Identity adapter settings. Exactly one adapter is active per process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthConfig {
    Mock {
        subject: String,
        email: Option<String>,
        name: Option<String>,
    },
    OAuth {
        userinfo_url: String,
    },
    Token {
        introspection_url: String,
        client_id: Option<String>,
        client_secret: Option<String>,
    },
}

/// Application configuration loaded from environment variables.
/// Startup fails if a variable required by the selected backends is missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub auth: AuthConfig,
    pub identity_timeout_secs: u64,
    pub cors_origin: Option<String>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so tests never touch
    /// the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| {
            var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
        };

        let store_backend: StoreBackend = var("STORE_BACKEND")
            .unwrap_or_else(|| "postgres".to_string())
            .parse()?;
        let database_url = match store_backend {
            StoreBackend::Postgres => Some(require("DATABASE_URL")?),
            StoreBackend::Memory => var("DATABASE_URL"),
        };

        let auth = match var("AUTH_PROVIDER")
            .unwrap_or_else(|| "mock".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "mock" => AuthConfig::Mock {
                subject: var("MOCK_SUBJECT").unwrap_or_else(|| "dev-user-123".to_string()),
                email: Some(var("MOCK_EMAIL").unwrap_or_else(|| "dev@example.com".to_string())),
                name: Some(var("MOCK_NAME").unwrap_or_else(|| "Dev User".to_string())),
            },
            "oauth" => AuthConfig::OAuth {
                userinfo_url: require("OAUTH_USERINFO_URL")?,
            },
            "token" => AuthConfig::Token {
                introspection_url: require("TOKEN_INTROSPECTION_URL")?,
                client_id: var("TOKEN_CLIENT_ID"),
                client_secret: var("TOKEN_CLIENT_SECRET"),
            },
            other => bail!("AUTH_PROVIDER must be 'mock', 'oauth' or 'token', got '{other}'"),
        };

        Ok(Config {
            store_backend,
            database_url,
            database_max_connections: parse_or(&var, "DATABASE_MAX_CONNECTIONS", 10)?,
            auth,
            identity_timeout_secs: parse_or(&var, "IDENTITY_TIMEOUT_SECS", 10)?,
            cors_origin: var("CORS_ORIGIN"),
            port: parse_or(&var, "PORT", 8080)?,
            rust_log: var("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}
