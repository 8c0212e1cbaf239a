//! Server configuration.

use std::{env, path::PathBuf, str::FromStr};

use anyhow::Context;

/// Where the social graph is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// In-process store; contents are lost on restart.
    Memory,
    /// SQLite database at the given URL.
    Sqlite(String),
}

impl StorageBackend {
    /// Parses a `DATABASE_URL` value.
    pub fn parse(database_url: &str) -> anyhow::Result<Self> {
        if database_url == "memory" {
            Ok(Self::Memory)
        } else if database_url.starts_with("sqlite:") {
            Ok(Self::Sqlite(database_url.to_string()))
        } else {
            anyhow::bail!(
                "DATABASE_URL must be `memory` or a `sqlite:` URL, got {database_url:?}"
            )
        }
    }
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Database URL, or `memory`.
    pub database_url: String,
    /// Backend selected by `database_url`.
    pub storage: StorageBackend,
    /// Secret shared with the identity service that signs session tokens.
    pub jwt_secret: String,
    /// Session token expiration in hours.
    pub jwt_expiration_hours: u64,
    /// Chat service API key.
    pub stream_api_key: Option<String>,
    /// Chat service API secret. Also signs webhooks.
    pub stream_api_secret: Option<String>,
    /// JSON file of users to import at startup.
    pub users_file: Option<PathBuf>,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Log level.
    pub log_level: String,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which returns the raw value of
    /// a variable if it is set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        // Blank values count as unset.
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = get("CHATMATE_JWT_SECRET")
            .ok_or_else(|| anyhow::anyhow!("CHATMATE_JWT_SECRET is required"))?;

        let database_url = get("DATABASE_URL").unwrap_or_else(|| "memory".to_string());
        let storage = StorageBackend::parse(database_url.trim())?;

        Ok(Self {
            host: get("CHATMATE_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(get("CHATMATE_PORT"), "CHATMATE_PORT", 5001)?,
            database_url,
            storage,
            jwt_secret,
            jwt_expiration_hours: parse_or(
                get("CHATMATE_JWT_EXPIRATION_HOURS"),
                "CHATMATE_JWT_EXPIRATION_HOURS",
                24,
            )?,
            stream_api_key: get("STREAM_API_KEY"),
            stream_api_secret: get("STREAM_API_SECRET"),
            users_file: get("CHATMATE_USERS_FILE").map(PathBuf::from),
            request_timeout_secs: parse_or(
                get("CHATMATE_REQUEST_TIMEOUT_SECS"),
                "CHATMATE_REQUEST_TIMEOUT_SECS",
                30,
            )?,
            log_level: get("CHATMATE_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Returns the server address.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the storage backend selected by `database_url`.
    pub fn storage(&self) -> StorageBackend {
        self.storage.clone()
    }

    /// Returns true if both chat service credentials are set.
    pub fn chat_configured(&self) -> bool {
        self.stream_api_key.is_some() && self.stream_api_secret.is_some()
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("CHATMATE_JWT_SECRET", "secret")]).unwrap();

        assert_eq!(config.server_addr(), "0.0.0.0:5001");
        assert_eq!(config.storage(), StorageBackend::Memory);
        assert_eq!(config.jwt_expiration_hours, 24);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.log_level, "info");
        assert!(!config.chat_configured());
        assert!(config.users_file.is_none());
    }

    #[test]
    fn test_jwt_secret_required() {
        assert!(load(&[]).is_err());
        assert!(load(&[("CHATMATE_JWT_SECRET", "  ")]).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("CHATMATE_JWT_SECRET", "secret"),
            ("CHATMATE_PORT", "8080"),
            ("DATABASE_URL", "sqlite:chatmate.db?mode=rwc"),
            ("STREAM_API_KEY", "key"),
            ("STREAM_API_SECRET", "chat-secret"),
            ("CHATMATE_USERS_FILE", "users.json"),
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(
            config.storage(),
            StorageBackend::Sqlite("sqlite:chatmate.db?mode=rwc".to_string())
        );
        assert!(config.chat_configured());
        assert_eq!(config.users_file, Some(PathBuf::from("users.json")));
    }

    #[test]
    fn test_unsupported_database_url_is_an_error() {
        for url in ["postgres://db/chatmate", "chatmate.db", "sqllite:chatmate.db"] {
            let result = load(&[("CHATMATE_JWT_SECRET", "secret"), ("DATABASE_URL", url)]);
            assert!(result.is_err(), "{url} should be rejected");
        }

        let config = load(&[
            ("CHATMATE_JWT_SECRET", "secret"),
            ("DATABASE_URL", "memory"),
        ])
        .unwrap();
        assert_eq!(config.storage(), StorageBackend::Memory);
    }

    #[test]
    fn test_invalid_number_is_an_error() {
        let result = load(&[("CHATMATE_JWT_SECRET", "secret"), ("CHATMATE_PORT", "http")]);
        assert!(result.is_err());
    }
}
