use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use std::env;

/// Server configuration, read from the environment at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub firebase_project_id: String,
    /// Restrict update/delete to the recorded owner of a document
    pub enforce_ownership: bool,
}

/// The part of a Firebase service account credential this server needs
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccount {
    pub project_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(&'static str),
    #[error("invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// - `FB_SERVICE_ACCOUNT_KEY` (required): base64-encoded service account JSON
    /// - `PORT` (default 3000)
    /// - `DATABASE_URL` (default `sqlite://relic.db`)
    /// - `ENFORCE_OWNERSHIP` (default false)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match lookup("PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                name: "PORT",
                reason: format!("{raw:?} is not a port number"),
            })?,
            None => 3000,
        };

        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| "sqlite://relic.db".to_string());

        let key = lookup("FB_SERVICE_ACCOUNT_KEY")
            .ok_or(ConfigError::MissingEnvVar("FB_SERVICE_ACCOUNT_KEY"))?;
        let service_account = decode_service_account(&key)?;

        let enforce_ownership = match lookup("ENFORCE_OWNERSHIP") {
            Some(raw) => parse_flag(&raw).ok_or_else(|| ConfigError::InvalidValue {
                name: "ENFORCE_OWNERSHIP",
                reason: format!("{raw:?} is not a boolean"),
            })?,
            None => false,
        };

        Ok(Self {
            port,
            database_url,
            firebase_project_id: service_account.project_id,
            enforce_ownership,
        })
    }

    pub fn socket_addr(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

pub fn decode_service_account(encoded: &str) -> Result<ServiceAccount, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidValue {
        name: "FB_SERVICE_ACCOUNT_KEY",
        reason,
    };
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| invalid(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| invalid(e.to_string()))
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn encoded_account() -> String {
        STANDARD.encode(r#"{"type":"service_account","project_id":"relic-catalog","client_email":"x@y"}"#)
    }

    fn lookup(vars: &[(&str, String)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_values() {
        let config =
            AppConfig::from_lookup(lookup(&[("FB_SERVICE_ACCOUNT_KEY", encoded_account())])).unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.database_url, "sqlite://relic.db");
        assert_eq!(config.firebase_project_id, "relic-catalog");
        assert!(!config.enforce_ownership);
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("FB_SERVICE_ACCOUNT_KEY", encoded_account()),
            ("PORT", "8080".to_string()),
            ("DATABASE_URL", "sqlite::memory:".to_string()),
            ("ENFORCE_OWNERSHIP", "TRUE".to_string()),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.database_url, "sqlite::memory:");
        assert!(config.enforce_ownership);
    }

    #[test]
    fn test_missing_service_account() {
        let result = AppConfig::from_lookup(lookup(&[]));
        assert!(matches!(result, Err(ConfigError::MissingEnvVar("FB_SERVICE_ACCOUNT_KEY"))));
    }

    #[test]
    fn test_invalid_values() {
        let bad_port = AppConfig::from_lookup(lookup(&[
            ("FB_SERVICE_ACCOUNT_KEY", encoded_account()),
            ("PORT", "http".to_string()),
        ]));
        assert!(matches!(bad_port, Err(ConfigError::InvalidValue { name: "PORT", .. })));

        let bad_key = decode_service_account("%%%not base64%%%");
        assert!(bad_key.is_err());

        let not_json = decode_service_account(&STANDARD.encode("plain text"));
        assert!(not_json.is_err());
    }
}
