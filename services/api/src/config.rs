//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use document_browser_core::oauth::{ProviderConfig, ProviderKind};
use document_browser_core::session::DEFAULT_SESSION_TTL_HOURS;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;
use url::Url;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
    #[error("No OAuth provider is configured; set the client id and secret of at least one of Google, Microsoft or GitHub")]
    NoProviders,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub documents_path: PathBuf,
    pub redirect_base: String,
    pub session_ttl_hours: i64,
    pub allowed_origin: String,
    pub providers: Vec<ProviderConfig>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // --- Load Server and Database Settings ---
        let bind_address_str = var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = var("DATABASE_URL")
            .unwrap_or_else(|| "sqlite://document_browser.db?mode=rwc".to_string());

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let documents_path = var("DOCUMENTS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./documents"));

        // --- Load Auth Settings ---
        let redirect_base_str =
            var("OAUTH_REDIRECT_BASE").unwrap_or_else(|| "http://localhost:3000".to_string());
        let redirect_base = Url::parse(&redirect_base_str)
            .map_err(|e| ConfigError::InvalidValue("OAUTH_REDIRECT_BASE".to_string(), e.to_string()))?
            .as_str()
            .trim_end_matches('/')
            .to_string();

        let session_ttl_hours = match var("SESSION_TTL_HOURS") {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|hours| *hours > 0)
                .ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "SESSION_TTL_HOURS".to_string(),
                        format!("'{}' is not a positive number of hours", raw),
                    )
                })?,
            None => DEFAULT_SESSION_TTL_HOURS,
        };

        let allowed_origin =
            var("ALLOWED_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        // --- Load OAuth Providers (each one optional) ---
        let mut providers = Vec::new();
        for kind in ProviderKind::ALL {
            let prefix = kind.as_str().to_ascii_uppercase();
            let client_id = var(&format!("{prefix}_CLIENT_ID"));
            let client_secret = var(&format!("{prefix}_CLIENT_SECRET"));
            if let (Some(client_id), Some(client_secret)) = (client_id, client_secret) {
                let mut provider = ProviderConfig::new(kind, client_id, client_secret);
                if kind == ProviderKind::Microsoft {
                    provider = provider.with_tenant(
                        var("MICROSOFT_TENANT_ID").unwrap_or_else(|| "common".to_string()),
                    );
                }
                providers.push(provider);
            }
        }
        if providers.is_empty() {
            return Err(ConfigError::NoProviders);
        }

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            documents_path,
            redirect_base,
            session_ttl_hours,
            allowed_origin,
            providers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_a_provider_is_set() {
        let config = load(&[("GITHUB_CLIENT_ID", "gh-id"), ("GITHUB_CLIENT_SECRET", "gh-secret")]).unwrap();

        assert_eq!(config.bind_address, "0.0.0.0:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.database_url, "sqlite://document_browser.db?mode=rwc");
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.redirect_base, "http://localhost:3000");
        assert_eq!(config.session_ttl_hours, 24);
        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.providers[0].kind, ProviderKind::GitHub);
    }

    #[test]
    fn zero_providers_is_fatal() {
        assert!(matches!(load(&[]), Err(ConfigError::NoProviders)));
        // An id without a secret does not count.
        assert!(matches!(
            load(&[("GOOGLE_CLIENT_ID", "id"), ("GOOGLE_CLIENT_SECRET", "  ")]),
            Err(ConfigError::NoProviders)
        ));
    }

    #[test]
    fn microsoft_tenant_defaults_to_common() {
        let config = load(&[
            ("MICROSOFT_CLIENT_ID", "ms-id"),
            ("MICROSOFT_CLIENT_SECRET", "ms-secret"),
            ("GOOGLE_CLIENT_ID", "g-id"),
            ("GOOGLE_CLIENT_SECRET", "g-secret"),
        ])
        .unwrap();

        let kinds: Vec<ProviderKind> = config.providers.iter().map(|p| p.kind).collect();
        assert_eq!(kinds, vec![ProviderKind::Google, ProviderKind::Microsoft]);
        assert_eq!(config.providers[1].tenant.as_deref(), Some("common"));
    }

    #[test]
    fn redirect_base_loses_its_trailing_slash() {
        let config = load(&[
            ("GOOGLE_CLIENT_ID", "g-id"),
            ("GOOGLE_CLIENT_SECRET", "g-secret"),
            ("OAUTH_REDIRECT_BASE", "https://docs.example.com/"),
        ])
        .unwrap();
        assert_eq!(config.redirect_base, "https://docs.example.com");
    }

    #[test]
    fn malformed_values_are_reported() {
        let base = [("GOOGLE_CLIENT_ID", "g-id"), ("GOOGLE_CLIENT_SECRET", "g-secret")];

        let mut bad_ttl = base.to_vec();
        bad_ttl.push(("SESSION_TTL_HOURS", "-3"));
        assert!(matches!(
            load(&bad_ttl),
            Err(ConfigError::InvalidValue(var, _)) if var == "SESSION_TTL_HOURS"
        ));

        let mut bad_bind = base.to_vec();
        bad_bind.push(("BIND_ADDRESS", "localhost"));
        assert!(matches!(
            load(&bad_bind),
            Err(ConfigError::InvalidValue(var, _)) if var == "BIND_ADDRESS"
        ));

        let mut bad_base = base.to_vec();
        bad_base.push(("OAUTH_REDIRECT_BASE", "not a url"));
        assert!(matches!(
            load(&bad_base),
            Err(ConfigError::InvalidValue(var, _)) if var == "OAUTH_REDIRECT_BASE"
        ));
    }
}
