use std::env;
use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

pub const BASE_URL_VAR: &str = "ASSESS_API_BASE_URL";
pub const TOKEN_VAR: &str = "ASSESS_API_TOKEN";
pub const TIMEOUT_VAR: &str = "ASSESS_API_TIMEOUT_SECS";

const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Connection settings for the remote assessment API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    pub timeout: Duration,
}

impl GatewayConfig {
    /// Build a config for `base_url` with no token and the default timeout.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidBaseUrl` if the URL does not parse or is
    /// not http(s).
    pub fn new(base_url: impl Into<String>) -> Result<Self, ConfigError> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        match Url::parse(&base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => return Err(ConfigError::InvalidBaseUrl(base_url)),
        }
        Ok(Self {
            base_url,
            api_token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.api_token = (!token.trim().is_empty()).then_some(token);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read settings from `ASSESS_API_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the base URL is missing or any value is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the base URL is missing or any value is invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup(BASE_URL_VAR)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing(BASE_URL_VAR))?;
        let mut config = Self::new(base_url)?;

        if let Some(token) = lookup(TOKEN_VAR) {
            config = config.with_token(token);
        }
        if let Some(raw) = lookup(TIMEOUT_VAR) {
            let secs: u64 = raw
                .trim()
                .parse()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| ConfigError::InvalidTimeout(raw.clone()))?;
            config = config.with_timeout(Duration::from_secs(secs));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn requires_base_url() {
        let err = GatewayConfig::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(err, ConfigError::Missing(BASE_URL_VAR));
    }

    #[test]
    fn reads_all_settings() {
        let config = GatewayConfig::from_lookup(lookup(&[
            (BASE_URL_VAR, "https://api.example.com/v1/"),
            (TOKEN_VAR, "secret"),
            (TIMEOUT_VAR, "30"),
        ]))
        .unwrap();
        assert_eq!(config.base_url, "https://api.example.com/v1");
        assert_eq!(config.api_token.as_deref(), Some("secret"));
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn defaults_timeout_and_ignores_blank_token() {
        let config = GatewayConfig::from_lookup(lookup(&[
            (BASE_URL_VAR, "http://localhost:8000"),
            (TOKEN_VAR, "  "),
        ]))
        .unwrap();
        assert_eq!(config.api_token, None);
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            GatewayConfig::new("not a url"),
            Err(ConfigError::InvalidBaseUrl(_))
        ));
        assert!(matches!(
            GatewayConfig::new("ftp://files.example.com"),
            Err(ConfigError::InvalidBaseUrl(_))
        ));
        let err = GatewayConfig::from_lookup(lookup(&[
            (BASE_URL_VAR, "http://localhost:8000"),
            (TIMEOUT_VAR, "0"),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::InvalidTimeout("0".into()));
    }
}
