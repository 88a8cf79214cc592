//! Provider configuration.
use std::time::Duration;

use thiserror::Error;

use crate::retry::{RetryConfig, DEFAULT_RETRY_TIMEOUT_SECS};

pub const TOKEN_ENV: &str = "SLACK_TOKEN";
pub const RETRY_TIMEOUT_ENV: &str = "SLACK_RETRY_TIMEOUT";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("SLACK_TOKEN is not set")]
    MissingToken,
    #[error("Invalid retry timeout {0:?}: expected whole seconds")]
    InvalidRetryTimeout(String),
}

/// Credentials plus the retry budget applied to every logical operation.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub token: String,
    pub retry: RetryConfig,
}

// keep the token out of logs
impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("token", &"<redacted>")
            .field("retry", &self.retry)
            .finish()
    }
}

impl ProviderConfig {
    pub fn new(token: &str, retry_timeout: Duration) -> Result<Self, ConfigError> {
        if token.trim().is_empty() {
            return Err(ConfigError::MissingToken);
        }
        Ok(Self {
            token: token.to_string(),
            retry: RetryConfig {
                timeout: retry_timeout,
            },
        })
    }

    /// Read `SLACK_TOKEN` and the optional `SLACK_RETRY_TIMEOUT` (seconds).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// As [`from_env`](Self::from_env), with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup(TOKEN_ENV).ok_or(ConfigError::MissingToken)?;
        let secs = match lookup(RETRY_TIMEOUT_ENV) {
            Some(raw) => parse_timeout(&raw)?,
            None => DEFAULT_RETRY_TIMEOUT_SECS,
        };
        Self::new(&token, Duration::from_secs(secs))
    }
}

pub fn parse_timeout(raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidRetryTimeout(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn timeout_defaults_to_sixty_seconds() {
        let config = ProviderConfig::from_lookup(lookup(&[("SLACK_TOKEN", "xoxb-1")])).unwrap();
        assert_eq!(config.token, "xoxb-1");
        assert_eq!(config.retry.timeout, Duration::from_secs(60));
    }

    #[test]
    fn timeout_is_read_in_seconds() {
        let config = ProviderConfig::from_lookup(lookup(&[
            ("SLACK_TOKEN", "xoxb-1"),
            ("SLACK_RETRY_TIMEOUT", "15"),
        ]))
        .unwrap();
        assert_eq!(config.retry.timeout, Duration::from_secs(15));
    }

    #[test]
    fn missing_or_blank_token_is_rejected() {
        assert_eq!(
            ProviderConfig::from_lookup(lookup(&[])),
            Err(ConfigError::MissingToken)
        );
        assert_eq!(
            ProviderConfig::from_lookup(lookup(&[("SLACK_TOKEN", "  ")])),
            Err(ConfigError::MissingToken)
        );
    }

    #[test]
    fn non_numeric_timeout_is_rejected() {
        let err = ProviderConfig::from_lookup(lookup(&[
            ("SLACK_TOKEN", "xoxb-1"),
            ("SLACK_RETRY_TIMEOUT", "1m"),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::InvalidRetryTimeout("1m".into()));
    }

    #[test]
    fn debug_output_redacts_token() {
        let config = ProviderConfig::new("xoxb-secret", Duration::from_secs(1)).unwrap();
        assert!(!format!("{config:?}").contains("xoxb-secret"));
    }
}
