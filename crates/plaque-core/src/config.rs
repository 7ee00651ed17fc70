//! Client configuration.
//!
//! | Setting | Env var | Default |
//! |---------|---------|---------|
//! | API base URL | `PLAQUE_API_BASE_URL` | `http://localhost:3000` |
//! | Bearer token | `PLAQUE_API_TOKEN` | none |
//! | Transport timeout | `PLAQUE_REQUEST_TIMEOUT_MS` | `30000` |
//! | Score poll interval | `PLAQUE_SCORE_POLL_MS` | `3000` |

use std::env;
use std::time::Duration;

use crate::http_client::HttpAuth;
use crate::ValidationError;

pub const ENV_BASE_URL: &str = "PLAQUE_API_BASE_URL";
pub const ENV_TOKEN: &str = "PLAQUE_API_TOKEN";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "PLAQUE_REQUEST_TIMEOUT_MS";
pub const ENV_SCORE_POLL_MS: &str = "PLAQUE_SCORE_POLL_MS";

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_SCORE_POLL_INTERVAL: Duration = Duration::from_millis(3_000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub auth: HttpAuth,
    /// Transport-level timeout; the state machines add none of their own.
    pub request_timeout: Duration,
    pub score_poll_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::from(DEFAULT_BASE_URL),
            auth: HttpAuth::None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            score_poll_interval: DEFAULT_SCORE_POLL_INTERVAL,
        }
    }
}

impl ClientConfig {
    /// Reads overrides from the environment. Unset variables keep defaults.
    pub fn from_env() -> Result<Self, ValidationError> {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary variable source.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(base_url) = lookup(ENV_BASE_URL) {
            config = config.with_base_url(base_url)?;
        }
        if let Some(token) = lookup(ENV_TOKEN).filter(|token| !token.trim().is_empty()) {
            config = config.with_bearer_token(token);
        }
        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT_MS) {
            config.request_timeout = parse_millis(ENV_REQUEST_TIMEOUT_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_SCORE_POLL_MS) {
            config.score_poll_interval = parse_millis(ENV_SCORE_POLL_MS, &raw)?;
        }

        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Result<Self, ValidationError> {
        let base_url = base_url.into();
        let trimmed = base_url.trim().trim_end_matches('/');
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(ValidationError::InvalidBaseUrl { value: base_url });
        }
        self.base_url = trimmed.to_owned();
        Ok(self)
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.auth = HttpAuth::BearerToken(token.into());
        self
    }

    pub fn with_auth(mut self, auth: HttpAuth) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_score_poll_interval(mut self, interval: Duration) -> Self {
        self.score_poll_interval = interval;
        self
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

pub fn parse_millis(name: &'static str, raw: &str) -> Result<Duration, ValidationError> {
    match raw.trim().parse::<u64>() {
        Ok(millis) if millis > 0 => Ok(Duration::from_millis(millis)),
        _ => Err(ValidationError::InvalidSetting {
            name,
            value: raw.to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_poll_every_three_seconds() {
        let config = ClientConfig::default();
        assert_eq!(config.score_poll_interval, Duration::from_millis(3_000));
        assert_eq!(config.auth, HttpAuth::None);
    }

    #[test]
    fn base_url_is_normalized() {
        let config = ClientConfig::default()
            .with_base_url("https://api.example.test/ ")
            .expect("valid url");
        assert_eq!(config.url("/api/x"), "https://api.example.test/api/x");
    }

    #[test]
    fn rejects_base_url_without_scheme() {
        let err = ClientConfig::default()
            .with_base_url("api.example.test")
            .expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn variables_override_defaults() {
        let config = ClientConfig::from_vars(|name| match name {
            ENV_BASE_URL => Some(String::from("https://market.example.test/")),
            ENV_TOKEN => Some(String::from("secret")),
            ENV_SCORE_POLL_MS => Some(String::from("750")),
            _ => None,
        })
        .expect("valid variables");

        assert_eq!(config.base_url, "https://market.example.test");
        assert_eq!(config.auth, HttpAuth::BearerToken(String::from("secret")));
        assert_eq!(config.score_poll_interval, Duration::from_millis(750));
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
    }

    #[test]
    fn blank_token_and_bad_numbers_are_handled() {
        let blank = ClientConfig::from_vars(|name| (name == ENV_TOKEN).then(|| String::from("  ")))
            .expect("blank token is ignored");
        assert_eq!(blank.auth, HttpAuth::None);

        let err = ClientConfig::from_vars(|name| {
            (name == ENV_REQUEST_TIMEOUT_MS).then(|| String::from("soon"))
        })
        .expect_err("must fail");
        assert!(matches!(
            err,
            ValidationError::InvalidSetting { name: ENV_REQUEST_TIMEOUT_MS, .. }
        ));
    }

    #[test]
    fn parse_millis_rejects_zero_and_garbage() {
        assert_eq!(
            parse_millis("PLAQUE_SCORE_POLL_MS", "1500"),
            Ok(Duration::from_millis(1_500))
        );
        assert!(parse_millis("PLAQUE_SCORE_POLL_MS", "0").is_err());
        assert!(parse_millis("PLAQUE_SCORE_POLL_MS", "3s").is_err());
    }
}
