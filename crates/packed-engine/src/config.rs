use std::env;
use std::time::Duration;

pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_REQUEST_TIMEOUT_S: f64 = 90.0;
pub const MIN_REQUEST_TIMEOUT_S: f64 = 15.0;
pub const MAX_REQUEST_TIMEOUT_S: f64 = 300.0;

/// Runtime settings, resolved from the environment and then overridden by CLI flags.
#[derive(Debug, Clone, PartialEq)]
pub struct StudioConfig {
    pub provider: String,
    pub api_key: Option<String>,
    pub api_base: String,
    pub image_model: Option<String>,
    pub text_model: Option<String>,
    pub request_timeout: Duration,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            api_key: None,
            api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            image_model: None,
            text_model: None,
            request_timeout: Duration::from_secs_f64(DEFAULT_REQUEST_TIMEOUT_S),
        }
    }
}

impl StudioConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            provider: non_empty_env("PACKED_PROVIDER")
                .map(|value| value.to_ascii_lowercase())
                .unwrap_or(defaults.provider),
            api_key: non_empty_env("GEMINI_API_KEY")
                .or_else(|| non_empty_env("GOOGLE_API_KEY"))
                .or_else(|| non_empty_env("API_KEY")),
            api_base: non_empty_env("GEMINI_API_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base),
            image_model: non_empty_env("PACKED_IMAGE_MODEL"),
            text_model: non_empty_env("PACKED_TEXT_MODEL"),
            request_timeout: timeout_from_seconds(
                non_empty_env("PACKED_REQUEST_TIMEOUT").and_then(|value| value.parse().ok()),
            ),
        }
    }

    pub fn with_request_timeout_secs(mut self, seconds: Option<f64>) -> Self {
        if seconds.is_some() {
            self.request_timeout = timeout_from_seconds(seconds);
        }
        self
    }
}

/// Clamps a requested timeout into the supported window; unset or non-finite means default.
pub fn timeout_from_seconds(seconds: Option<f64>) -> Duration {
    let value = seconds
        .filter(|value| value.is_finite())
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_S)
        .clamp(MIN_REQUEST_TIMEOUT_S, MAX_REQUEST_TIMEOUT_S);
    Duration::from_secs_f64(value)
}

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{timeout_from_seconds, StudioConfig};

    #[test]
    fn timeout_has_default_and_clamps() {
        assert_eq!(timeout_from_seconds(None), Duration::from_secs(90));
        assert_eq!(timeout_from_seconds(Some(1.0)), Duration::from_secs(15));
        assert_eq!(timeout_from_seconds(Some(900.0)), Duration::from_secs(300));
        assert_eq!(timeout_from_seconds(Some(f64::NAN)), Duration::from_secs(90));
        assert_eq!(timeout_from_seconds(Some(120.0)), Duration::from_secs(120));
    }

    #[test]
    fn cli_override_only_applies_when_given() {
        let config = StudioConfig::default().with_request_timeout_secs(None);
        assert_eq!(config.request_timeout, Duration::from_secs(90));
        let config = config.with_request_timeout_secs(Some(45.0));
        assert_eq!(config.request_timeout, Duration::from_secs(45));
        assert_eq!(config.provider, "gemini");
    }
}
