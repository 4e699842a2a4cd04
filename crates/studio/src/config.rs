use std::time::Duration;

use scenecast_core::generation::DEFAULT_MODEL;
use scenecast_genai::selector::DEFAULT_API_KEY_VAR;
use scenecast_genai::{DEFAULT_API_BASE, DEFAULT_HTTP_TIMEOUT};
use scenecast_pipeline::config::{PollConfig, DEFAULT_POLL_INTERVAL};

/// Default ceiling on how long one job may poll (30 minutes).
pub const DEFAULT_MAX_WAIT_SECS: u64 = 30 * 60;

/// Largest accepted poll interval (one day).
pub const MAX_POLL_INTERVAL_SECS: u64 = 86_400;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got {value:?}")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Studio configuration loaded from environment variables.
///
/// All fields have defaults suitable for the public API.
#[derive(Debug, Clone)]
pub struct StudioConfig {
    /// REST base of the generative-language API.
    pub api_base: String,
    /// Video model id.
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_var: String,
    pub poll_interval: Duration,
    /// `None` polls until the operation finishes.
    pub max_wait: Option<Duration>,
    pub http_timeout: Duration,
}

impl StudioConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default                                              |
    /// |--------------------------------|------------------------------------------------------|
    /// | `SCENECAST_API_BASE`           | `https://generativelanguage.googleapis.com/v1beta`   |
    /// | `SCENECAST_MODEL`              | `veo-3.1-fast-generate-preview`                      |
    /// | `SCENECAST_API_KEY_VAR`        | `GEMINI_API_KEY`                                     |
    /// | `SCENECAST_POLL_INTERVAL_SECS` | `10` (at most `86400`)                               |
    /// | `SCENECAST_MAX_WAIT_SECS`      | `1800` (`0` disables the ceiling)                    |
    /// | `SCENECAST_HTTP_TIMEOUT_SECS`  | `60`                                                 |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |var: &str, default: &str| {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let poll_interval_secs = parse_secs(
            &lookup,
            "SCENECAST_POLL_INTERVAL_SECS",
            DEFAULT_POLL_INTERVAL.as_secs(),
        )?;
        if !(1..=MAX_POLL_INTERVAL_SECS).contains(&poll_interval_secs) {
            return Err(ConfigError::Invalid {
                var: "SCENECAST_POLL_INTERVAL_SECS",
                expected: "between 1 and 86400 seconds",
                value: poll_interval_secs.to_string(),
            });
        }
        let max_wait_secs = parse_secs(&lookup, "SCENECAST_MAX_WAIT_SECS", DEFAULT_MAX_WAIT_SECS)?;
        let http_timeout_secs = parse_secs(
            &lookup,
            "SCENECAST_HTTP_TIMEOUT_SECS",
            DEFAULT_HTTP_TIMEOUT.as_secs(),
        )?;

        Ok(Self {
            api_base: text("SCENECAST_API_BASE", DEFAULT_API_BASE),
            model: text("SCENECAST_MODEL", DEFAULT_MODEL),
            api_key_var: text("SCENECAST_API_KEY_VAR", DEFAULT_API_KEY_VAR),
            poll_interval: Duration::from_secs(poll_interval_secs),
            max_wait: (max_wait_secs > 0).then(|| Duration::from_secs(max_wait_secs)),
            http_timeout: Duration::from_secs(http_timeout_secs),
        })
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig::default()
            .with_interval(self.poll_interval)
            .with_max_wait(self.max_wait)
    }
}

fn parse_secs<F>(lookup: &F, var: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            var,
            expected: "a whole number of seconds",
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    fn load(pairs: &[(&str, &str)]) -> Result<StudioConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        StudioConfig::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = load(&[]).unwrap();
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.api_key_var, DEFAULT_API_KEY_VAR);
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.max_wait, Some(Duration::from_secs(1800)));
        assert_eq!(config.http_timeout, Duration::from_secs(60));
    }

    #[test]
    fn overrides_are_read() {
        let config = load(&[
            ("SCENECAST_API_BASE", "http://localhost:8080/v1beta"),
            ("SCENECAST_MODEL", "veo-3.1-generate-preview"),
            ("SCENECAST_POLL_INTERVAL_SECS", " 2 "),
            ("SCENECAST_MAX_WAIT_SECS", "0"),
        ])
        .unwrap();
        assert_eq!(config.api_base, "http://localhost:8080/v1beta");
        assert_eq!(config.model, "veo-3.1-generate-preview");
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.max_wait, None);
        assert_eq!(config.poll_config().interval, Duration::from_secs(2));
    }

    #[test]
    fn malformed_number_is_rejected() {
        assert_matches!(
            load(&[("SCENECAST_HTTP_TIMEOUT_SECS", "soon")]),
            Err(ConfigError::Invalid { var: "SCENECAST_HTTP_TIMEOUT_SECS", .. })
        );
    }

    #[test]
    fn oversized_poll_interval_is_rejected() {
        assert_matches!(
            load(&[("SCENECAST_POLL_INTERVAL_SECS", "18446744073709551615")]),
            Err(ConfigError::Invalid { var: "SCENECAST_POLL_INTERVAL_SECS", .. })
        );
        assert!(load(&[("SCENECAST_POLL_INTERVAL_SECS", "86400")]).is_ok());
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        assert_matches!(
            load(&[("SCENECAST_POLL_INTERVAL_SECS", "0")]),
            Err(ConfigError::Invalid { var: "SCENECAST_POLL_INTERVAL_SECS", .. })
        );
    }
}
