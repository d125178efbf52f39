use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// File looked up next to the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "crash-console";
pub const ENV_PREFIX: &str = "CRASH";

const MAX_REQUEST_TIMEOUT_SECS: u64 = 600;
const MAX_POLL_INTERVAL_SECS: u64 = 86_400;
const MAX_TICK_INTERVAL_MS: u64 = 60_000;
const MAX_EXPIRY_RECHECK_SECS: u64 = 86_400;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Base URL of the pricing backend, including the `/api` prefix.
    pub api_base_url: String,
    /// Sent as a bearer token when set.
    pub api_token: Option<String>,
    pub request_timeout_secs: u64,

    // Global broadcast
    pub poll_interval_secs: u64,

    // Countdown
    pub tick_interval_ms: u64,
    pub expiry_recheck_secs: u64,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:3000/api".to_string(),
            api_token: None,
            request_timeout_secs: 10,
            poll_interval_secs: 15,
            tick_interval_ms: 1000,
            expiry_recheck_secs: 5,
        }
    }
}

impl ConsoleConfig {
    /// Loads defaults, then the TOML file, then `CRASH_*` environment variables.
    ///
    /// # Arguments
    ///
    /// * `path` - Explicit config file, which must exist. When `None`,
    ///   `crash-console.toml` is read if present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::build(path, config::Environment::with_prefix(ENV_PREFIX))
    }

    fn build(path: Option<&Path>, env: config::Environment) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let config: ConsoleConfig = config::Config::builder()
            .add_source(file)
            .add_source(env.try_parsing(true))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.api_base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "api_base_url must be an http(s) URL, got '{}'",
                self.api_base_url
            )));
        }
        for (name, value, max) in [
            ("request_timeout_secs", self.request_timeout_secs, MAX_REQUEST_TIMEOUT_SECS),
            ("poll_interval_secs", self.poll_interval_secs, MAX_POLL_INTERVAL_SECS),
            ("tick_interval_ms", self.tick_interval_ms, MAX_TICK_INTERVAL_MS),
        ] {
            if value == 0 || value > max {
                return Err(ConfigError::Invalid(format!(
                    "{} must be between 1 and {}, got {}",
                    name, max, value
                )));
            }
        }
        if self.expiry_recheck_secs > MAX_EXPIRY_RECHECK_SECS {
            return Err(ConfigError::Invalid(format!(
                "expiry_recheck_secs must be at most {}, got {}",
                MAX_EXPIRY_RECHECK_SECS, self.expiry_recheck_secs
            )));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Clamped so an unvalidated value cannot overflow.
    pub fn expiry_recheck(&self) -> chrono::Duration {
        let secs = self.expiry_recheck_secs.min(MAX_EXPIRY_RECHECK_SECS);
        chrono::Duration::seconds(i64::try_from(secs).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn no_env() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX).source(Some(HashMap::new()))
    }

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let map = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config::Environment::with_prefix(ENV_PREFIX).source(Some(map))
    }

    fn toml_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = ConsoleConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.poll_interval(), Duration::from_secs(15));
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let file = toml_file(
            r#"
            api_base_url = "https://pricing.example.com/api"
            api_token = "secret"
            poll_interval_secs = 30
            "#,
        );

        let config = ConsoleConfig::build(Some(file.path()), no_env()).unwrap();

        assert_eq!(config.api_base_url, "https://pricing.example.com/api");
        assert_eq!(config.api_token.as_deref(), Some("secret"));
        assert_eq!(config.poll_interval_secs, 30);
        assert_eq!(config.request_timeout_secs, 10);
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = toml_file("poll_interval_secs = 30\n");

        let config = ConsoleConfig::build(
            Some(file.path()),
            env(&[("CRASH_POLL_INTERVAL_SECS", "5"), ("CRASH_API_TOKEN", "from-env")]),
        )
        .unwrap();

        assert_eq!(config.poll_interval_secs, 5);
        assert_eq!(config.api_token.as_deref(), Some("from-env"));
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            ConsoleConfig::build(Some(&missing), no_env()),
            Err(ConfigError::Load(_))
        ));
    }

    #[test]
    fn test_rejects_bad_values() {
        let file = toml_file("api_base_url = \"ftp://nowhere\"\n");
        assert!(matches!(
            ConsoleConfig::build(Some(file.path()), no_env()),
            Err(ConfigError::Invalid(_))
        ));

        let config = ConsoleConfig {
            tick_interval_ms: 0,
            ..ConsoleConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = ConsoleConfig {
            poll_interval_secs: u64::MAX,
            ..ConsoleConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let env = env(&[("CRASH_EXPIRY_RECHECK_SECS", "10000000000000000")]);
        assert!(matches!(
            ConsoleConfig::build(None, env),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_expiry_recheck_never_overflows() {
        let config = ConsoleConfig {
            expiry_recheck_secs: 10_000_000_000_000_000,
            ..ConsoleConfig::default()
        };
        assert_eq!(config.expiry_recheck(), chrono::Duration::seconds(86_400));
        assert_eq!(
            ConsoleConfig::default().expiry_recheck(),
            chrono::Duration::seconds(5)
        );
    }
}
