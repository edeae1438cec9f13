//! Service connection settings
//!
//! Generation is slow, so reads get a long budget while connecting, writing
//! and waiting for a pooled connection get short ones.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tooling::config::{ConfigBuilder, EnvReader};
use tooling::ToolingError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Connection settings for the translation/QC service (`VERBA_SERVICE_*`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub base_url: String,
    pub connect_timeout_secs: f64,
    pub read_timeout_secs: f64,
    pub write_timeout_secs: f64,
    /// Idle time before a pooled connection is closed
    pub pool_timeout_secs: f64,
    pub max_idle_connections: usize,
    /// Retries after the first attempt, transient failures only
    pub max_retries: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout_secs: 10.0,
            read_timeout_secs: 180.0,
            write_timeout_secs: 30.0,
            pool_timeout_secs: 10.0,
            max_idle_connections: 5,
            max_retries: 3,
        }
    }
}

impl ServiceConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout_secs = timeout.as_secs_f64();
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        secs(self.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        secs(self.write_timeout_secs)
    }

    pub fn pool_timeout(&self) -> Duration {
        secs(self.pool_timeout_secs)
    }

    /// Budget for one whole request: sending the body plus reading the reply
    pub fn request_timeout(&self) -> Duration {
        self.write_timeout() + self.read_timeout()
    }

    /// `base_url` joined with `path`
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

impl ConfigBuilder for ServiceConfig {
    const ENV_PREFIX: &'static str = "VERBA_SERVICE_";

    fn apply_env(&mut self, env: &EnvReader) -> tooling::Result<()> {
        if let Some(url) = env.string("BASE_URL") {
            self.base_url = url;
        }
        if let Some(timeout) = env.seconds("CONNECT_TIMEOUT_SECS")? {
            self.connect_timeout_secs = timeout.as_secs_f64();
        }
        if let Some(timeout) = env.seconds("READ_TIMEOUT_SECS")? {
            self.read_timeout_secs = timeout.as_secs_f64();
        }
        if let Some(timeout) = env.seconds("WRITE_TIMEOUT_SECS")? {
            self.write_timeout_secs = timeout.as_secs_f64();
        }
        if let Some(timeout) = env.seconds("POOL_TIMEOUT_SECS")? {
            self.pool_timeout_secs = timeout.as_secs_f64();
        }
        if let Some(max) = env.parse("MAX_IDLE_CONNECTIONS")? {
            self.max_idle_connections = max;
        }
        if let Some(max) = env.parse("MAX_RETRIES")? {
            self.max_retries = max;
        }
        Ok(())
    }

    fn validate(&self) -> tooling::Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ToolingError::config(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        for (name, secs) in [
            ("connect_timeout_secs", self.connect_timeout_secs),
            ("read_timeout_secs", self.read_timeout_secs),
            ("write_timeout_secs", self.write_timeout_secs),
            ("pool_timeout_secs", self.pool_timeout_secs),
        ] {
            if !secs.is_finite() || secs <= 0.0 {
                return Err(ToolingError::config(format!(
                    "{} must be positive, got {}",
                    name, secs
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_service_budget() {
        let config = ServiceConfig::default();
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.read_timeout(), Duration::from_secs(180));
        assert_eq!(config.request_timeout(), Duration::from_secs(210));
        assert_eq!(config.max_idle_connections, 5);
    }

    #[test]
    fn test_env_overlay() {
        let env = EnvReader::from_pairs(
            "",
            [
                ("VERBA_SERVICE_BASE_URL", "http://translator:9000/"),
                ("VERBA_SERVICE_READ_TIMEOUT_SECS", "60"),
                ("VERBA_SERVICE_MAX_RETRIES", "0"),
            ],
        );
        let config = ServiceConfig::from_reader(&env).unwrap();
        assert_eq!(config.url("/AI_QC"), "http://translator:9000/AI_QC");
        assert_eq!(config.read_timeout(), Duration::from_secs(60));
        assert_eq!(config.max_retries, 0);
    }

    #[test]
    fn test_validation() {
        let env = EnvReader::from_pairs("", [("VERBA_SERVICE_BASE_URL", "localhost:8000")]);
        assert!(ServiceConfig::from_reader(&env).is_err());

        let config = ServiceConfig {
            connect_timeout_secs: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
