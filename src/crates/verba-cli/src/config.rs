//! CLI configuration file
//!
//! ```toml
//! [engine]
//! pass_threshold = 8
//! data_dir = ".verba"
//!
//! [service]
//! base_url = "http://localhost:8000"
//! read_timeout_secs = 180
//! ```
//!
//! Precedence: defaults < file < `VERBA_*` / `VERBA_SERVICE_*` environment < flags.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tooling::config::{ConfigBuilder, EnvReader};
use verba_core::EngineConfig;
use verba_http::ServiceConfig;

/// Values given as command-line flags
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub data_dir: Option<PathBuf>,
    pub pass_threshold: Option<u8>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerbaConfig {
    pub engine: EngineConfig,
    pub service: ServiceConfig,
}

impl VerbaConfig {
    /// Read `path` (if given) and overlay the process environment
    pub async fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        Self::load_with_env(path, &EnvReader::process("")).await
    }

    pub async fn load_with_env(path: Option<&Path>, env: &EnvReader) -> anyhow::Result<Self> {
        let file = match path {
            Some(path) => {
                let raw = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("failed to read config file {}", path.display()))?;
                toml::from_str::<VerbaConfig>(&raw)
                    .with_context(|| format!("invalid config file {}", path.display()))?
            }
            None => VerbaConfig::default(),
        };

        Ok(Self {
            engine: file.engine.overlay(env)?,
            service: file.service.overlay(env)?,
        })
    }

    /// Apply flag values on top and validate the result again
    pub fn with_overrides(mut self, overrides: Overrides) -> anyhow::Result<Self> {
        if let Some(dir) = overrides.data_dir {
            self.engine.data_dir = dir;
        }
        if let Some(threshold) = overrides.pass_threshold {
            self.engine.pass_threshold = threshold;
        }
        if let Some(url) = overrides.base_url {
            self.service.base_url = url;
        }

        self.engine.validate().context("invalid engine settings")?;
        self.service.validate().context("invalid service settings")?;
        Ok(self)
    }
}
