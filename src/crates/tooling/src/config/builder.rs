//! Configuration builder trait
//!
//! Gives every configuration struct the same defaults → file → environment →
//! validate pipeline.

use super::EnvReader;
use crate::Result;

/// Trait for configuration structures loaded from defaults and the environment
pub trait ConfigBuilder: Default + Clone {
    /// Prefix for environment variable names, e.g. `"VERBA_"`
    const ENV_PREFIX: &'static str;

    /// Overwrite fields for which the environment provides a value
    fn apply_env(&mut self, env: &EnvReader) -> Result<()>;

    /// Validate the configuration
    ///
    /// Default implementation accepts everything.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Defaults overlaid with the process environment, validated
    fn from_env() -> Result<Self> {
        Self::from_reader(&EnvReader::process(Self::ENV_PREFIX))
    }

    /// Defaults overlaid with `env`, validated
    fn from_reader(env: &EnvReader) -> Result<Self> {
        Self::default().overlay(env)
    }

    /// Overlay `env` on an existing configuration (e.g. one read from a file)
    /// and validate the result
    fn overlay(mut self, env: &EnvReader) -> Result<Self> {
        let env = env.with_prefix(Self::ENV_PREFIX);
        self.apply_env(&env)?;
        self.validate()?;
        Ok(self)
    }
}
