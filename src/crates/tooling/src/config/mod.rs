//! Configuration management utilities
//!
//! Every verba configuration struct follows the same three-layer pattern:
//!
//! 1. Start from `Default` (the documented defaults)
//! 2. Overlay values from an optional file (TOML, handled by the caller)
//! 3. Overlay `{PREFIX}{NAME}` environment variables, then `validate()`
//!
//! The environment is read through [`EnvReader`] rather than `std::env`
//! directly so tests can feed a fixed map instead of mutating process state.
//!
//! # Example
//!
//! ```rust
//! use tooling::config::{ConfigBuilder, EnvReader};
//!
//! #[derive(Debug, Clone)]
//! struct ReviewConfig {
//!     threshold: u8,
//! }
//!
//! impl Default for ReviewConfig {
//!     fn default() -> Self {
//!         Self { threshold: 8 }
//!     }
//! }
//!
//! impl ConfigBuilder for ReviewConfig {
//!     const ENV_PREFIX: &'static str = "REVIEW_";
//!
//!     fn apply_env(&mut self, env: &EnvReader) -> tooling::Result<()> {
//!         if let Some(threshold) = env.parse("THRESHOLD")? {
//!             self.threshold = threshold;
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let env = EnvReader::from_pairs("REVIEW_", [("REVIEW_THRESHOLD", "9")]);
//! let config = ReviewConfig::from_reader(&env).unwrap();
//! assert_eq!(config.threshold, 9);
//! ```

mod builder;
mod env;

pub use builder::ConfigBuilder;
pub use env::EnvReader;
