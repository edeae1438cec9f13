//! Prefixed environment variable access
//!
//! [`EnvReader`] resolves `{prefix}{NAME}` keys through a lookup function. In
//! production the lookup is `std::env::var`; tests build a reader from a map.

use crate::{Result, ToolingError};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

type Lookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Reads prefixed configuration values from the environment
#[derive(Clone)]
pub struct EnvReader {
    prefix: String,
    lookup: Lookup,
}

impl fmt::Debug for EnvReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvReader")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl EnvReader {
    /// Reader backed by the process environment
    ///
    /// Variables that are present but not valid UTF-8 are treated as absent.
    pub fn process(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            lookup: Arc::new(|key| std::env::var(key).ok()),
        }
    }

    /// Reader backed by a fixed set of fully-qualified key/value pairs
    pub fn from_pairs<K, V, I>(prefix: impl Into<String>, pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let map: HashMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            prefix: prefix.into(),
            lookup: Arc::new(move |key| map.get(key).cloned()),
        }
    }

    /// Same lookup, different prefix
    pub fn with_prefix(&self, prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            lookup: self.lookup.clone(),
        }
    }

    /// The prefix prepended to every name
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Build the full variable name for `name` (uppercased)
    ///
    /// ```rust
    /// use tooling::config::EnvReader;
    ///
    /// let env = EnvReader::from_pairs("VERBA_", Vec::<(String, String)>::new());
    /// assert_eq!(env.key("pass_threshold"), "VERBA_PASS_THRESHOLD");
    /// ```
    pub fn key(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name.to_uppercase())
    }

    /// Raw string value; empty strings count as unset
    pub fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(&self.key(name)).filter(|v| !v.trim().is_empty())
    }

    /// Parse the value with `FromStr`
    pub fn parse<T>(&self, name: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.string(name) {
            Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
                ToolingError::config(format!(
                    "Failed to parse environment variable {}: {}",
                    self.key(name),
                    e
                ))
            }),
            None => Ok(None),
        }
    }

    /// Boolean flag
    ///
    /// Recognizes: "true", "1", "yes", "on" and "false", "0", "no", "off"
    /// (case-insensitive).
    pub fn flag(&self, name: &str) -> Result<Option<bool>> {
        let Some(raw) = self.string(name) else {
            return Ok(None);
        };
        match raw.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Some(true)),
            "false" | "0" | "no" | "off" => Ok(Some(false)),
            _ => Err(ToolingError::config(format!(
                "Invalid boolean value for {}: {}",
                self.key(name),
                raw
            ))),
        }
    }

    /// Whole or fractional seconds as a `Duration`
    pub fn seconds(&self, name: &str) -> Result<Option<Duration>> {
        match self.parse::<f64>(name)? {
            Some(secs) if secs.is_finite() && secs >= 0.0 => {
                Ok(Some(Duration::from_secs_f64(secs)))
            }
            Some(secs) => Err(ToolingError::config(format!(
                "{} must be a non-negative number of seconds, got {}",
                self.key(name),
                secs
            ))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(pairs: &[(&str, &str)]) -> EnvReader {
        EnvReader::from_pairs(
            "VERBA_",
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())),
        )
    }

    #[test]
    fn test_missing_value() {
        let env = reader(&[]);
        assert!(env.string("DATA_DIR").is_none());
        assert_eq!(env.parse::<u8>("PASS_THRESHOLD").unwrap(), None);
    }

    #[test]
    fn test_empty_value_is_unset() {
        let env = reader(&[("VERBA_DATA_DIR", "  ")]);
        assert!(env.string("DATA_DIR").is_none());
    }

    #[test]
    fn test_parse_value() {
        let env = reader(&[("VERBA_PASS_THRESHOLD", " 9 ")]);
        assert_eq!(env.parse::<u8>("pass_threshold").unwrap(), Some(9));
    }

    #[test]
    fn test_parse_invalid_value() {
        let env = reader(&[("VERBA_PASS_THRESHOLD", "high")]);
        let err = env.parse::<u8>("PASS_THRESHOLD").unwrap_err();
        assert!(err.to_string().contains("VERBA_PASS_THRESHOLD"));
    }

    #[test]
    fn test_flag_values() {
        for (raw, expected) in [("true", true), ("ON", true), ("1", true), ("no", false), ("0", false)] {
            let env = reader(&[("VERBA_KEEP_COMPLETED", raw)]);
            assert_eq!(env.flag("KEEP_COMPLETED").unwrap(), Some(expected), "value {}", raw);
        }
    }

    #[test]
    fn test_flag_invalid() {
        let env = reader(&[("VERBA_KEEP_COMPLETED", "maybe")]);
        assert!(env.flag("KEEP_COMPLETED").is_err());
    }

    #[test]
    fn test_seconds() {
        let env = reader(&[("VERBA_READ_TIMEOUT_SECS", "1.5")]);
        assert_eq!(
            env.seconds("READ_TIMEOUT_SECS").unwrap(),
            Some(Duration::from_millis(1500))
        );

        let env = reader(&[("VERBA_READ_TIMEOUT_SECS", "-3")]);
        assert!(env.seconds("READ_TIMEOUT_SECS").is_err());
    }

    #[test]
    fn test_with_prefix_shares_lookup() {
        let env = reader(&[("VERBA_SERVICE_BASE_URL", "http://qc:9000")]);
        let service = env.with_prefix("VERBA_SERVICE_");
        assert_eq!(service.string("BASE_URL").as_deref(), Some("http://qc:9000"));
    }
}
