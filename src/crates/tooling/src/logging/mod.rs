//! Logging utilities
//!
//! Subscriber setup for binaries plus helpers for structured logging with
//! tracing. Library crates only emit events; installing a subscriber is the
//! binary's job (see [`init_tracing`]).
//!
//! Workflow nodes report progress through [`log_step`], which emits a single
//! `STEP_UPDATE` event carrying the node name, a message and a JSON snapshot of
//! the state the node produced:
//!
//! ```text
//! INFO verba::step: STEP_UPDATE node="qc" message="Scored translation" snapshot={"qc_result":{...}}
//! ```

use std::time::Instant;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::{Result, ToolingError};

/// Target used for step records so they can be filtered independently
pub const STEP_TARGET: &str = "verba::step";

/// Output format for the fmt subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable single-line output
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ToolingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(ToolingError::config(format!("Unknown log format: {}", other))),
        }
    }
}

/// Install a global fmt subscriber filtered by `RUST_LOG` (default `info`)
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = match format {
        LogFormat::Text => builder.with_target(false).try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    installed.map_err(|e| ToolingError::Logging(e.to_string()))
}

/// Emit the structured `STEP_UPDATE` record for a workflow node
pub fn log_step(node: &str, snapshot: &serde_json::Value, message: &str) {
    tracing::info!(
        target: STEP_TARGET,
        node = %node,
        snapshot = %snapshot,
        message = %message,
        "STEP_UPDATE"
    );
}

/// Log execution time of a future at debug level
///
/// ```rust,ignore
/// use tooling::logging::timed;
///
/// let response = timed("POST /AI_Translation", client.post(url).send()).await;
/// ```
pub async fn timed<F, T>(name: &str, future: F) -> T
where
    F: std::future::Future<Output = T>,
{
    let start = Instant::now();
    debug!("Starting: {}", name);

    let result = future.await;

    debug!("Completed: {} in {}", name, format_duration(start.elapsed()));
    result
}

/// Format duration in human-readable form
///
/// ```rust
/// use tooling::logging::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
/// assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
/// ```
pub fn format_duration(duration: std::time::Duration) -> String {
    let micros = duration.as_micros();

    if micros < 1000 {
        format!("{}μs", micros)
    } else if micros < 1_000_000 {
        format!("{}ms", micros / 1000)
    } else if micros < 60_000_000 {
        format!("{:.2}s", micros as f64 / 1_000_000.0)
    } else {
        let seconds = micros / 1_000_000;
        format!("{}m{}s", seconds / 60, seconds % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(" Text ".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_micros(500)), "500μs");
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m5s");
    }

    #[test]
    fn test_log_step_without_subscriber() {
        // No subscriber installed: must be a silent no-op
        log_step("translate", &serde_json::json!({"translated_text": "Bonjour"}), "Translated");
    }

    #[tokio::test]
    async fn test_timed_returns_inner_value() {
        let value = timed("answer", async { 42 }).await;
        assert_eq!(value, 42);
    }
}
