//! Engine configuration
//!
//! Defaults, optionally replaced by a `[engine]` TOML table, then overlaid
//! by `VERBA_*` environment variables.
//!
//! | Variable                  | Default                    |
//! |---------------------------|----------------------------|
//! | `VERBA_PASS_THRESHOLD`    | `8`                        |
//! | `VERBA_DATA_DIR`          | `.verba`                   |
//! | `VERBA_CORRECTIONS_FILE`  | `learned_corrections.json` |
//! | `VERBA_AUDIT_FILE`        | `audit_trail.jsonl`        |
//! | `VERBA_CHECKPOINT_DIR`    | `checkpoints`              |
//! | `VERBA_KEEP_COMPLETED`    | `false`                    |
//!
//! File names are resolved against `data_dir` unless absolute.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tooling::config::{ConfigBuilder, EnvReader};
use tooling::ToolingError;

pub const DEFAULT_PASS_THRESHOLD: u8 = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum accuracy and hallucination score for a pass
    pub pass_threshold: u8,
    pub data_dir: PathBuf,
    pub corrections_file: PathBuf,
    pub audit_file: PathBuf,
    pub checkpoint_dir: PathBuf,
    /// Keep the terminal checkpoint instead of deleting it
    pub keep_completed: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pass_threshold: DEFAULT_PASS_THRESHOLD,
            data_dir: PathBuf::from(".verba"),
            corrections_file: PathBuf::from("learned_corrections.json"),
            audit_file: PathBuf::from("audit_trail.jsonl"),
            checkpoint_dir: PathBuf::from("checkpoints"),
            keep_completed: false,
        }
    }
}

impl EngineConfig {
    pub fn corrections_path(&self) -> PathBuf {
        self.data_dir.join(&self.corrections_file)
    }

    pub fn audit_path(&self) -> PathBuf {
        self.data_dir.join(&self.audit_file)
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.data_dir.join(&self.checkpoint_dir)
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_pass_threshold(mut self, threshold: u8) -> Self {
        self.pass_threshold = threshold;
        self
    }
}

impl ConfigBuilder for EngineConfig {
    const ENV_PREFIX: &'static str = "VERBA_";

    fn apply_env(&mut self, env: &EnvReader) -> tooling::Result<()> {
        if let Some(threshold) = env.parse("PASS_THRESHOLD")? {
            self.pass_threshold = threshold;
        }
        if let Some(dir) = env.string("DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(file) = env.string("CORRECTIONS_FILE") {
            self.corrections_file = PathBuf::from(file);
        }
        if let Some(file) = env.string("AUDIT_FILE") {
            self.audit_file = PathBuf::from(file);
        }
        if let Some(dir) = env.string("CHECKPOINT_DIR") {
            self.checkpoint_dir = PathBuf::from(dir);
        }
        if let Some(keep) = env.flag("KEEP_COMPLETED")? {
            self.keep_completed = keep;
        }
        Ok(())
    }

    fn validate(&self) -> tooling::Result<()> {
        if !(1..=10).contains(&self.pass_threshold) {
            return Err(ToolingError::config(format!(
                "pass_threshold must be between 1 and 10, got {}",
                self.pass_threshold
            )));
        }
        for (name, path) in [
            ("corrections_file", &self.corrections_file),
            ("audit_file", &self.audit_file),
            ("checkpoint_dir", &self.checkpoint_dir),
        ] {
            if path.as_os_str().is_empty() {
                return Err(ToolingError::config(format!("{} must not be empty", name)));
            }
        }
        Ok(())
    }
}
