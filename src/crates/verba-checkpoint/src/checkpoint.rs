//! Core checkpoint data structures
//!
//! A checkpoint is an opaque JSON snapshot (`values`) plus bookkeeping. The
//! saver never looks inside `values`; the workflow engine decides what goes in
//! there (state, next node, status).
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  CheckpointTuple                             │
//! │  ┌────────────────────────────────────────┐ │
//! │  │  CheckpointConfig                      │ │
//! │  │  • thread_id: "session-7f3c"           │ │
//! │  │  • checkpoint_id: "uuid-abc"           │ │
//! │  └────────────────────────────────────────┘ │
//! │  ┌────────────────────────────────────────┐ │
//! │  │  Checkpoint                            │ │
//! │  │  • v, id, ts                           │ │
//! │  │  • values: {"state": .., "next": ..}   │ │
//! │  └────────────────────────────────────────┘ │
//! │  ┌────────────────────────────────────────┐ │
//! │  │  CheckpointMetadata                    │ │
//! │  │  • source: input | loop | resume       │ │
//! │  │  • step: 3                             │ │
//! │  │  • node: "qc"                          │ │
//! │  └────────────────────────────────────────┘ │
//! │  parent_config: previous checkpoint (opt)   │
//! └──────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Checkpoint ID type
pub type CheckpointId = String;

/// Metadata source type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointSource {
    /// Checkpoint written when a run starts, before any node executes
    Input,
    /// Checkpoint written after a node completes
    Loop,
    /// Checkpoint written when human input is injected into a parked run
    Resume,
}

/// Metadata associated with a checkpoint
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CheckpointMetadata {
    /// The source of the checkpoint
    #[serde(default)]
    pub source: Option<CheckpointSource>,

    /// The step number of the checkpoint
    /// 0 for the input checkpoint, n after the nth node completes
    #[serde(default)]
    pub step: Option<i32>,

    /// Name of the node whose completion produced this checkpoint
    #[serde(default)]
    pub node: Option<String>,
}

impl CheckpointMetadata {
    /// Create a new checkpoint metadata
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the source
    pub fn with_source(mut self, source: CheckpointSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the step number
    pub fn with_step(mut self, step: i32) -> Self {
        self.step = Some(step);
        self
    }

    /// Set the producing node
    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }
}

/// State snapshot at a given point in time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    /// The version of the checkpoint format (currently 1)
    pub v: i32,

    /// The ID of the checkpoint (unique per write)
    pub id: CheckpointId,

    /// The timestamp of the checkpoint
    pub ts: DateTime<Utc>,

    /// Snapshot payload
    pub values: serde_json::Value,
}

impl Checkpoint {
    /// Current checkpoint format version
    pub const CURRENT_VERSION: i32 = 1;

    /// Create a new checkpoint with a fresh ID and the current time
    pub fn new(values: serde_json::Value) -> Self {
        Self {
            v: Self::CURRENT_VERSION,
            id: Uuid::new_v4().to_string(),
            ts: Utc::now(),
            values,
        }
    }

    /// Create an empty checkpoint
    pub fn empty() -> Self {
        Self::new(serde_json::Value::Object(Default::default()))
    }
}

/// Configuration for checkpoint operations
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct CheckpointConfig {
    /// Thread ID for grouping related checkpoints (the session key)
    #[serde(default)]
    pub thread_id: Option<String>,

    /// Specific checkpoint ID to retrieve
    #[serde(default)]
    pub checkpoint_id: Option<CheckpointId>,
}

impl CheckpointConfig {
    /// Create a new checkpoint configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration addressing the latest checkpoint of `thread_id`
    pub fn for_thread(thread_id: impl Into<String>) -> Self {
        Self::new().with_thread_id(thread_id)
    }

    /// Set the thread ID
    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    /// Set the checkpoint ID
    pub fn with_checkpoint_id(mut self, checkpoint_id: impl Into<CheckpointId>) -> Self {
        self.checkpoint_id = Some(checkpoint_id.into());
        self
    }

    /// The thread ID, or `Invalid` if missing
    pub fn require_thread_id(&self) -> crate::Result<&str> {
        self.thread_id
            .as_deref()
            .ok_or_else(|| crate::CheckpointError::Invalid("thread_id is required".to_string()))
    }
}

/// A tuple containing a checkpoint and its associated data
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointTuple {
    /// Configuration for this checkpoint
    pub config: CheckpointConfig,

    /// The checkpoint itself
    pub checkpoint: Checkpoint,

    /// Metadata associated with the checkpoint
    pub metadata: CheckpointMetadata,

    /// Parent configuration (if any)
    pub parent_config: Option<CheckpointConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_checkpoint_creation() {
        let checkpoint = Checkpoint::new(json!({"next": "qc"}));
        assert_eq!(checkpoint.v, Checkpoint::CURRENT_VERSION);
        assert_eq!(checkpoint.values["next"], "qc");
        assert_ne!(checkpoint.id, Checkpoint::empty().id);
    }

    #[test]
    fn test_checkpoint_metadata() {
        let metadata = CheckpointMetadata::new()
            .with_source(CheckpointSource::Loop)
            .with_step(2)
            .with_node("qc");

        assert_eq!(metadata.source, Some(CheckpointSource::Loop));
        assert_eq!(metadata.step, Some(2));
        assert_eq!(metadata.node.as_deref(), Some("qc"));
    }

    #[test]
    fn test_metadata_source_serializes_lowercase() {
        let metadata = CheckpointMetadata::new().with_source(CheckpointSource::Resume);
        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(value["source"], "resume");
    }

    #[test]
    fn test_checkpoint_config() {
        let config = CheckpointConfig::for_thread("thread-1").with_checkpoint_id("checkpoint-1");

        assert_eq!(config.thread_id.as_deref(), Some("thread-1"));
        assert_eq!(config.checkpoint_id.as_deref(), Some("checkpoint-1"));
        assert_eq!(config.require_thread_id().unwrap(), "thread-1");
    }

    #[test]
    fn test_missing_thread_id_is_invalid() {
        let err = CheckpointConfig::new().require_thread_id().unwrap_err();
        assert!(matches!(err, crate::CheckpointError::Invalid(_)));
    }
}
