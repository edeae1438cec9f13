//! In-memory checkpoint storage
//!
//! [`InMemoryCheckpointSaver`] keeps the full checkpoint history of every
//! thread in an `Arc<RwLock<HashMap>>`. Clones share the same storage. Data is
//! lost when the process exits, so this saver is meant for tests and for
//! single-process runs that never outlive a suspension.
//!
//! ```text
//! Arc<RwLock<HashMap>>
//!   thread_id: "session-1"
//!     ├─ [0] entry (step 0, input)
//!     ├─ [1] entry (step 1, translate)
//!     └─ [2] entry (step 2, qc)
//!   thread_id: "session-2"
//!     └─ [0] entry (step 0, input)
//! ```

use crate::{
    checkpoint::{Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointTuple},
    claim::{ClaimRegistry, ThreadClaim},
    error::Result,
    traits::{CheckpointSaver, CheckpointStream},
};
use async_trait::async_trait;
use futures::stream;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Storage entry for in-memory checkpoints
#[derive(Debug, Clone)]
struct CheckpointEntry {
    checkpoint: Checkpoint,
    metadata: CheckpointMetadata,
    config: CheckpointConfig,
    parent_config: Option<CheckpointConfig>,
}

impl CheckpointEntry {
    fn to_tuple(&self) -> CheckpointTuple {
        CheckpointTuple {
            config: self.config.clone(),
            checkpoint: self.checkpoint.clone(),
            metadata: self.metadata.clone(),
            parent_config: self.parent_config.clone(),
        }
    }
}

type CheckpointStorage = Arc<RwLock<HashMap<String, Vec<CheckpointEntry>>>>;

/// In-memory checkpoint saver implementation
///
/// ```rust
/// use verba_checkpoint::{Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointSaver, InMemoryCheckpointSaver};
///
/// # #[tokio::main]
/// # async fn main() -> verba_checkpoint::Result<()> {
/// let saver = InMemoryCheckpointSaver::new();
/// let config = CheckpointConfig::for_thread("session-1");
///
/// saver.put(&config, Checkpoint::empty(), CheckpointMetadata::new()).await?;
/// assert!(saver.get_tuple(&config).await?.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryCheckpointSaver {
    storage: CheckpointStorage,
    claims: ClaimRegistry,
}

impl InMemoryCheckpointSaver {
    /// Create a new in-memory checkpoint saver
    pub fn new() -> Self {
        Self {
            storage: Arc::new(RwLock::new(HashMap::new())),
            claims: ClaimRegistry::new(),
        }
    }

    /// Get the number of threads being tracked
    pub async fn thread_count(&self) -> usize {
        self.storage.read().await.len()
    }

    /// Get the total number of checkpoints across all threads
    pub async fn checkpoint_count(&self) -> usize {
        self.storage
            .read()
            .await
            .values()
            .map(|entries| entries.len())
            .sum()
    }
}

impl Default for InMemoryCheckpointSaver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CheckpointSaver for InMemoryCheckpointSaver {
    async fn get_tuple(&self, config: &CheckpointConfig) -> Result<Option<CheckpointTuple>> {
        let thread_id = config.require_thread_id()?;
        let storage = self.storage.read().await;

        let Some(entries) = storage.get(thread_id) else {
            return Ok(None);
        };

        let entry = match &config.checkpoint_id {
            Some(checkpoint_id) => entries.iter().find(|e| &e.checkpoint.id == checkpoint_id),
            None => entries.last(),
        };

        Ok(entry.map(CheckpointEntry::to_tuple))
    }

    async fn list(
        &self,
        config: Option<&CheckpointConfig>,
        limit: Option<usize>,
    ) -> Result<CheckpointStream> {
        let storage = self.storage.read().await;

        let mut results: Vec<CheckpointTuple> = match config.and_then(|c| c.thread_id.as_ref()) {
            Some(thread_id) => storage
                .get(thread_id)
                .map(|entries| entries.iter().rev().map(CheckpointEntry::to_tuple).collect())
                .unwrap_or_default(),
            None => {
                let mut all: Vec<CheckpointTuple> = storage
                    .values()
                    .flat_map(|entries| entries.iter().rev().map(CheckpointEntry::to_tuple))
                    .collect();
                all.sort_by(|a, b| b.checkpoint.ts.cmp(&a.checkpoint.ts));
                all
            }
        };

        if let Some(limit) = limit {
            results.truncate(limit);
        }

        Ok(Box::pin(stream::iter(results.into_iter().map(Ok))))
    }

    async fn put(
        &self,
        config: &CheckpointConfig,
        checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
    ) -> Result<CheckpointConfig> {
        let thread_id = config.require_thread_id()?.to_string();

        let mut storage = self.storage.write().await;
        let entries = storage.entry(thread_id.clone()).or_default();

        let checkpoint_config = CheckpointConfig::for_thread(thread_id)
            .with_checkpoint_id(checkpoint.id.clone());

        let parent_config = entries.last().map(|e| e.config.clone());
        entries.push(CheckpointEntry {
            parent_config,
            checkpoint,
            metadata,
            config: checkpoint_config.clone(),
        });

        Ok(checkpoint_config)
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        self.storage.write().await.remove(thread_id);
        Ok(())
    }

    async fn claim_thread(&self, thread_id: &str) -> Result<Option<ThreadClaim>> {
        Ok(self.claims.try_claim(thread_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::CheckpointSource;
    use futures::StreamExt;
    use serde_json::json;

    #[tokio::test]
    async fn test_save_and_load_checkpoint() {
        let saver = InMemoryCheckpointSaver::new();
        let checkpoint = Checkpoint::new(json!({"next": "translate"}));
        let metadata = CheckpointMetadata::new().with_source(CheckpointSource::Input);
        let config = CheckpointConfig::for_thread("thread-1");

        let saved_config = saver
            .put(&config, checkpoint.clone(), metadata)
            .await
            .unwrap();
        assert_eq!(saved_config.checkpoint_id.as_deref(), Some(checkpoint.id.as_str()));

        let tuple = saver.get_tuple(&saved_config).await.unwrap().unwrap();
        assert_eq!(tuple.checkpoint, checkpoint);
        assert_eq!(tuple.metadata.source, Some(CheckpointSource::Input));
        assert!(tuple.parent_config.is_none());
    }

    #[tokio::test]
    async fn test_latest_wins_and_history_is_kept() {
        let saver = InMemoryCheckpointSaver::new();
        let config = CheckpointConfig::for_thread("thread-1");

        let first = saver
            .put(&config, Checkpoint::new(json!({"step": 0})), CheckpointMetadata::new().with_step(0))
            .await
            .unwrap();
        saver
            .put(&config, Checkpoint::new(json!({"step": 1})), CheckpointMetadata::new().with_step(1))
            .await
            .unwrap();

        let latest = saver.get_tuple(&config).await.unwrap().unwrap();
        assert_eq!(latest.checkpoint.values["step"], 1);
        assert_eq!(latest.parent_config, Some(first.clone()));

        let older = saver.get_tuple(&first).await.unwrap().unwrap();
        assert_eq!(older.checkpoint.values["step"], 0);
        assert_eq!(saver.checkpoint_count().await, 2);
    }

    #[tokio::test]
    async fn test_list_newest_first_with_limit() {
        let saver = InMemoryCheckpointSaver::new();
        let config = CheckpointConfig::for_thread("thread-1");

        for i in 0..3 {
            saver
                .put(&config, Checkpoint::empty(), CheckpointMetadata::new().with_step(i))
                .await
                .unwrap();
        }

        let steps: Vec<_> = saver
            .list(Some(&config), None)
            .await
            .unwrap()
            .map(|r| r.unwrap().metadata.step.unwrap())
            .collect()
            .await;
        assert_eq!(steps, vec![2, 1, 0]);

        let limited: Vec<_> = saver.list(Some(&config), Some(1)).await.unwrap().collect().await;
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_list_all_threads() {
        let saver = InMemoryCheckpointSaver::new();
        for thread in ["a", "b"] {
            saver
                .put(&CheckpointConfig::for_thread(thread), Checkpoint::empty(), CheckpointMetadata::new())
                .await
                .unwrap();
        }

        let all: Vec<_> = saver.list(None, None).await.unwrap().collect().await;
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_thread_returns_none() {
        let saver = InMemoryCheckpointSaver::new();
        let found = saver.get_tuple(&CheckpointConfig::for_thread("missing")).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_put_requires_thread_id() {
        let saver = InMemoryCheckpointSaver::new();
        let result = saver
            .put(&CheckpointConfig::new(), Checkpoint::empty(), CheckpointMetadata::new())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_delete_thread() {
        let saver = InMemoryCheckpointSaver::new();
        let config = CheckpointConfig::for_thread("thread-1");

        saver.put(&config, Checkpoint::empty(), CheckpointMetadata::new()).await.unwrap();
        assert_eq!(saver.thread_count().await, 1);

        saver.delete_thread("thread-1").await.unwrap();
        assert_eq!(saver.thread_count().await, 0);

        // Deleting again is a no-op
        saver.delete_thread("thread-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_clones_share_storage() {
        let saver = InMemoryCheckpointSaver::new();
        let clone = saver.clone();

        clone
            .put(&CheckpointConfig::for_thread("t"), Checkpoint::empty(), CheckpointMetadata::new())
            .await
            .unwrap();
        assert_eq!(saver.checkpoint_count().await, 1);

        saver.delete_thread("t").await.unwrap();
        assert_eq!(clone.checkpoint_count().await, 0);
    }

    #[tokio::test]
    async fn test_claims_are_shared_by_clones() {
        let saver = InMemoryCheckpointSaver::new();
        let claim = saver.claim_thread("t").await.unwrap().unwrap();

        assert!(saver.clone().claim_thread("t").await.unwrap().is_none());
        assert!(saver.claim_thread("other").await.unwrap().is_some());

        drop(claim);
        assert!(saver.claim_thread("t").await.unwrap().is_some());
    }
}
