//! Checkpoint storage trait
//!
//! [`CheckpointSaver`] is the persistence boundary of the workflow engine.
//! Checkpoints are grouped by `thread_id`, which the engine sets to the
//! session key. A saver must:
//!
//! 1. Return the **latest** checkpoint of a thread when no `checkpoint_id` is given
//! 2. Return `Ok(None)` (not an error) when nothing matches
//! 3. Make `put` durable before returning, to the extent the backend allows
//! 4. Treat `delete_thread` on an unknown thread as a no-op
//! 5. Grant at most one live [`ThreadClaim`] per thread among every saver
//!    sharing the same storage
//!
//! ```text
//!   WorkflowMachine                    CheckpointSaver
//!   ───────────────                    ───────────────
//!   start(key)   ── claim_thread  ──▶  claim held until the call returns
//!                ── put(input)    ──▶  thread "key": [c0]
//!   node done    ── put(loop)     ──▶  thread "key": [c0, c1, ..]
//!   resume(key)  ── get_tuple     ──▶  latest cN
//!   end          ── delete_thread ──▶  thread "key" removed
//! ```

use crate::checkpoint::{Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointTuple};
use crate::claim::ThreadClaim;
use crate::error::Result;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Stream of checkpoint tuples returned by [`CheckpointSaver::list`]
pub type CheckpointStream =
    Pin<Box<dyn Stream<Item = Result<CheckpointTuple>> + Send + 'static>>;

/// Core trait for checkpoint storage backends
#[async_trait]
pub trait CheckpointSaver: Send + Sync {
    /// Fetch a checkpoint using the given configuration
    async fn get(&self, config: &CheckpointConfig) -> Result<Option<Checkpoint>> {
        Ok(self.get_tuple(config).await?.map(|tuple| tuple.checkpoint))
    }

    /// Retrieve a checkpoint tuple
    ///
    /// With `checkpoint_id` set, only that exact checkpoint matches;
    /// otherwise the latest checkpoint of the thread is returned.
    async fn get_tuple(&self, config: &CheckpointConfig) -> Result<Option<CheckpointTuple>>;

    /// List checkpoints, newest first
    ///
    /// A config with a `thread_id` restricts the listing to that thread;
    /// `None` lists every thread.
    async fn list(
        &self,
        config: Option<&CheckpointConfig>,
        limit: Option<usize>,
    ) -> Result<CheckpointStream>;

    /// Store a checkpoint and return the config addressing it
    async fn put(
        &self,
        config: &CheckpointConfig,
        checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
    ) -> Result<CheckpointConfig>;

    /// Delete every checkpoint of a thread
    async fn delete_thread(&self, thread_id: &str) -> Result<()>;

    /// Take exclusive ownership of a thread
    ///
    /// Returns `Ok(None)` while another claim on the thread is alive. The
    /// claim is released when the returned guard is dropped.
    async fn claim_thread(&self, thread_id: &str) -> Result<Option<ThreadClaim>>;
}
