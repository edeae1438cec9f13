//! File-backed checkpoint storage
//!
//! [`FileCheckpointSaver`] writes one file per thread into a directory and
//! keeps only the latest checkpoint of each thread. That is all a parked
//! workflow needs to survive a process restart before it is resumed.
//!
//! ```text
//! checkpoints/
//!   session-7f3c.json        latest checkpoint of "session-7f3c"
//!   session-7f3c.lock        claim lock of "session-7f3c"
//!   user%2F42.json           thread ids are percent-encoded
//! ```
//!
//! Writes go to a uniquely named temporary file that is then renamed over the
//! target, so readers never observe a half-written checkpoint.
//!
//! Claims take an exclusive advisory lock (`fd-lock`) on the thread's lock
//! file, so two processes sharing a directory never advance the same thread
//! at once. The OS drops the lock when the holder exits, crashed or not. Lock
//! files are left in place; deleting one while it is held would let a second
//! process lock a fresh file of the same name.

use crate::{
    checkpoint::{Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointTuple},
    claim::ThreadClaim,
    error::{CheckpointError, Result},
    serializer::{JsonSerializer, SerializerProtocol},
    traits::{CheckpointSaver, CheckpointStream},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fd_lock::RwLock;
use futures::stream;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// On-disk record
///
/// `values` is kept as JSON text so binary serializers never have to handle
/// `serde_json::Value`.
#[derive(Debug, Serialize, Deserialize)]
struct StoredCheckpoint {
    thread_id: String,
    v: i32,
    id: String,
    ts: DateTime<Utc>,
    values: String,
    metadata: CheckpointMetadata,
    parent_id: Option<String>,
}

impl StoredCheckpoint {
    fn into_tuple(self) -> Result<CheckpointTuple> {
        let values = serde_json::from_str(&self.values)?;
        let config = CheckpointConfig::for_thread(self.thread_id.clone()).with_checkpoint_id(self.id.clone());
        let parent_config = self
            .parent_id
            .map(|id| CheckpointConfig::for_thread(self.thread_id.clone()).with_checkpoint_id(id));

        Ok(CheckpointTuple {
            config,
            checkpoint: Checkpoint {
                v: self.v,
                id: self.id,
                ts: self.ts,
                values,
            },
            metadata: self.metadata,
            parent_config,
        })
    }
}

/// Checkpoint saver that persists the latest checkpoint of each thread to disk
#[derive(Debug, Clone)]
pub struct FileCheckpointSaver<S: SerializerProtocol = JsonSerializer> {
    dir: PathBuf,
    serializer: S,
}

impl FileCheckpointSaver<JsonSerializer> {
    /// JSON-encoded checkpoints under `dir` (created on first write)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_serializer(dir, JsonSerializer)
    }
}

impl<S: SerializerProtocol> FileCheckpointSaver<S> {
    /// Checkpoints under `dir` encoded with `serializer`
    pub fn with_serializer(dir: impl Into<PathBuf>, serializer: S) -> Self {
        Self {
            dir: dir.into(),
            serializer,
        }
    }

    /// Directory holding the checkpoint files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `thread_id`'s checkpoint
    pub fn path_for(&self, thread_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", encode_thread_id(thread_id), self.serializer.extension()))
    }

    /// Path of the lock file guarding `thread_id`
    pub fn lock_path_for(&self, thread_id: &str) -> PathBuf {
        self.dir.join(format!("{}.lock", encode_thread_id(thread_id)))
    }

    async fn read_stored(&self, path: &Path) -> Result<Option<StoredCheckpoint>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(self.serializer.loads(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| CheckpointError::Storage(format!("invalid path {}", path.display())))?;
        let tmp = self.dir.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

        tokio::fs::write(&tmp, bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl<S: SerializerProtocol + 'static> CheckpointSaver for FileCheckpointSaver<S> {
    async fn get_tuple(&self, config: &CheckpointConfig) -> Result<Option<CheckpointTuple>> {
        let thread_id = config.require_thread_id()?;

        let Some(stored) = self.read_stored(&self.path_for(thread_id)).await? else {
            return Ok(None);
        };

        if let Some(checkpoint_id) = &config.checkpoint_id {
            if &stored.id != checkpoint_id {
                return Ok(None);
            }
        }

        stored.into_tuple().map(Some)
    }

    async fn list(
        &self,
        config: Option<&CheckpointConfig>,
        limit: Option<usize>,
    ) -> Result<CheckpointStream> {
        if let Some(thread_id) = config.and_then(|c| c.thread_id.as_deref()) {
            let found = self
                .get_tuple(&CheckpointConfig::for_thread(thread_id))
                .await?;
            let items: Vec<Result<CheckpointTuple>> = found
                .into_iter()
                .take(limit.unwrap_or(usize::MAX))
                .map(Ok)
                .collect();
            return Ok(Box::pin(stream::iter(items)));
        }

        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Box::pin(stream::empty()))
            }
            Err(e) => return Err(e.into()),
        };

        let extension = self.serializer.extension();
        let mut tuples = Vec::new();
        let mut failures = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(extension) {
                continue;
            }

            match self.read_stored(&path).await {
                Ok(Some(stored)) => match stored.into_tuple() {
                    Ok(tuple) => tuples.push(tuple),
                    Err(e) => failures.push(e),
                },
                Ok(None) => {}
                Err(e) => failures.push(e),
            }
        }

        tuples.sort_by(|a, b| b.checkpoint.ts.cmp(&a.checkpoint.ts));
        if let Some(limit) = limit {
            tuples.truncate(limit);
        }

        let items: Vec<Result<CheckpointTuple>> = tuples
            .into_iter()
            .map(Ok)
            .chain(failures.into_iter().map(Err))
            .collect();
        Ok(Box::pin(stream::iter(items)))
    }

    async fn put(
        &self,
        config: &CheckpointConfig,
        checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
    ) -> Result<CheckpointConfig> {
        let thread_id = config.require_thread_id()?;
        let path = self.path_for(thread_id);

        // A corrupt previous file must not block overwriting it
        let parent_id = self.read_stored(&path).await.ok().flatten().map(|s| s.id);

        let stored = StoredCheckpoint {
            thread_id: thread_id.to_string(),
            v: checkpoint.v,
            id: checkpoint.id.clone(),
            ts: checkpoint.ts,
            values: serde_json::to_string(&checkpoint.values)?,
            metadata,
            parent_id,
        };

        let bytes = self.serializer.dumps(&stored)?;
        self.write_atomic(&path, &bytes).await?;

        Ok(CheckpointConfig::for_thread(thread_id).with_checkpoint_id(checkpoint.id))
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(thread_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn claim_thread(&self, thread_id: &str) -> Result<Option<ThreadClaim>> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .open(self.lock_path_for(thread_id))
            .await?
            .into_std()
            .await;

        // Closing the file releases the lock, so the guard itself is not kept
        let mut lock = RwLock::new(file);
        match lock.try_write() {
            Ok(guard) => std::mem::forget(guard),
            Err(_) => return Ok(None),
        }
        Ok(Some(ThreadClaim::new(thread_id, lock)))
    }
}

/// Percent-encode everything outside `[A-Za-z0-9-_.~]`
fn encode_thread_id(thread_id: &str) -> String {
    urlencoding::encode(thread_id).into_owned()
}
