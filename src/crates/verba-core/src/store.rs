//! Correction store
//!
//! Append-only history of human corrections, unique by source text. The file
//! implementation keeps a pretty-printed JSON array:
//!
//! ```text
//! [
//!   {
//!     "source": "Good morning",
//!     "correction": "Bonjour"
//!   }
//! ]
//! ```
//!
//! Reads never fail: a missing, empty or corrupt file is an empty history.
//! Writes hold an async mutex for the whole read-modify-write and replace the
//! file atomically (temp file + rename).

use crate::error::Result;
use crate::state::Correction;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

/// Durable source → correction history
#[async_trait]
pub trait CorrectionStore: Send + Sync {
    /// Append `(source, correction)` unless `source` is already present
    ///
    /// Returns `true` when a new entry was written.
    async fn record(&self, source: &str, correction: &str) -> Result<bool>;

    /// Every entry in write order
    async fn load_all(&self) -> Vec<Correction>;
}

/// Correction store backed by a JSON file
#[derive(Debug)]
pub struct FileCorrectionStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCorrectionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current entries for a write; unreadable files are an error, corrupt ones
    /// are moved aside so the new history does not silently replace them
    async fn load_for_update(&self) -> Result<Vec<Correction>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str(&content) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                let backup = self.path.with_extension("json.corrupt");
                warn!(
                    path = %self.path.display(),
                    backup = %backup.display(),
                    error = %e,
                    "Correction history is corrupt, starting a new one"
                );
                tokio::fs::rename(&self.path, &backup).await?;
                Ok(Vec::new())
            }
        }
    }

    async fn write_atomic(&self, entries: &[Correction]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json.as_bytes()).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl CorrectionStore for FileCorrectionStore {
    async fn record(&self, source: &str, correction: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;

        let mut entries = self.load_for_update().await?;
        if entries.iter().any(|e| e.source == source) {
            debug!(source = %source, "Correction already recorded");
            return Ok(false);
        }

        entries.push(Correction::new(source, correction));
        self.write_atomic(&entries).await?;
        Ok(true)
    }

    async fn load_all(&self) -> Vec<Correction> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read correction history");
                return Vec::new();
            }
        };

        if content.trim().is_empty() {
            return Vec::new();
        }

        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "Correction history is corrupt");
            Vec::new()
        })
    }
}

/// Correction store held in memory
#[derive(Debug, Default)]
pub struct InMemoryCorrectionStore {
    entries: RwLock<Vec<Correction>>,
}

impl InMemoryCorrectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `entries` (deduplicated by source)
    pub fn with_entries(entries: impl IntoIterator<Item = Correction>) -> Self {
        let mut unique: Vec<Correction> = Vec::new();
        for entry in entries {
            if !unique.iter().any(|e| e.source == entry.source) {
                unique.push(entry);
            }
        }
        Self {
            entries: RwLock::new(unique),
        }
    }
}

#[async_trait]
impl CorrectionStore for InMemoryCorrectionStore {
    async fn record(&self, source: &str, correction: &str) -> Result<bool> {
        let mut entries = self.entries.write().await;
        if entries.iter().any(|e| e.source == source) {
            return Ok(false);
        }
        entries.push(Correction::new(source, correction));
        Ok(true)
    }

    async fn load_all(&self) -> Vec<Correction> {
        self.entries.read().await.clone()
    }
}
