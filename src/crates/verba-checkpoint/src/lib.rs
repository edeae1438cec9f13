//! # verba-checkpoint - State Persistence for Resumable Workflows
//!
//! **Trait-based checkpoint abstractions and implementations** for persisting
//! and restoring workflow state between steps. A workflow that parks waiting
//! for a human holds no task, lock or connection: everything it needs to
//! continue lives in its latest checkpoint.
//!
//! ## Core Concepts
//!
//! - [`CheckpointSaver`] - storage backend trait (`put`, `get_tuple`, `list`, `delete_thread`)
//! - [`Checkpoint`] - versioned snapshot with an opaque JSON payload
//! - [`CheckpointConfig`] - addresses a thread (session) and optionally one checkpoint
//! - [`CheckpointMetadata`] - source, step and producing node
//! - [`CheckpointTuple`] - checkpoint plus config, metadata and parent link
//! - [`ThreadClaim`] - exclusive hold on a thread while a run advances it
//!
//! ## Backends
//!
//! | Saver | History | Survives restart | Claims exclude |
//! |-------|---------|------------------|----------------|
//! | [`InMemoryCheckpointSaver`] | every checkpoint per thread | no | clones of the saver |
//! | [`FileCheckpointSaver`] | latest checkpoint per thread | yes | every process on the directory |
//!
//! The file saver is generic over a [`SerializerProtocol`]; [`JsonSerializer`]
//! is the default and [`BincodeSerializer`] trades readability for size.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use verba_checkpoint::{
//!     Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointSaver, FileCheckpointSaver,
//! };
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let saver = FileCheckpointSaver::new(".verba/checkpoints");
//!     let config = CheckpointConfig::for_thread("session-1");
//!
//!     saver
//!         .put(&config, Checkpoint::new(json!({"next": "qc"})), CheckpointMetadata::new())
//!         .await?;
//!
//!     if let Some(tuple) = saver.get_tuple(&config).await? {
//!         println!("parked before {}", tuple.checkpoint.values["next"]);
//!     }
//!     Ok(())
//! }
//! ```

pub mod checkpoint;
pub mod claim;
pub mod error;
pub mod file;
pub mod memory;
pub mod serializer;
pub mod traits;

pub use checkpoint::{
    Checkpoint, CheckpointConfig, CheckpointId, CheckpointMetadata, CheckpointSource,
    CheckpointTuple,
};
pub use claim::{ClaimRegistry, ThreadClaim};
pub use error::{CheckpointError, Result};
pub use file::FileCheckpointSaver;
pub use memory::InMemoryCheckpointSaver;
pub use serializer::{BincodeSerializer, JsonSerializer, SerializerProtocol};
pub use traits::{CheckpointSaver, CheckpointStream};
